use serde::Deserialize;

/// Compute API 中的单条配额：`{metric, limit, usage}`。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Quota {
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub limit: f64,
    #[serde(default)]
    pub usage: f64,
}

/// `projects.get` 响应中我们关心的部分。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quotas: Vec<Quota>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quotas: Vec<Quota>,
}

/// `regions.list` 的单页响应。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionList {
    #[serde(default)]
    pub items: Vec<Region>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
