//! 配额采集器：一次拉取 = 两次上游调用 + 一组样本。
//!
//! - 项目级配额（`projects.get`）与区域级配额（`regions.list`）各自独立成败
//! - 每次拉取都重新请求上游，不缓存、不合并并发拉取
//! - 整个“采集并输出”周期由一把互斥锁串行化

use futures::future::BoxFuture;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::compute::client::ComputeClient;
use crate::compute::types::{Quota, Region};
use crate::identity::Identity;
use crate::logging::{self, LogLevel};
use crate::metrics::{Collector, Desc, MetricType, Sample};

const QUOTA_LABELS: &[&str] = &["project", "region", "metric"];

pub static LIMIT_DESC: Desc = Desc {
    name: "gcp_quota_limit",
    help: "Quota limits for GCP components.",
    metric_type: MetricType::Gauge,
    label_names: QUOTA_LABELS,
};

pub static USAGE_DESC: Desc = Desc {
    name: "gcp_quota_usage",
    help: "Quota usage for GCP components.",
    metric_type: MetricType::Gauge,
    label_names: QUOTA_LABELS,
};

pub static ACCOUNT_UP_DESC: Desc = Desc {
    name: "gcp_quota_account_scrape_up",
    help: "Was the last scrape of project-level quotas from the Compute API successful.",
    metric_type: MetricType::Gauge,
    label_names: &[],
};

pub static REGION_UP_DESC: Desc = Desc {
    name: "gcp_quota_region_scrape_up",
    help: "Was the last scrape of region-level quotas from the Compute API successful.",
    metric_type: MetricType::Gauge,
    label_names: &[],
};

/// 一条扁平化后的配额；`scope` 为空表示项目级，否则为区域名。
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaRecord {
    pub scope: String,
    pub metric: String,
    pub limit: f64,
    pub usage: f64,
}

impl QuotaRecord {
    fn from_quota(scope: &str, q: Quota) -> Option<Self> {
        if q.metric.trim().is_empty() {
            tracing::debug!("忽略缺少 metric 名称的配额条目（scope={scope:?}）");
            return None;
        }
        Some(Self {
            scope: scope.to_string(),
            metric: q.metric,
            limit: q.limit,
            usage: q.usage,
        })
    }
}

/// 一次采集的结果，两半各自带成功标记。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeResult {
    pub account_quotas: Vec<QuotaRecord>,
    pub account_ok: bool,
    pub region_quotas: Vec<QuotaRecord>,
    pub regions_ok: bool,
}

impl ScrapeResult {
    /// 转换为样本：每条配额一对 limit/usage，最后是两个健康指标。
    pub fn to_samples(&self, identity: &Identity) -> Vec<Sample> {
        let mut out =
            Vec::with_capacity((self.account_quotas.len() + self.region_quotas.len()) * 2 + 2);

        for r in self.account_quotas.iter().chain(self.region_quotas.iter()) {
            let labels = vec![
                identity.as_str().to_string(),
                r.scope.clone(),
                r.metric.clone(),
            ];
            out.push(Sample::new(&LIMIT_DESC, labels.clone(), r.limit));
            out.push(Sample::new(&USAGE_DESC, labels, r.usage));
        }

        out.push(Sample::unlabelled(&ACCOUNT_UP_DESC, bool_gauge(self.account_ok)));
        out.push(Sample::unlabelled(&REGION_UP_DESC, bool_gauge(self.regions_ok)));
        out
    }
}

fn bool_gauge(ok: bool) -> f64 {
    if ok { 1.0 } else { 0.0 }
}

pub struct QuotaCollector {
    client: ComputeClient,
    identity: Identity,
    log_level: LogLevel,
    cycle: Mutex<()>,
}

impl QuotaCollector {
    pub fn new(client: ComputeClient, identity: Identity, log_level: LogLevel) -> Self {
        Self {
            client,
            identity,
            log_level,
            cycle: Mutex::new(()),
        }
    }

    /// 查询上游并扁平化结果。不会整体失败：失败体现在 `account_ok` / `regions_ok`。
    pub async fn scrape(&self) -> ScrapeResult {
        let project = self.identity.as_str();
        let (account, regions) = tokio::join!(
            self.client.get_project(project),
            self.client.list_regions(project)
        );

        let mut result = ScrapeResult::default();

        match account {
            Ok(p) => {
                result.account_quotas = p
                    .quotas
                    .into_iter()
                    .filter_map(|q| QuotaRecord::from_quota("", q))
                    .collect();
                result.account_ok = true;
            }
            Err(e) => tracing::warn!("查询项目配额失败（project={project}）：{e}"),
        }

        match regions {
            Ok(list) => {
                for region in list {
                    let Region { name, quotas } = region;
                    result.region_quotas.extend(
                        quotas
                            .into_iter()
                            .filter_map(|q| QuotaRecord::from_quota(&name, q)),
                    );
                }
                result.regions_ok = true;
            }
            Err(e) => tracing::warn!("查询区域配额失败（project={project}）：{e}"),
        }

        result
    }

    /// 一个完整的“采集并输出”周期；并发调用在锁上排队，各自触发新的上游请求。
    pub async fn collect_samples(&self) -> Vec<Sample> {
        let _guard = self.cycle.lock().await;
        let start = Instant::now();

        let result = self.scrape().await;
        if self.log_level.scrape_enabled() {
            logging::scrape_summary(
                self.identity.as_str(),
                (result.account_quotas.len(), result.account_ok),
                (result.region_quotas.len(), result.regions_ok),
                start.elapsed(),
            );
        }
        result.to_samples(&self.identity)
    }
}

impl Collector for QuotaCollector {
    fn describe(&self) -> Vec<&'static Desc> {
        vec![&LIMIT_DESC, &USAGE_DESC, &ACCOUNT_UP_DESC, &REGION_UP_DESC]
    }

    fn collect(&self) -> BoxFuture<'_, Vec<Sample>> {
        Box::pin(self.collect_samples())
    }
}
