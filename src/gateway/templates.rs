//! HTML 模板，模板文件位于 templates/。

use askama::Template;

/// GET / 落地页。
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub project: &'a str,
    pub metrics_path: &'a str,
    pub version: &'a str,
}
