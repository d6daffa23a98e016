//! HTTP 入口：指标暴露、落地页与健康检查。

pub mod templates;

use askama::Template;
use axum::Router;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;

use crate::metrics::{Registry, TEXT_CONTENT_TYPE};

pub struct AppState {
    pub registry: Arc<Registry>,
    pub metrics_path: String,
    pub project: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let metrics_path = state.metrics_path.clone();
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route(&metrics_path, get(handle_metrics))
        .with_state(state)
}

/// GET <metrics_path> - 每次请求触发一次完整采集
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Response {
    let body = state.registry.render().await;
    ([(CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response()
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Response {
    let tmpl = templates::IndexTemplate {
        project: &state.project,
        metrics_path: &state.metrics_path,
        version: env!("CARGO_PKG_VERSION"),
    };
    Html(tmpl.render().unwrap_or_default()).into_response()
}

async fn handle_health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::BuildInfoCollector;
    use crate::test_support::spawn_stub;

    async fn serve(metrics_path: &str) -> String {
        let mut registry = Registry::new();
        registry.register(Arc::new(BuildInfoCollector::new())).unwrap();
        let state = Arc::new(AppState {
            registry: Arc::new(registry),
            metrics_path: metrics_path.to_string(),
            project: "demo".to_string(),
        });
        spawn_stub(router(state)).await
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_text_format() {
        let base = serve("/quota-metrics").await;
        let resp = reqwest::get(format!("{base}/quota-metrics")).await.unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap(),
            TEXT_CONTENT_TYPE
        );
        let body = resp.text().await.unwrap();
        assert!(body.contains("# TYPE gcp_quota_exporter_build_info gauge\n"));
        assert!(body.contains(&format!(
            "gcp_quota_exporter_build_info{{version=\"{}\"}} 1\n",
            env!("CARGO_PKG_VERSION")
        )));
    }

    #[tokio::test]
    async fn index_links_to_metrics_path() {
        let base = serve("/metrics").await;
        let resp = reqwest::get(format!("{base}/")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body = resp.text().await.unwrap();
        assert!(body.contains("metrics\">Metrics</a>"));
        assert!(body.contains("<code>demo</code>"));
    }

    #[tokio::test]
    async fn health_and_unknown_paths() {
        let base = serve("/metrics").await;
        let health = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(health.text().await.unwrap(), "ok");

        let missing = reqwest::get(format!("{base}/nope")).await.unwrap();
        assert_eq!(missing.status(), 404);
    }
}
