use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::compute::retry::RetryPolicy;
use crate::compute::types::{Project, Region, RegionList};
use crate::config::Config;
use crate::credential::TokenSource;
use crate::error::{ExporterError, TransportError};
use crate::logging::{self, LogLevel};

const MAX_REGION_PAGES: usize = 100;

/// Compute Engine v1 API 的只读客户端：`projects.get` 与 `regions.list`。
#[derive(Debug, Clone)]
pub struct ComputeClient {
    http: reqwest::Client,
    base_path: String,
    tokens: Arc<TokenSource>,
    retry: RetryPolicy,
    user_agent: String,
    log_level: LogLevel,
}

impl ComputeClient {
    pub fn new(cfg: &Config, tokens: Arc<TokenSource>) -> Result<Self, ExporterError> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90));

        if !cfg.proxy.trim().is_empty() {
            let proxy = reqwest::Proxy::all(cfg.proxy.trim())
                .map_err(|e| ExporterError::client_construction(format!("代理地址无效: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| ExporterError::client_construction(e.to_string()))?;

        Ok(Self {
            http,
            base_path: cfg.effective_api_base_path(),
            tokens,
            retry: cfg.retry_policy(),
            user_agent: cfg.api_user_agent.clone(),
            log_level: cfg.log_level(),
        })
    }

    pub fn project_url(&self, project: &str) -> String {
        format!("{}projects/{}", self.base_path, urlencoding::encode(project))
    }

    pub fn regions_url(&self, project: &str) -> String {
        format!("{}/regions", self.project_url(project))
    }

    pub async fn get_project(&self, project: &str) -> Result<Project, TransportError> {
        let url = self.project_url(project);
        self.get_json(&url, None, self.retry.deadline()).await
    }

    /// 拉取全部区域（跟随 `nextPageToken` 翻页）。
    ///
    /// 所有分页共享一个请求时限；page token 重复或页数超过上限即失败。
    pub async fn list_regions(&self, project: &str) -> Result<Vec<Region>, TransportError> {
        let url = self.regions_url(project);
        let deadline = self.retry.deadline();
        let mut regions = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        for _ in 0..MAX_REGION_PAGES {
            if Instant::now() >= deadline {
                return Err(TransportError::pagination(format!(
                    "regions.list 超出请求时限（已取得 {} 个区域）",
                    regions.len()
                )));
            }

            let page: RegionList = self.get_json(&url, page_token.as_deref(), deadline).await?;
            regions.extend(page.items);
            match page.next_page_token {
                Some(t) if !t.trim().is_empty() => {
                    if !seen_tokens.insert(t.clone()) {
                        return Err(TransportError::pagination(format!(
                            "regions.list 返回了重复的 nextPageToken {t:?}"
                        )));
                    }
                    page_token = Some(t);
                }
                _ => return Ok(regions),
            }
        }

        Err(TransportError::pagination(format!(
            "regions.list 超过 {MAX_REGION_PAGES} 页"
        )))
    }

    fn build_headers(&self, access_token: Option<&str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .unwrap_or(HeaderValue::from_static("gcp-quota-exporter")),
        );
        h.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = access_token
            && let Ok(v) = HeaderValue::from_str(&format!("Bearer {token}"))
        {
            h.insert(AUTHORIZATION, v);
        }
        h
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        page_token: Option<&str>,
        deadline: Instant,
    ) -> Result<T, TransportError> {
        let token = self.tokens.access_token().await?;
        let headers = self.build_headers(token.as_deref());
        let query: Vec<(&str, &str)> = page_token.map(|t| vec![("pageToken", t)]).unwrap_or_default();

        let start = std::time::Instant::now();
        let resp = self
            .retry
            .run_until(deadline, |attempt, remaining| {
                if self.log_level.upstream_enabled() {
                    if self.log_level.raw_enabled() {
                        logging::upstream_request_raw("GET", url, &headers, attempt);
                    } else {
                        logging::upstream_request("GET", url, &headers, attempt);
                    }
                }
                let req = self
                    .http
                    .get(url)
                    .headers(headers.clone())
                    .query(&query)
                    .timeout(remaining);
                async move { req.send().await.map_err(TransportError::from) }
            })
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if self.log_level.upstream_enabled() {
            if self.log_level.raw_enabled() {
                logging::upstream_response_raw(status.as_u16(), start.elapsed(), &bytes);
            } else {
                logging::upstream_response(status.as_u16(), start.elapsed(), &bytes);
            }
        }
        if !status.is_success() {
            return Err(extract_error_details(status.as_u16(), &bytes));
        }
        Ok(sonic_rs::from_slice::<T>(&bytes)?)
    }
}

/// 解析 Google API 错误信封：`{"error": {"code", "message", "status"}}`。
fn extract_error_details(status: u16, body: &[u8]) -> TransportError {
    #[derive(Debug, serde::Deserialize)]
    struct ErrResp {
        error: ErrInner,
    }

    #[derive(Debug, serde::Deserialize)]
    struct ErrInner {
        #[serde(default)]
        message: String,
        #[serde(default)]
        status: String,
    }

    let message = match sonic_rs::from_slice::<ErrResp>(body) {
        Ok(resp) if !resp.error.message.is_empty() => {
            if resp.error.status.is_empty() {
                resp.error.message
            } else {
                format!("{} ({})", resp.error.message, resp.error.status)
            }
        }
        _ => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if text.is_empty() {
                "Unknown error".to_string()
            } else {
                text.chars().take(256).collect()
            }
        }
    };

    TransportError::Http { status, message }
}
