//! GCE 实例元数据服务（`metadata.google.internal`）访问。

use reqwest::header::HeaderValue;
use std::time::Duration;

use crate::credential::TokenResponse;
use crate::error::{ExporterError, TransportError};

const METADATA_FLAVOR: &str = "Metadata-Flavor";

#[derive(Debug, Clone)]
pub struct MetadataServer {
    http: reqwest::Client,
    base_url: String,
}

impl MetadataServer {
    /// `host` 兼容 `GCE_METADATA_HOST` 约定：`host[:port]`，也接受带 scheme 的完整地址。
    pub fn new(host: &str, timeout: Duration) -> Result<Self, ExporterError> {
        let host = host.trim().trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };

        let http = reqwest::Client::builder()
            .timeout(timeout)
            // 元数据服务不应经过代理。
            .no_proxy()
            .build()
            .map_err(|e| ExporterError::client_construction(format!("元数据客户端: {e}")))?;

        Ok(Self { http, base_url })
    }

    pub async fn project_id(&self) -> Result<Option<String>, TransportError> {
        let bytes = self.get("project/project-id").await?;
        let id = String::from_utf8_lossy(&bytes).trim().to_string();
        Ok(if id.is_empty() { None } else { Some(id) })
    }

    pub async fn access_token(&self) -> Result<TokenResponse, TransportError> {
        let bytes = self.get("instance/service-accounts/default/token").await?;
        Ok(sonic_rs::from_slice::<TokenResponse>(&bytes)?)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        let url = format!("{}/computeMetadata/v1/{path}", self.base_url);
        let resp = self
            .http
            .get(url)
            .header(METADATA_FLAVOR, HeaderValue::from_static("Google"))
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }
        Ok(bytes.to_vec())
    }
}
