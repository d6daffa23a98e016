use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Deserializer, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::compute::retry::RetryPolicy;
use crate::error::ExporterError;

// 默认端口见 https://github.com/prometheus/prometheus/wiki/Default-port-allocations
const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9592";
const DEFAULT_METRICS_PATH: &str = "/metrics";
const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;
const DEFAULT_BACKOFF_JITTER_MS: u64 = 1_000;
const DEFAULT_RETRY_STATUSES: [u16; 1] = [503];

pub const DEFAULT_API_BASE_PATH: &str = "https://compute.googleapis.com/compute/v1/";

/// 启动时构建一次的只读配置，按引用传给各组件。
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_address: String,
    pub metrics_path: String,

    pub project_id: String,
    pub credentials_path: PathBuf,
    pub access_token: String,
    pub metadata_host: String,

    pub max_retries: u32,
    pub http_timeout_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_jitter_ms: u64,
    pub retry_statuses: Vec<u16>,

    pub api_base_path: String,
    pub api_user_agent: String,
    pub proxy: String,

    pub debug: String,
}

/// 命令行参数。给出的项覆盖同名环境变量，未给出的项不参与合并。
#[derive(Debug, Default, Parser, Serialize)]
#[command(
    name = "gcp-quota-exporter",
    version,
    about = "Prometheus exporter for GCP Compute Engine quotas"
)]
pub struct Cli {
    /// 要监控的项目 ID（--gcp.project-id 优先）
    #[arg(value_name = "PROJECT")]
    #[serde(skip)]
    pub project: Option<String>,

    /// 监听地址 [env: LISTEN_ADDRESS]
    #[arg(long = "web.listen-address", value_name = "ADDR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_address: Option<String>,

    /// 指标路径 [env: METRICS_PATH]
    #[arg(long = "web.telemetry-path", value_name = "PATH")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,

    /// 项目 ID [env: GCP_PROJECT_ID]
    #[arg(long = "gcp.project-id", value_name = "PROJECT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcp_project_id: Option<String>,

    /// 凭据文件路径 [env: GCP_CREDENTIALS_PATH / GOOGLE_APPLICATION_CREDENTIALS]
    #[arg(long = "gcp.credentials-path", value_name = "FILE")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcp_credentials_path: Option<String>,

    /// 可重试状态码上的最大重试次数 [env: MAX_RETRIES]
    #[arg(long = "gcp.max-retries", value_name = "N")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// 单次上游调用时限，毫秒 [env: HTTP_TIMEOUT]
    #[arg(long = "gcp.http-timeout", value_name = "MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout: Option<u64>,

    /// 退避上限，毫秒 [env: MAX_BACKOFF]
    #[arg(long = "gcp.max-backoff", value_name = "MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_backoff: Option<u64>,

    /// 退避基数与抖动上限，毫秒 [env: BACKOFF_JITTER]
    #[arg(long = "gcp.backoff-jitter", value_name = "MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_jitter: Option<u64>,

    /// 可重试的 HTTP 状态码，逗号分隔 [env: RETRY_STATUSES]
    #[arg(long = "gcp.retry-statuses", value_name = "CODES", value_parser = check_status_codes)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_statuses: Option<String>,

    /// Compute API base path，指向测试桩时使用 [env: API_BASE_PATH]
    #[arg(long = "test.base-path", value_name = "URL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_path: Option<String>,

    /// 调试日志级别 [env: DEBUG]
    #[arg(long = "debug", value_name = "LEVEL", value_parser = ["off", "low", "medium", "high"])]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    #[serde(default, alias = "LISTEN_ADDRESS", deserialize_with = "string_like")]
    listen_address: Option<String>,
    #[serde(default, alias = "METRICS_PATH", deserialize_with = "string_like")]
    metrics_path: Option<String>,

    #[serde(default, alias = "GCP_PROJECT_ID", deserialize_with = "string_like")]
    gcp_project_id: Option<String>,
    #[serde(default, alias = "GCP_CREDENTIALS_PATH", deserialize_with = "string_like")]
    gcp_credentials_path: Option<String>,
    #[serde(
        default,
        alias = "GOOGLE_APPLICATION_CREDENTIALS",
        deserialize_with = "string_like"
    )]
    google_application_credentials: Option<String>,
    #[serde(default, alias = "GCP_ACCESS_TOKEN", deserialize_with = "string_like")]
    gcp_access_token: Option<String>,
    #[serde(default, alias = "GCE_METADATA_HOST", deserialize_with = "string_like")]
    gce_metadata_host: Option<String>,

    #[serde(alias = "MAX_RETRIES")]
    max_retries: Option<u32>,
    #[serde(alias = "HTTP_TIMEOUT")]
    http_timeout: Option<u64>,
    #[serde(alias = "MAX_BACKOFF")]
    max_backoff: Option<u64>,
    #[serde(alias = "BACKOFF_JITTER")]
    backoff_jitter: Option<u64>,
    #[serde(default, alias = "RETRY_STATUSES", deserialize_with = "string_like")]
    retry_statuses: Option<String>,

    #[serde(default, alias = "API_BASE_PATH", deserialize_with = "string_like")]
    api_base_path: Option<String>,
    #[serde(default, alias = "API_USER_AGENT", deserialize_with = "string_like")]
    api_user_agent: Option<String>,
    #[serde(default, alias = "PROXY", deserialize_with = "string_like")]
    proxy: Option<String>,

    #[serde(default, alias = "DEBUG", deserialize_with = "string_like")]
    debug: Option<String>,
}

/// 环境变量的值会被预先解析成数字或布尔（如 `RETRY_STATUSES=503`、`DEBUG=1`），
/// 字符串字段按原文接收。
fn string_like<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        UInt(u64),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(d)?.map(|v| match v {
        Scalar::Str(s) => s,
        Scalar::UInt(n) => n.to_string(),
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

impl Config {
    /// 读取命令行与环境变量。任何一项取值非法都是启动错误。
    ///
    /// `--help` / `--version` 以及非法的命令行参数由 clap 直接处理并退出。
    pub fn load() -> Result<Self, ExporterError> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(mut cli: Cli) -> Result<Self, ExporterError> {
        if cli.gcp_project_id.is_none() {
            cli.gcp_project_id = cli.project.take();
        }

        let raw = Figment::from(Env::raw())
            .merge(Serialized::defaults(&cli))
            .extract::<RawEnv>()
            .map_err(|e| ExporterError::config(format!("读取配置失败: {e}")))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawEnv) -> Result<Self, ExporterError> {
        let credentials_path = raw
            .gcp_credentials_path
            .or(raw.google_application_credentials)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string());

        let retry_statuses = match raw.retry_statuses.as_deref() {
            Some(v) => parse_status_codes(v)?,
            None => DEFAULT_RETRY_STATUSES.to_vec(),
        };

        Ok(Self {
            listen_address: raw
                .listen_address
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string()),
            metrics_path: raw
                .metrics_path
                .unwrap_or_else(|| DEFAULT_METRICS_PATH.to_string()),
            project_id: raw.gcp_project_id.unwrap_or_default(),
            credentials_path: PathBuf::from(credentials_path),
            access_token: raw.gcp_access_token.unwrap_or_default(),
            metadata_host: raw
                .gce_metadata_host
                .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string()),
            max_retries: raw.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            http_timeout_ms: raw.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS),
            max_backoff_ms: raw.max_backoff.unwrap_or(DEFAULT_MAX_BACKOFF_MS),
            backoff_jitter_ms: raw.backoff_jitter.unwrap_or(DEFAULT_BACKOFF_JITTER_MS),
            retry_statuses,
            api_base_path: raw.api_base_path.unwrap_or_default(),
            api_user_agent: raw
                .api_user_agent
                .unwrap_or_else(|| format!("gcp-quota-exporter/{}", env!("CARGO_PKG_VERSION"))),
            proxy: raw.proxy.unwrap_or_default(),
            debug: raw.debug.unwrap_or_else(|| "off".to_string()),
        })
    }

    /// 校验启动所需的取值，失败即为致命配置错误。
    pub fn validate(&self) -> Result<(), ExporterError> {
        let path = self.metrics_path.trim();
        if !path.starts_with('/') || path == "/" || path == "/health" {
            return Err(ExporterError::config(format!(
                "metrics path 必须以 / 开头，且不能与 / 或 /health 冲突: {path:?}"
            )));
        }
        if self.http_timeout_ms == 0 {
            return Err(ExporterError::config("HTTP_TIMEOUT 必须大于 0"));
        }
        self.listen_addr()?;
        Ok(())
    }

    /// 兼容 `:9592` 写法（省略主机即监听所有地址）。
    pub fn listen_addr(&self) -> Result<SocketAddr, ExporterError> {
        let raw = self.listen_address.trim();
        let full = if raw.starts_with(':') {
            format!("0.0.0.0{raw}")
        } else {
            raw.to_string()
        };
        full.parse()
            .map_err(|e| ExporterError::config(format!("监听地址无效 {raw:?}: {e}")))
    }

    pub fn effective_api_base_path(&self) -> String {
        let v = self.api_base_path.trim();
        if v.is_empty() {
            return DEFAULT_API_BASE_PATH.to_string();
        }
        if v.ends_with('/') {
            v.to_string()
        } else {
            format!("{v}/")
        }
    }

    pub fn has_base_path_override(&self) -> bool {
        !self.api_base_path.trim().is_empty()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retryable_statuses: self.retry_statuses.clone(),
            base_jitter: Duration::from_millis(self.backoff_jitter_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            request_timeout: Duration::from_millis(self.http_timeout_ms),
        }
    }

    pub fn log_level(&self) -> crate::logging::LogLevel {
        crate::logging::LogLevel::parse(&self.debug)
    }
}

/// 逗号分隔的 HTTP 状态码；空项忽略，其余每一项都必须是 100..=599 的整数。
fn parse_status_codes(value: &str) -> Result<Vec<u16>, ExporterError> {
    let mut out = Vec::new();
    for part in value.split(',') {
        let p = part.trim();
        if p.is_empty() {
            continue;
        }
        match p.parse::<u16>() {
            Ok(n) if (100..=599).contains(&n) => out.push(n),
            _ => {
                return Err(ExporterError::config(format!(
                    "RETRY_STATUSES 含无效状态码 {p:?}"
                )));
            }
        }
    }
    if out.is_empty() {
        return Err(ExporterError::config("RETRY_STATUSES 未包含任何状态码"));
    }
    Ok(out)
}

fn check_status_codes(value: &str) -> Result<String, String> {
    parse_status_codes(value)
        .map(|_| value.to_string())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config::from_raw(RawEnv::default()).expect("default config")
}
