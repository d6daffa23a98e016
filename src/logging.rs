use reqwest::header::HeaderMap;
use sonic_rs::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// 日志等级（DEBUG 环境变量 / `--debug`）：
/// - off：只输出常规 info/warn 日志
/// - low：额外输出每次采集周期的摘要
/// - medium：额外输出上游请求/响应（格式化、脱敏）
/// - high：额外输出上游请求/响应（完全原始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl LogLevel {
    pub fn parse(debug: &str) -> Self {
        match debug.trim().to_lowercase().as_str() {
            "low" | "scrape" => Self::Low,
            "medium" | "upstream" => Self::Medium,
            "high" | "all" | "raw" => Self::High,
            _ => Self::Off,
        }
    }

    pub fn scrape_enabled(self) -> bool {
        self >= Self::Low
    }

    pub fn upstream_enabled(self) -> bool {
        self >= Self::Medium
    }

    /// 是否启用“完全原始”日志（high）。
    pub fn raw_enabled(self) -> bool {
        self >= Self::High
    }
}

/// 默认把依赖库日志控制在 warn，但确保本项目自身日志至少为 info，
/// 以免环境中预设的 RUST_LOG=warn 把启动失败原因与采集告警过滤掉。
pub fn init_tracing() {
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(&env))
        .with_target(false)
        .with_level(true)
        .try_init();
}

fn build_filter(rust_log: &str) -> EnvFilter {
    EnvFilter::new(filter_directives(rust_log))
}

fn filter_directives(rust_log: &str) -> String {
    let env = rust_log.trim();
    if env.is_empty() {
        "warn,gcp_quota_exporter=info".to_string()
    } else if env.contains("gcp_quota_exporter") {
        env.to_string()
    } else {
        format!("{env},gcp_quota_exporter=info")
    }
}

pub fn format_duration_ms(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

pub fn scrape_summary(project: &str, account: (usize, bool), regions: (usize, bool), took: Duration) {
    tracing::info!(
        project,
        account_records = account.0,
        account_up = account.1,
        region_records = regions.0,
        region_up = regions.1,
        duration_ms = format_duration_ms(took),
        "采集周期完成"
    );
}

pub fn upstream_request(method: &str, url: &str, headers: &HeaderMap, attempt: u32) {
    tracing::info!(
        "\n====================== 上游请求 ========================\n[上游请求] {method} {url} (attempt {attempt})\n[上游请求头]\n{}\n==========================================================",
        format_headers(headers),
    );
}

pub fn upstream_request_raw(method: &str, url: &str, headers: &HeaderMap, attempt: u32) {
    tracing::info!(
        "\n=================== 上游请求（RAW） ===================\n[上游请求] {method} {url} (attempt {attempt})\n[上游请求头]\n{}\n=========================================================",
        format_headers_raw(headers),
    );
}

pub fn upstream_response(status: u16, duration: Duration, body: &[u8]) {
    tracing::info!(
        "\n====================== 上游响应 ========================\n[上游响应] {} {}ms\n{}\n==========================================================",
        status,
        format_duration_ms(duration),
        format_body_bytes(body)
    );
}

pub fn upstream_response_raw(status: u16, duration: Duration, body: &[u8]) {
    tracing::info!(
        "\n=================== 上游响应（RAW） ===================\n[上游响应] {} {}ms\n{}\n=========================================================",
        status,
        format_duration_ms(duration),
        String::from_utf8_lossy(body),
    );
}

fn format_headers(headers: &HeaderMap) -> String {
    let mut obj = sonic_rs::Object::new();

    for (name, value) in headers.iter() {
        let key = name.as_str();
        let key_lc = key.to_lowercase();

        let v = if key_lc == "authorization" || key_lc == "proxy-authorization" {
            sonic_rs::Value::from("Bearer ***")
        } else {
            match value.to_str() {
                Ok(s) => sonic_rs::Value::from(s),
                Err(_) => sonic_rs::Value::from("<binary>"),
            }
        };
        obj.insert(key, v);
    }

    format_body_value(&obj.into_value())
}

// high 等级也不输出 token 本体。
fn format_headers_raw(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers.iter() {
        let key = name.as_str();
        let val = if key.eq_ignore_ascii_case("authorization") {
            "Bearer ***"
        } else {
            value.to_str().unwrap_or("<non-utf8>")
        };
        out.push_str(key);
        out.push_str(": ");
        out.push_str(val);
        out.push('\n');
    }
    out
}

fn format_body_value(v: &sonic_rs::Value) -> String {
    match sonic_rs::to_string_pretty(v) {
        Ok(s) => s,
        Err(_) => v.to_string(),
    }
}

fn format_body_bytes(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    // 区域列表可能很大：超过阈值只保留头尾，避免为日志格式化付出过多开销。
    const MAX_PARSE_BYTES: usize = 512 * 1024;
    const HEAD_TAIL: usize = 8 * 1024;

    if bytes.len() > MAX_PARSE_BYTES {
        let head = &bytes[..HEAD_TAIL];
        let tail = &bytes[bytes.len() - HEAD_TAIL..];
        return format!(
            "(body too large: {} bytes, showing head/tail)\n--- head ---\n{}\n--- tail ---\n{}",
            bytes.len(),
            String::from_utf8_lossy(head),
            String::from_utf8_lossy(tail)
        );
    }

    match sonic_rs::from_slice::<sonic_rs::Value>(bytes) {
        Ok(v) => format_body_value(&v),
        Err(_) => truncate_text_for_log(&String::from_utf8_lossy(bytes)),
    }
}

fn truncate_text_for_log(s: &str) -> String {
    const MAX_CHARS: usize = 32 * 1024;
    if s.chars().count() <= MAX_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_CHARS).collect();
    out.push_str("...[TRUNCATED]");
    out
}
