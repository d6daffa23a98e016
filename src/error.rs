use thiserror::Error;

/// 启动阶段错误：一旦出现，进程记录原因后以非零状态退出。
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("初始化上游客户端失败: {0}")]
    ClientConstruction(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExporterError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn client_construction(message: impl Into<String>) -> Self {
        Self::ClientConstruction(message.into())
    }
}

/// 单次上游调用错误：在采集边界被转换为 `*_scrape_up = 0`，不会中断进程。
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Compute API 错误 {status}: {message}")]
    Http { status: u16, message: String },

    #[error("获取 access token 失败: {0}")]
    Token(String),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Decode(#[from] sonic_rs::Error),

    #[error("分页异常: {0}")]
    Pagination(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn token(message: impl Into<String>) -> Self {
        Self::Token(message.into())
    }

    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination(message.into())
    }
}
