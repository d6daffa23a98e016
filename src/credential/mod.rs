//! 凭据：凭据文件模型、元数据服务与上游请求使用的 access token 来源。

pub mod metadata;
pub mod token;
pub mod types;

pub use token::{TokenResponse, TokenSource};
