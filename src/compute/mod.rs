//! Compute Engine v1 API 访问层。

pub mod client;
pub mod retry;
pub mod types;

pub use client::ComputeClient;
pub use retry::RetryPolicy;
