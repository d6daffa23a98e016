//! 上游请求的重试策略：指数退避 + 抖动。
//!
//! - 仅对 `retryable_statuses` 中的状态码重试；网络错误原样返回
//! - 第 n 次重试前等待 `min(max_backoff, base_jitter * 2^n) + uniform(0, base_jitter)`
//! - 整个调用（含所有重试与等待）受 `request_timeout` 约束

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::TransportError;
use crate::util::random::uniform_duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retryable_statuses: Vec<u16>,
    pub base_jitter: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// 不含随机抖动的退避上界部分。
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_jitter.saturating_mul(factor).min(self.max_backoff)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff(attempt) + uniform_duration(self.base_jitter)
    }

    /// 执行一次带重试的调用。
    ///
    /// `op` 接收当前尝试序号（从 0 开始）与剩余可用时间，每次尝试都应重新构建请求。
    /// 返回最后一次得到的响应（成功或不可重试/预算耗尽时的失败状态），由调用方决定如何解释状态码。
    pub async fn run<F, Fut>(&self, op: F) -> Result<reqwest::Response, TransportError>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = Result<reqwest::Response, TransportError>>,
    {
        self.run_until(self.deadline(), op).await
    }

    /// 从现在起算的单次调用截止时间。
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.request_timeout
    }

    /// 与 [`run`](Self::run) 相同，但使用调用方给定的截止时间（多次请求共享同一时限）。
    pub async fn run_until<F, Fut>(
        &self,
        deadline: Instant,
        mut op: F,
    ) -> Result<reqwest::Response, TransportError>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = Result<reqwest::Response, TransportError>>,
    {
        let mut attempt = 0u32;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let resp = op(attempt, remaining).await?;

            let status = resp.status().as_u16();
            if !self.is_retryable(status) || attempt >= self.max_retries {
                return Ok(resp);
            }

            let delay = self.backoff(attempt);
            if Instant::now() + delay >= deadline {
                tracing::warn!(
                    "上游返回 {status}，剩余时间不足以等待 {}ms 后重试，放弃（已尝试 {} 次）",
                    delay.as_millis(),
                    attempt + 1
                );
                return Ok(resp);
            }

            tracing::debug!(
                "上游返回 {status}，{}ms 后进行第 {} 次重试",
                delay.as_millis(),
                attempt + 1
            );
            drop(resp);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
