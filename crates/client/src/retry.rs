//! # 再試行ポリシー
//!
//! 指数バックオフで再試行する。対象は [`ClientError::is_retryable`] が真のエラーのみで、
//! パース・鍵形式・暗号・プロトコルのエラーは即座に呼び出し側へ返す。

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

/// 再試行の回数と間隔。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 初回を除く最大再試行回数
    pub max_retries: u32,
    /// 1回目の再試行までの待機時間。以後2倍ずつ延びる。
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// 再試行しない。
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(200),
        }
    }

    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// `attempt` 回目（1始まり）の再試行前の待機時間。
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// `operation` を実行し、再試行可能なエラーなら待機してやり直す。
    ///
    /// `operation` には0始まりの試行番号が渡される。各試行は独立しており、
    /// 前回の試行の鍵素材を引き継がない。
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, ClientError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "再試行します"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
