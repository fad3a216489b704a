//! 重试执行器 - 业务能力层
//!
//! 与服务商无关的指数退避重试：
//! - 每次尝试可单独设置超时（只约束单次尝试，不约束整个重试序列）
//! - 可重试错误等待 `delay(n)` 后重试，最后一次失败返回 `Exhausted`
//! - 不可重试错误立即返回 `Fatal`，不等待

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{error, warn};

use crate::error::ProviderError;
use crate::models::ProviderId;

/// 重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大尝试次数（含第一次）
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    /// 单次尝试超时，`None` 表示不限制
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            3,
            Duration::from_secs(1),
            Duration::from_secs(10),
            Some(Duration::from_secs(60)),
        )
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            exponential_base: 2.0,
            timeout,
        }
    }

    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    /// 各服务商的默认策略
    pub fn for_provider(provider: ProviderId) -> Self {
        match provider {
            ProviderId::Mock | ProviderId::OpenAi => Self::default(),
            ProviderId::Gemini => Self::new(
                3,
                Duration::from_secs(2),
                Duration::from_secs(15),
                Some(Duration::from_secs(90)),
            ),
        }
    }

    /// 第 `attempt` 次（从 0 开始）失败后的等待时间
    ///
    /// `min(initial_delay * base^attempt, max_delay)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let max = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= max {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// 错误是否值得重试
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}

/// 重试最终失败的原因
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// 不可重试错误，立即放弃
    #[error("不可重试错误（第 {attempts} 次尝试）: {last_error}")]
    Fatal { attempts: u32, last_error: E },
    /// 可重试错误耗尽了全部尝试次数
    #[error("重试 {attempts} 次后仍然失败: {last_error}")]
    Exhausted { attempts: u32, last_error: E },
    /// 最后一次尝试超时
    #[error("重试 {attempts} 次后仍然超时（单次超时 {timeout:?}）")]
    TimedOut { attempts: u32, timeout: Duration },
}

impl<E> RetryError<E> {
    /// 实际进行的尝试次数
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::TimedOut { attempts, .. } => *attempts,
        }
    }

    /// 最后一次的底层错误（超时没有底层错误）
    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Fatal { last_error, .. } | RetryError::Exhausted { last_error, .. } => {
                Some(last_error)
            }
            RetryError::TimedOut { .. } => None,
        }
    }
}

/// 使用 [`RetryableError`] 判定是否重试
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    op: F,
) -> Result<T, RetryError<E>>
where
    E: RetryableError + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_classifier(policy, context, |e: &E| e.is_retryable(), op).await
}

/// 使用自定义判定函数决定是否重试
pub async fn retry_with_classifier<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    context: &str,
    classify: C,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
{
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        let attempt_no = attempt + 1;
        let is_last = attempt_no >= max_attempts;

        let outcome = match policy.timeout {
            Some(limit) => match timeout(limit, op()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        "[{}] 第 {}/{} 次尝试超时（{:?}）",
                        context, attempt_no, max_attempts, limit
                    );
                    if is_last {
                        error!("[{}] 全部尝试均超时", context);
                        return Err(RetryError::TimedOut {
                            attempts: attempt_no,
                            timeout: limit,
                        });
                    }
                    attempt += 1;
                    continue;
                }
            },
            None => op().await,
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !classify(&err) {
            error!("[{}] 不可重试错误: {}", context, err);
            return Err(RetryError::Fatal {
                attempts: attempt_no,
                last_error: err,
            });
        }

        if is_last {
            error!("[{}] 最后一次尝试失败: {}", context, err);
            return Err(RetryError::Exhausted {
                attempts: attempt_no,
                last_error: err,
            });
        }

        let delay = policy.delay(attempt);
        warn!(
            "[{}] 第 {}/{} 次尝试失败: {}，{:.1} 秒后重试...",
            context,
            attempt_no,
            max_attempts,
            err,
            delay.as_secs_f64()
        );
        sleep(delay).await;
        attempt += 1;
    }
}
