//! 错误分类和重试
//!
//! 每次请求最多尝试`RetryConfig::max_attempts`次，第n次失败后等待`n * backoff_unit`。

use crate::config::RetryConfig;
use crate::error::{Error, TransportError};
use crate::service::Service;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

/// 需要重试的错误码
pub const RETRYABLE_CODES: [&str; 11] = [
    "SignatureNonceUsed",
    "BackendServer.configuring",
    "Operation.Conflict",
    "OperationDenied.ResourceControl",
    "ServiceIsStopping",
    "ProcessingSameRequest",
    "ResourceInOperating",
    "InvalidFileSystemStatus.Ordering",
    "OperationUnsupported.EipNatBWPCheck",
    "InvalidInstance.NotSupported",
    "ErrorClusterNotFound",
];

/// AccessKey不可用
pub const INVALID_ACCESS_KEY_CODES: [&str; 6] = [
    "InvalidAccessKeyId.NotFound",
    "InvalidAccessKeyId",
    "NoEnabledAccessKey",
    "InvalidAccessKeyId.Inactive",
    "Forbidden.AccessKeyDisabled",
    "Forbidden.AccessKey",
];

/// 网络错误中出现这些关键字时重试
pub const RETRYABLE_MESSAGES: [&str; 8] = [
    "EOF",
    "i/o timeout",
    "TLS handshake timeout",
    "Client.Timeout",
    "connection reset by peer",
    "server misbehaving",
    "try later",
    "Another operation is being performed",
];

pub const NO_STOCK_CODE: &str = "OperationDenied.NoStock";

pub fn is_not_found_code(code: &str) -> bool {
    code.starts_with("EntityNotExist.") || code.ends_with(".NotFound") || code.ends_with("NotExist")
}

/// 单次请求失败的原因
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// 阿里云返回了错误码
    Api {
        status: StatusCode,
        code: String,
        message: String,
        request_id: Option<String>,
    },
    Transport(TransportError),
    /// 不需要分类的错误，直接返回
    Other(Error),
}

impl From<Error> for AttemptError {
    fn from(e: Error) -> Self {
        match e {
            Error::Transport(e) => AttemptError::Transport(e),
            other => AttemptError::Other(other),
        }
    }
}

impl From<aliyun_common::Error> for AttemptError {
    fn from(e: aliyun_common::Error) -> Self {
        AttemptError::Other(e.into())
    }
}

#[derive(Debug)]
pub(crate) enum Classified {
    Retry(AttemptError),
    Done(Error),
    /// 删除的资源不存在，视为成功
    Missing,
}

/// 删除不存在的资源时返回的内容
pub(crate) trait EmptyResponse {
    fn empty() -> Self;
}

impl EmptyResponse for Value {
    fn empty() -> Self {
        Value::Object(Map::new())
    }
}

/// 一次调用的重试策略
pub(crate) struct RetryPolicy<'a> {
    pub action: &'a str,
    pub max_attempts: u32,
    pub backoff_unit: Duration,
    pub messages: Vec<String>,
}

impl<'a> RetryPolicy<'a> {
    pub(crate) fn new(config: &RetryConfig, service: Service, action: &'a str) -> Self {
        let disabled = config.disabled_messages.get(&service);
        let mut messages: Vec<String> = RETRYABLE_MESSAGES
            .iter()
            .filter(|m| disabled.is_none_or(|d| !d.iter().any(|x| x == *m)))
            .map(|m| m.to_string())
            .collect();
        if let Some(extra) = config.retryable_messages.get(&service) {
            messages.extend(extra.iter().cloned());
        }
        Self {
            action,
            max_attempts: config.max_attempts.max(1),
            backoff_unit: config.backoff_unit,
            messages,
        }
    }

    /// 不区分产品的策略，用于OSS
    pub(crate) fn for_action(config: &RetryConfig, action: &'a str) -> Self {
        Self {
            action,
            max_attempts: config.max_attempts.max(1),
            backoff_unit: config.backoff_unit,
            messages: RETRYABLE_MESSAGES.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub(crate) fn classify(&self, err: AttemptError) -> Classified {
        match err {
            AttemptError::Api {
                status,
                code,
                message,
                request_id,
            } => {
                if RETRYABLE_CODES.contains(&code.as_str()) {
                    return Classified::Retry(AttemptError::Api {
                        status,
                        code,
                        message,
                        request_id,
                    });
                }
                if INVALID_ACCESS_KEY_CODES.contains(&code.as_str()) {
                    return Classified::Done(Error::InvalidAccessKey(format!(
                        "[{code}] {message}"
                    )));
                }
                if is_not_found_code(&code) || status == StatusCode::NOT_FOUND {
                    if self.action.starts_with("Delete") {
                        debug!("{} on missing resource: [{code}], treated as success", self.action);
                        return Classified::Missing;
                    }
                    return Classified::Done(Error::NotFound(format!("[{code}] {message}")));
                }
                if code == NO_STOCK_CODE {
                    return Classified::Done(Error::StockOut { code, message });
                }
                if code == "InternalError" && self.action == "QueryAccountBalance" {
                    return Classified::Done(Error::NoPermission(format!(
                        "{}: [{code}] {message}",
                        self.action
                    )));
                }
                if self.messages.iter().any(|m| message.contains(m.as_str())) {
                    return Classified::Retry(AttemptError::Api {
                        status,
                        code,
                        message,
                        request_id,
                    });
                }
                let code = if code.is_empty() {
                    status.as_u16().to_string()
                } else {
                    code
                };
                Classified::Done(Error::Fatal {
                    code,
                    message,
                    request_id,
                })
            }
            AttemptError::Transport(e) => {
                if e.is_timeout || self.messages.iter().any(|m| e.message.contains(m.as_str())) {
                    Classified::Retry(AttemptError::Transport(e))
                } else {
                    Classified::Done(Error::Transport(e))
                }
            }
            AttemptError::Other(e) => Classified::Done(e),
        }
    }
}

/// 重试次数用完时返回的错误
fn exhausted(err: AttemptError, attempts: u32) -> Error {
    match err {
        AttemptError::Api { code, message, .. } => Error::Throttled {
            code,
            message,
            attempts,
        },
        AttemptError::Transport(e) => Error::Transient {
            message: e.message,
            attempts,
        },
        AttemptError::Other(e) => e,
    }
}

#[async_trait]
pub trait MockableSleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleep;

#[async_trait]
impl MockableSleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// `attempt`的参数是当前第几次请求（从1开始），每次请求都需要重新生成nonce
pub(crate) async fn retry_with_mockable_sleep<T, F, Fut>(
    policy: &RetryPolicy<'_>,
    sleeper: &dyn MockableSleep,
    mut attempt: F,
) -> Result<T, Error>
where
    T: EmptyResponse,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut num_attempts = 1;
    loop {
        let err = match attempt(num_attempts).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let err = match policy.classify(err) {
            Classified::Done(e) => return Err(e),
            Classified::Missing => return Ok(T::empty()),
            Classified::Retry(err) => err,
        };
        if num_attempts >= policy.max_attempts {
            warn!(
                "{} failed after {num_attempts} attempts: {err:?}",
                policy.action
            );
            return Err(exhausted(err, num_attempts));
        }
        let delay = policy.backoff_unit * num_attempts;
        debug!(
            "{} failed, retry {num_attempts} after {}ms: {err:?}",
            policy.action,
            delay.as_millis()
        );
        sleeper.sleep(delay).await;
        num_attempts += 1;
    }
}
