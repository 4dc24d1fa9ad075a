//! 客户端配置
//!
//! `ClientConfig`可以通过`ClientConfig::builder()`构建，也可以从toml等配置文件反序列化，
//! 回调相关的字段（`proxy`、`permission_hook`、`credentials_provider`）只能通过builder设置。

use crate::credentials::{CredentialsProvider, StaticCredentialsProvider};
use crate::error::Error;
use crate::service::Service;
use bon::Builder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// 阿里云的不同站点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudEnv {
    /// 中国站
    #[default]
    Public,
    /// 国际站
    International,
    /// 金融云
    Finance,
}

/// 权限不足时的回调：`(service, action)`
pub type PermissionHook = Arc<dyn Fn(&str, &str) + Send + Sync>;
/// 代理选择：返回`None`表示不使用代理
pub type ProxyFn = Arc<dyn Fn(&Url) -> Option<Url> + Send + Sync>;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Deserialize, Builder)]
#[serde(default)]
pub struct RetryConfig {
    /// 包括第一次请求在内的最大请求次数
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
    /// 第n次失败后等待`n * backoff_unit`
    #[serde(with = "duration_secs")]
    #[builder(default = DEFAULT_BACKOFF_UNIT)]
    pub backoff_unit: Duration,
    /// 按产品额外追加的需要重试的网络错误关键字
    #[builder(default)]
    pub retryable_messages: HashMap<Service, Vec<String>>,
    /// 按产品去掉默认的需要重试的网络错误关键字
    #[builder(default)]
    pub disabled_messages: HashMap<Service, Vec<String>>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[derive(Clone, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct ClientConfig {
    /// 云账号的名称，只用于日志和子账号展示
    #[serde(default)]
    #[builder(default)]
    pub account_name: String,
    pub access_key: String,
    pub access_secret: String,
    #[serde(default)]
    #[builder(default)]
    pub cloud_env: CloudEnv,
    /// 为true时在日志中输出请求和响应的body
    #[serde(default)]
    #[builder(default)]
    pub debug: bool,
    /// 为true时拒绝所有非只读的请求
    #[serde(default)]
    #[builder(default)]
    pub read_only: bool,
    /// 需要注入到请求中的资源组id
    #[serde(default)]
    #[builder(default)]
    pub resource_group_ids: Vec<String>,
    #[serde(default)]
    #[builder(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    pub connect_timeout: Duration,
    #[serde(default = "default_read_timeout", with = "duration_secs")]
    #[builder(default = DEFAULT_READ_TIMEOUT)]
    pub read_timeout: Duration,
    #[serde(skip)]
    pub proxy: Option<ProxyFn>,
    #[serde(skip)]
    pub permission_hook: Option<PermissionHook>,
    /// 不设置时使用`access_key`和`access_secret`
    #[serde(skip)]
    pub credentials_provider: Option<Arc<dyn CredentialsProvider>>,
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be positive".to_owned()));
        }
        if self.credentials_provider.is_some() {
            return Ok(());
        }
        if self.access_key.trim().is_empty() {
            return Err(Error::Config("access_key is empty".to_owned()));
        }
        if self.access_secret.trim().is_empty() {
            return Err(Error::Config("access_secret is empty".to_owned()));
        }
        Ok(())
    }

    pub(crate) fn credentials_provider(&self) -> Arc<dyn CredentialsProvider> {
        match &self.credentials_provider {
            Some(p) => p.clone(),
            None => Arc::new(StaticCredentialsProvider::new(
                self.access_key.clone(),
                self.access_secret.clone(),
            )),
        }
    }

    /// 调用权限回调，回调内部的panic不会影响请求
    pub(crate) fn notify_permission(&self, service: &str, action: &str) {
        if let Some(hook) = &self.permission_hook {
            let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                hook(service, action)
            }));
            if res.is_err() {
                log::warn!("permission hook panicked for {service} {action}");
            }
        }
    }
}

impl Debug for ClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("account_name", &self.account_name)
            .field("access_key", &self.access_key)
            .field("access_secret", &"******")
            .field("cloud_env", &self.cloud_env)
            .field("debug", &self.debug)
            .field("read_only", &self.read_only)
            .field("resource_group_ids", &self.resource_group_ids)
            .field("retry", &self.retry)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("proxy", &self.proxy.is_some())
            .field("permission_hook", &self.permission_hook.is_some())
            .finish()
    }
}
