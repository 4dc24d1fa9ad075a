//! RPC风格的请求
//!
//! 所有参数都放在query中，签名使用V1（HMAC-SHA1），返回解析后的json。

use crate::Params;
use crate::client::{Client, ClientInner};
use crate::endpoint::region_for_env;
use crate::error::{Error, Result};
use crate::inject::inject_resource_group;
use crate::json::ValueExt;
use crate::retry::{AttemptError, RetryPolicy, retry_with_mockable_sleep};
use crate::service::Service;
use crate::transport::{HttpResponse, method_for_action};
use aliyun_common::helper::now_iso8601;
use aliyun_common::open_api_sign::OpenApiStyle;
use aliyun_common::rpc_sign::{self, SIGNATURE_METHOD, SIGNATURE_VERSION, generate_nonce};
use bon::Builder;
use log::debug;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::Request;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub(crate) const SDK_USER_AGENT: &str = concat!("aliyun-core/", env!("CARGO_PKG_VERSION"));

// 这些参数不能出现在日志中
const SENSITIVE_PARAMS: [&str; 3] = ["AccessKeyId", "Signature", "SecurityToken"];

/// 一次RPC调用需要的全部信息，域名已经解析好
pub(crate) struct RpcCall<'a> {
    pub service: Service,
    pub host: String,
    pub version: &'a str,
    pub action: &'a str,
    pub params: &'a Params,
}

/// [RPC风格请求](https://help.aliyun.com/zh/sdk/product-overview/rpc-mechanism)
///
/// ```no_run
/// # use aliyun_core::{Client, Service, Params};
/// # async fn example(client: &Client) -> aliyun_core::Result<()> {
/// let mut params = Params::new();
/// params.insert("VpcId".to_owned(), "vpc-xxx".to_owned());
/// let resp = client
///     .rpc(Service::Vpc, "DescribeVSwitches")
///     .region_id("cn-hangzhou")
///     .params(params)
///     .with_resource_group(true)
///     .build()
///     .send()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Builder)]
pub struct RpcRequest<'a> {
    #[builder(start_fn)]
    client: &'a Client,
    #[builder(start_fn)]
    service: Service,
    #[builder(start_fn)]
    action: &'a str,
    /// 不设置时使用产品的默认版本
    version: Option<&'a str>,
    /// 会作为`RegionId`参数，同时用于解析域名
    region_id: Option<&'a str>,
    /// 直接指定域名，不再解析
    endpoint: Option<&'a str>,
    #[builder(default)]
    params: Params,
    /// 是否注入配置中的资源组
    #[builder(default)]
    with_resource_group: bool,
    cancel: Option<&'a CancellationToken>,
    timeout: Option<Duration>,
}

impl RpcRequest<'_> {
    pub async fn send(&self) -> Result<Value> {
        let inner = &self.client.inner;
        if self.service.style() == OpenApiStyle::ROA {
            return Err(Error::Config(format!(
                "{} is a ROA service, use `Client::roa` for {}",
                self.service, self.action
            )));
        }
        // 只读账号在签名之前就拒绝
        inner.transport.check_read_only(self.action)?;

        let fut = async {
            let mut params = self.params.clone();
            let region = self
                .region_id
                .map(|r| region_for_env(inner.config.cloud_env, self.service, r));
            if let Some(r) = &region {
                params.entry("RegionId".to_owned()).or_insert_with(|| r.clone());
            }
            if self.with_resource_group {
                inner.inject_resource_group(self.service, &mut params).await;
            }
            let host = match self.endpoint {
                Some(e) => e.to_owned(),
                None => inner.endpoint(self.service, region.as_deref()).await,
            };
            let call = RpcCall {
                service: self.service,
                host,
                version: self.version.unwrap_or(self.service.api_version()),
                action: self.action,
                params: &params,
            };
            inner.execute_rpc(&call).await
        };
        run_with_context(fut, self.cancel, self.timeout).await
    }
}

impl ClientInner {
    pub(crate) async fn execute_rpc(&self, call: &RpcCall<'_>) -> Result<Value> {
        self.transport.check_read_only(call.action)?;
        let policy = RetryPolicy::new(&self.config.retry, call.service, call.action);
        retry_with_mockable_sleep(&policy, self.sleeper.as_ref(), |_| self.rpc_attempt(call)).await
    }

    async fn rpc_attempt(&self, call: &RpcCall<'_>) -> std::result::Result<Value, AttemptError> {
        let creds = self
            .credentials
            .load()
            .await
            .map_err(|e| AttemptError::Other(e.into()))?;
        let method = method_for_action(call.action);

        let mut params = call.params.clone();
        params.insert("Action".to_owned(), call.action.to_owned());
        params.insert("Version".to_owned(), call.version.to_owned());
        params.insert("Format".to_owned(), "JSON".to_owned());
        params.insert("AccessKeyId".to_owned(), creds.access_key_id.clone());
        params.insert("SignatureMethod".to_owned(), SIGNATURE_METHOD.to_owned());
        params.insert("SignatureVersion".to_owned(), SIGNATURE_VERSION.to_owned());
        // 每次请求（包括重试）都使用新的nonce
        params.insert("SignatureNonce".to_owned(), generate_nonce());
        params.insert("Timestamp".to_owned(), now_iso8601()?);
        if let Some(token) = &creds.sts_security_token {
            params.insert("SecurityToken".to_owned(), token.clone());
        }
        if self.config.debug {
            debug!(
                "request {} {} {}: {:?}",
                method,
                call.host,
                call.action,
                redact(&params)
            );
        }
        rpc_sign::sign_params(method.as_str(), &mut params, &creds.access_key_secret)?;

        let url = Url::parse_with_params(&format!("https://{}/", call.host), &params)
            .map_err(|e| AttemptError::Other(Error::Config(format!("invalid endpoint: {e}"))))?;
        let mut req = Request::new(method, url);
        req.headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static(SDK_USER_AGENT));

        let resp = self
            .transport
            .send_openapi(req, call.service.code(), call.action)
            .await?;
        if self.config.debug {
            debug!("response {} {}: {}", call.action, resp.status, resp.text());
        }
        parse_envelope(&resp)
    }

    /// 配置了资源组时，注入第一个存在的资源组；资源组获取失败时不注入
    pub(crate) async fn inject_resource_group(&self, service: Service, params: &mut Params) {
        if self.config.resource_group_ids.is_empty() || !service.supports_resource_group() {
            return;
        }
        let discovered = match self.resource_groups().await {
            Ok(groups) => groups.iter().map(|g| g.id.clone()).collect::<HashSet<_>>(),
            Err(e) => {
                debug!("skip resource group injection: {e}");
                return;
            }
        };
        inject_resource_group(params, &self.config.resource_group_ids, &discovered);
    }
}

pub(crate) fn redact(params: &Params) -> Params {
    params
        .iter()
        .filter(|(k, _)| !SENSITIVE_PARAMS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// 解析返回的json，`Code`不是`200`或者`Success`时视为错误
pub(crate) fn parse_envelope(resp: &HttpResponse) -> std::result::Result<Value, AttemptError> {
    let body = if resp.body.is_empty() {
        Value::Object(Map::new())
    } else {
        match serde_json::from_slice::<Value>(&resp.body) {
            Ok(v) => v,
            Err(e) if resp.status.is_success() => return Err(AttemptError::Other(Error::Json(e))),
            Err(_) => {
                return Err(AttemptError::Api {
                    status: resp.status,
                    code: String::new(),
                    message: resp.text(),
                    request_id: None,
                });
            }
        }
    };

    let field = |keys: [&str; 2]| keys.iter().find_map(|k| body.get_str_path(k));
    let code = field(["Code", "code"]).unwrap_or_default();
    let is_error = match code.as_str() {
        "" => !resp.status.is_success(),
        "200" | "Success" => false,
        _ => true,
    };
    if is_error {
        return Err(AttemptError::Api {
            status: resp.status,
            code,
            message: field(["Message", "message"]).unwrap_or_else(|| resp.text()),
            request_id: field(["RequestId", "requestId"]),
        });
    }
    Ok(body)
}

/// 给请求加上取消和超时
pub(crate) async fn run_with_context<T, F>(
    fut: F,
    cancel: Option<&CancellationToken>,
    timeout: Option<Duration>,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let fut = async {
        match timeout {
            Some(d) => match tokio::time::timeout(d, fut).await {
                Ok(res) => res,
                Err(_) => Err(Error::DeadlineExceeded),
            },
            None => fut.await,
        }
    };
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                res = fut => res,
            }
        }
        None => fut.await,
    }
}
