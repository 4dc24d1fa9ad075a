//! ROA风格的请求
//!
//! 请求路径来自`PathPattern`，签名使用V3（ACS3-HMAC-SHA256，放在header中）。
//! 标签相关的参数（`ResourceId.N`、`Tag.N.Key`等）会根据请求方法转为json body或者逗号分隔的query。

use crate::Params;
use crate::client::{Client, ClientInner};
use crate::error::{Error, Result};
use crate::retry::{AttemptError, RetryPolicy, retry_with_mockable_sleep};
use crate::rpc::{SDK_USER_AGENT, parse_envelope, redact, run_with_context};
use crate::service::Service;
use crate::transport::method_for_action;
use aliyun_common::helper::{into_header_map, now_iso8601};
use aliyun_common::open_api_sign::{
    OpenApiStyle, RequestBody, SignParams, get_openapi_request_header,
};
use aliyun_common::rpc_sign::generate_nonce;
use bon::Builder;
use log::debug;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::{Method, Request};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub(crate) const PATH_PATTERN: &str = "PathPattern";

pub(crate) struct RoaCall<'a> {
    pub service: Service,
    pub host: String,
    pub version: &'a str,
    pub action: &'a str,
    pub method: Method,
    pub path: &'a str,
    pub query: &'a Params,
    pub body: Option<String>,
}

/// [ROA风格请求](https://help.aliyun.com/zh/sdk/product-overview/roa-mechanism)
#[derive(Builder)]
pub struct RoaRequest<'a> {
    #[builder(start_fn)]
    client: &'a Client,
    #[builder(start_fn)]
    service: Service,
    #[builder(start_fn)]
    action: &'a str,
    version: Option<&'a str>,
    /// 只用于解析域名
    region_id: Option<&'a str>,
    endpoint: Option<&'a str>,
    /// 为空时从`params["PathPattern"]`中获取
    path_pattern: Option<&'a str>,
    /// 不设置时根据action的前缀选择
    method: Option<Method>,
    #[builder(default)]
    params: Params,
    body: Option<Value>,
    cancel: Option<&'a CancellationToken>,
    timeout: Option<Duration>,
}

impl RoaRequest<'_> {
    pub async fn send(&self) -> Result<Value> {
        let inner = &self.client.inner;
        inner.transport.check_read_only(self.action)?;

        let fut = async {
            let mut params = self.params.clone();
            let pattern = params.remove(PATH_PATTERN);
            let path = self
                .path_pattern
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .or(pattern)
                .ok_or_else(|| Error::Config(format!("{} without {PATH_PATTERN}", self.action)))?;
            let method = self
                .method
                .clone()
                .unwrap_or_else(|| method_for_action(self.action));
            let body = translate_tag_params(&method, &mut params, self.body.clone());
            let body = body.map(|b| serde_json::to_string(&b)).transpose()?;

            let host = match self.endpoint {
                Some(e) => e.to_owned(),
                None => inner.endpoint(self.service, self.region_id).await,
            };
            let call = RoaCall {
                service: self.service,
                host,
                version: self.version.unwrap_or(self.service.api_version()),
                action: self.action,
                method,
                path: &path,
                query: &params,
                body,
            };
            inner.execute_roa(&call).await
        };
        run_with_context(fut, self.cancel, self.timeout).await
    }
}

impl ClientInner {
    pub(crate) async fn execute_roa(&self, call: &RoaCall<'_>) -> Result<Value> {
        self.transport.check_read_only(call.action)?;
        let policy = RetryPolicy::new(&self.config.retry, call.service, call.action);
        retry_with_mockable_sleep(&policy, self.sleeper.as_ref(), |_| self.roa_attempt(call)).await
    }

    async fn roa_attempt(&self, call: &RoaCall<'_>) -> std::result::Result<Value, AttemptError> {
        let creds = self
            .credentials
            .load()
            .await
            .map_err(|e| AttemptError::Other(e.into()))?;
        let date = now_iso8601()?;
        let nonce = generate_nonce();
        let body = call.body.as_deref().map(RequestBody::Json);
        let sign_params = SignParams {
            host: &call.host,
            x_acs_action: call.action,
            x_acs_date: &date,
            x_acs_signature_nonce: &nonce,
            x_acs_version: call.version,
            x_acs_security_token: creds.sts_security_token.as_deref(),
            style: OpenApiStyle::ROA,
            req_method: call.method.as_str(),
            path: call.path,
            query_map: call.query,
            request_body: body.as_ref(),
        };
        let (headers, url) = get_openapi_request_header(
            &creds.access_key_secret,
            &creds.access_key_id,
            sign_params,
        )?;
        if self.config.debug {
            debug!(
                "request {} {}{} {}: {:?} {}",
                call.method,
                call.host,
                call.path,
                call.action,
                redact(call.query),
                call.body.as_deref().unwrap_or_default()
            );
        }

        let url = Url::parse(&url)
            .map_err(|e| AttemptError::Other(Error::Config(format!("invalid endpoint: {e}"))))?;
        let mut req = Request::new(call.method.clone(), url);
        *req.headers_mut() = into_header_map(headers)?;
        req.headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static(SDK_USER_AGENT));
        if let Some(b) = &call.body {
            *req.body_mut() = Some(b.clone().into());
        }

        let resp = self
            .transport
            .send_openapi(req, call.service.code(), call.action)
            .await?;
        if self.config.debug {
            debug!("response {} {}: {}", call.action, resp.status, resp.text());
        }
        parse_envelope(&resp)
    }
}

/// `Prefix.N`中的N，不是这种格式时返回None
fn indexed<'a>(key: &'a str, prefix: &str) -> Option<(u32, &'a str)> {
    let rest = key.strip_prefix(prefix)?.strip_prefix('.')?;
    let (n, tail) = rest.split_once('.').unwrap_or((rest, ""));
    Some((n.parse().ok()?, tail))
}

/// 把标签相关的参数从`params`中取出
///
/// POST/PUT返回合并后的json body，GET/DELETE把它们改为逗号分隔的`ResourceIds`和`TagKeys`
pub(crate) fn translate_tag_params(
    method: &Method,
    params: &mut Params,
    body: Option<Value>,
) -> Option<Value> {
    let mut resource_ids = BTreeMap::new();
    let mut tags: BTreeMap<u32, (Option<String>, Option<String>)> = BTreeMap::new();
    let mut tag_keys = BTreeMap::new();

    params.retain(|k, v| {
        if let Some((n, "")) = indexed(k, "ResourceId") {
            resource_ids.insert(n, std::mem::take(v));
        } else if let Some((n, field)) = indexed(k, "Tag") {
            let entry = tags.entry(n).or_default();
            match field {
                "Key" => entry.0 = Some(std::mem::take(v)),
                "Value" => entry.1 = Some(std::mem::take(v)),
                _ => return true,
            }
        } else if let Some((n, "")) = indexed(k, "TagKey") {
            tag_keys.insert(n, std::mem::take(v));
        } else {
            return true;
        }
        false
    });
    if resource_ids.is_empty() && tags.is_empty() && tag_keys.is_empty() {
        return body;
    }

    let resource_ids: Vec<String> = resource_ids.into_values().collect();
    let mut tag_keys: Vec<String> = tag_keys.into_values().collect();

    if matches!(*method, Method::POST | Method::PUT) {
        let mut map = match body {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };
        if !resource_ids.is_empty() {
            map.insert("ResourceIds".to_owned(), json!(resource_ids));
        }
        if !tags.is_empty() {
            let tags: Vec<Value> = tags
                .into_values()
                .filter_map(|(k, v)| k.map(|k| json!({"key": k, "value": v.unwrap_or_default()})))
                .collect();
            map.insert("Tags".to_owned(), Value::Array(tags));
        }
        if !tag_keys.is_empty() {
            map.insert("TagKeys".to_owned(), json!(tag_keys));
        }
        if let Some(t) = params.remove("ResourceType") {
            map.insert("ResourceType".to_owned(), Value::String(t));
        }
        Some(Value::Object(map))
    } else {
        if !resource_ids.is_empty() {
            params.insert("ResourceIds".to_owned(), resource_ids.join(","));
        }
        tag_keys.extend(tags.into_values().filter_map(|(k, _)| k));
        if !tag_keys.is_empty() {
            params.insert("TagKeys".to_owned(), tag_keys.join(","));
        }
        body
    }
}
