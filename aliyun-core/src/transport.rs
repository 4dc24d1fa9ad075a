//! 发送http请求的地方，所有请求（包括OSS）都要经过`Transport`，
//! 在发送前检查只读账号，在收到响应后检查是否是权限不足。

use crate::config::ClientConfig;
use crate::error::{Error, TransportError};
use crate::retry::EmptyResponse;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, StatusCode};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl EmptyResponse for HttpResponse {
    fn empty() -> Self {
        Self::new(StatusCode::NO_CONTENT, Bytes::new())
    }
}

/// 真正发送请求的trait，测试的时候可以替换成自己的实现
#[async_trait]
pub trait HttpSend: Send + Sync + 'static {
    async fn http_send(&self, req: Request) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Default)]
pub struct ReqwestHttpSend {
    client: reqwest::Client,
}

impl ReqwestHttpSend {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// 根据配置创建，连接超时较短，读超时较长（上传大文件的时候需要）
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout);
        if let Some(proxy_fn) = config.proxy.clone() {
            builder = builder.proxy(reqwest::Proxy::custom(move |url| proxy_fn(url)));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("build http client failed: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: Request) -> Result<HttpResponse, TransportError> {
        let resp = self.client.execute(req).await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// 只读的接口前缀
const READ_PREFIXES: [&str; 4] = ["Get", "List", "Describe", "Query"];

pub fn is_read_action(action: &str) -> bool {
    READ_PREFIXES.iter().any(|p| action.starts_with(p))
}

/// 根据接口名选择http方法
pub fn method_for_action(action: &str) -> Method {
    if is_read_action(action) {
        Method::GET
    } else if action.starts_with("Delete") || action.starts_with("Untag") {
        Method::DELETE
    } else {
        Method::POST
    }
}

/// 判断响应中的错误码是否表示没有权限
pub fn is_permission_denied(service: &str, action: &str, code: &str) -> bool {
    matches!(code, "NoPermission" | "SubAccountNoPermission")
        || code.starts_with("Forbidden")
        || is_balance_internal_error(service, action, code)
}

/// 子账号没有查询余额的权限时，费用中心返回的是InternalError
pub fn is_balance_internal_error(service: &str, action: &str, code: &str) -> bool {
    service == "business" && action == "QueryAccountBalance" && code == "InternalError"
}

#[derive(Clone)]
pub(crate) struct Transport {
    sender: Arc<dyn HttpSend>,
    config: Arc<ClientConfig>,
}

impl Transport {
    pub(crate) fn new(sender: Arc<dyn HttpSend>, config: Arc<ClientConfig>) -> Self {
        Self { sender, config }
    }

    pub(crate) fn check_read_only(&self, action: &str) -> Result<(), Error> {
        if self.config.read_only && !is_read_action(action) {
            return Err(Error::AccountReadOnly(action.to_owned()));
        }
        Ok(())
    }

    /// OpenAPI（RPC/ROA）请求
    pub(crate) async fn send_openapi(
        &self,
        req: Request,
        service: &str,
        action: &str,
    ) -> Result<HttpResponse, Error> {
        self.check_read_only(action)?;
        let resp = self.sender.http_send(req).await?;
        if !resp.status.is_success() && self.config.permission_hook.is_some() {
            if let Some(code) = error_code_of(&resp.body) {
                let hit = is_balance_internal_error(service, action, &code)
                    || (resp.status.is_client_error()
                        && is_permission_denied(service, action, &code));
                if hit {
                    self.config.notify_permission(service, action);
                }
            }
        }
        Ok(resp)
    }

    /// OSS请求，只读账号只允许GET和HEAD
    pub(crate) async fn send_oss(&self, req: Request) -> Result<HttpResponse, Error> {
        let action = format!("{} {}", req.method(), req.url().path());
        if self.config.read_only && !matches!(*req.method(), Method::GET | Method::HEAD) {
            return Err(Error::AccountReadOnly(action));
        }
        let resp = self.sender.http_send(req).await?;
        if resp.status == StatusCode::FORBIDDEN {
            self.config.notify_permission("oss", &action);
        }
        Ok(resp)
    }
}

fn error_code_of(body: &[u8]) -> Option<String> {
    let v: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["Code", "code"]
        .iter()
        .find_map(|k| v.get(*k))
        .and_then(|c| match c {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}
