//! OSS子客户端
//!
//! 阿里云oss文档：<https://help.aliyun.com/zh/oss/>
//!
//! - 和OpenAPI请求共用凭证、重试策略以及`Transport`（只读账号只能发GET/HEAD请求，403会触发权限回调）
//! - 使用Header携带V4签名，预签名URL使用query携带签名
//! - 金融云的bucket使用`GetBucketInfo`返回的`ExtranetEndpoint`

pub mod bucket;
pub mod object;
pub mod region;

pub(crate) mod sign_v4;
pub(crate) mod utils;

use crate::client::ClientInner;
use crate::config::CloudEnv;
use crate::error::{Error, Result};
use crate::retry::{AttemptError, RetryPolicy, retry_with_mockable_sleep};
use crate::transport::HttpResponse;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::{Body, Method, Request};
use sign_v4::SignV4Param;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;
use url::Url;

/// 某个地域的OSS客户端，通过[`crate::Client::oss_client`]创建
pub struct Client {
    inner: Arc<ClientInner>,
    region: String,
    endpoint: String,
    // 金融云bucket -> ExtranetEndpoint
    bucket_endpoints: RwLock<HashMap<String, String>>,
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("oss::Client")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// region和endpoint：<https://help.aliyun.com/zh/oss/user-guide/regions-and-endpoints>
pub fn endpoint_for(region_id: &str, internal: bool) -> String {
    if internal {
        format!("oss-{region_id}-internal.aliyuncs.com")
    } else {
        format!("oss-{region_id}.aliyuncs.com")
    }
}

pub(crate) enum OssBody {
    Empty,
    Bytes(bytes::Bytes),
    /// 每次请求都重新打开文件
    File(PathBuf),
}

/// 一次OSS请求
pub(crate) struct OssRequest<'a> {
    /// 用于重试策略和日志，如`DeleteObject`
    pub action: &'a str,
    pub method: Method,
    pub bucket: Option<&'a str>,
    /// 不以`/`开头
    pub object: Option<&'a str>,
    pub query: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
    pub body: OssBody,
}

impl<'a> OssRequest<'a> {
    pub(crate) fn new(action: &'a str, method: Method) -> Self {
        Self {
            action,
            method,
            bucket: None,
            object: None,
            query: Vec::new(),
            headers: HashMap::new(),
            body: OssBody::Empty,
        }
    }
}

impl Client {
    pub(crate) fn new(inner: Arc<ClientInner>, region: &str, internal: bool) -> Self {
        Self {
            inner,
            region: region.to_owned(),
            endpoint: endpoint_for(region, internal),
            bucket_endpoints: RwLock::new(HashMap::new()),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// bucket所在的域名
    pub(crate) async fn bucket_host(&self, bucket: &str) -> Result<String> {
        if self.inner.config.cloud_env != CloudEnv::Finance {
            return Ok(format!("{bucket}.{}", self.endpoint));
        }
        let cached = match self.bucket_endpoints.read() {
            Ok(m) => m.get(bucket).cloned(),
            Err(poisoned) => poisoned.into_inner().get(bucket).cloned(),
        };
        let endpoint = match cached {
            Some(e) => e,
            None => {
                let info = match self.fetch_bucket_info(bucket).await {
                    Ok(info) => info,
                    // bucket还不存在，使用地域的域名，不缓存
                    Err(e) if e.is_not_found() => return Ok(format!("{bucket}.{}", self.endpoint)),
                    Err(e) => return Err(e),
                };
                let endpoint = match info.bucket.extranet_endpoint {
                    Some(e) if !e.is_empty() => e,
                    _ => self.endpoint.clone(),
                };
                let mut map = match self.bucket_endpoints.write() {
                    Ok(m) => m,
                    Err(poisoned) => poisoned.into_inner(),
                };
                map.insert(bucket.to_owned(), endpoint.clone());
                endpoint
            }
        };
        Ok(format!("{bucket}.{endpoint}"))
    }

    pub(crate) fn request_url(&self, host: &str, req: &OssRequest<'_>) -> Result<Url> {
        let mut url = Url::parse(&format!("https://{host}/{}", req.object.unwrap_or_default()))
            .map_err(|e| Error::Config(format!("invalid oss url: {e}")))?;
        if !req.query.is_empty() {
            // 子资源如`?acl`没有值
            let query = req
                .query
                .iter()
                .map(|(k, v)| {
                    if v.is_empty() {
                        aliyun_common::rpc_sign::percent_encode(k)
                    } else {
                        format!(
                            "{}={}",
                            aliyun_common::rpc_sign::percent_encode(k),
                            aliyun_common::rpc_sign::percent_encode(v)
                        )
                    }
                })
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
        Ok(url)
    }

    /// 签名并发送请求，失败时按照OpenAPI相同的策略重试
    pub(crate) async fn execute(&self, host: &str, req: &OssRequest<'_>) -> Result<HttpResponse> {
        let policy = RetryPolicy::for_action(&self.inner.config.retry, req.action);
        retry_with_mockable_sleep(&policy, self.inner.sleeper.as_ref(), |_| self.attempt(host, req))
            .await
    }

    async fn attempt(
        &self,
        host: &str,
        req: &OssRequest<'_>,
    ) -> std::result::Result<HttpResponse, AttemptError> {
        let creds = self
            .inner
            .credentials
            .load()
            .await
            .map_err(|e| AttemptError::Other(e.into()))?;
        let url = self.request_url(host, req)?;
        let now = OffsetDateTime::now_utc();

        let mut headers = req.headers.clone();
        headers.insert(
            "x-oss-date".to_owned(),
            sign_v4::date_time_str(&now)?,
        );
        headers.insert(
            "x-oss-content-sha256".to_owned(),
            "UNSIGNED-PAYLOAD".to_owned(),
        );
        if let Some(token) = &creds.sts_security_token {
            headers.insert("x-oss-security-token".to_owned(), token.clone());
        }

        // 把需要签名的header和不需要签名的header分开
        let (signed, remaining): (BTreeMap<_, _>, BTreeMap<_, _>) = headers
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .partition(|(k, _)| sign_v4::is_signed_header(k));
        let mut canonical = signed;
        canonical.insert("host".to_owned(), host.to_owned());
        let param = SignV4Param {
            signing_region: &self.region,
            method: &req.method,
            uri: &url,
            bucket: req.bucket,
            header_map: &canonical,
            additional_header: &["host"],
            date_time: &now,
        };
        let authorization =
            sign_v4::authorization(&creds.access_key_id, &creds.access_key_secret, &param)?;

        let mut all = canonical.into_iter().chain(remaining).collect::<HashMap<_, _>>();
        all.insert("authorization".to_owned(), authorization);
        let mut request = Request::new(req.method.clone(), url);
        *request.headers_mut() = aliyun_common::helper::into_header_map(all)?;
        request.headers_mut().insert(
            USER_AGENT,
            HeaderValue::from_static(crate::rpc::SDK_USER_AGENT),
        );
        *request.body_mut() = match &req.body {
            OssBody::Empty => None,
            OssBody::Bytes(b) => Some(Body::from(b.clone())),
            OssBody::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| AttemptError::Other(e.into()))?;
                Some(Body::wrap_stream(tokio_util::io::ReaderStream::new(file)))
            }
        };

        if self.inner.config.debug {
            log::debug!("oss request {} {}", req.method, request.url());
        }
        let resp = self.inner.transport.send_oss(request).await?;
        if self.inner.config.debug {
            log::debug!("oss response {} {}", req.action, resp.status);
        }
        if !resp.status.is_success() {
            return Err(utils::parse_error(&resp));
        }
        Ok(resp)
    }
}

impl crate::client::Client {
    /// 某个地域的OSS客户端，使用外网域名
    pub fn oss_client(&self, region_id: &str) -> Client {
        Client::new(self.inner.clone(), region_id, false)
    }

    /// 使用内网域名，如`oss-cn-hangzhou-internal.aliyuncs.com`
    pub fn oss_internal_client(&self, region_id: &str) -> Client {
        Client::new(self.inner.clone(), region_id, true)
    }
}
