use super::error::Error;
use super::helper::sign_hmac_sha256;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use url::Url;

// 阿里云签名文档链接：https://help.aliyun.com/zh/sdk/product-overview/v3-request-structure-and-signature

pub const SIGNATURE_ALGORITHM: &str = "ACS3-HMAC-SHA256";

pub struct SignParams<'a> {
    // 签名文档中的RequestHeader
    pub host: &'a str,
    pub x_acs_action: &'a str,
    // x-acs-content-sha256: 自动添加
    pub x_acs_date: &'a str,
    pub x_acs_signature_nonce: &'a str,
    pub x_acs_version: &'a str,
    // Authorization: 自动添加
    pub x_acs_security_token: Option<&'a str>,

    // 其它签名的时候需要的信息
    pub style: OpenApiStyle,
    pub req_method: &'a str,
    // ROA风格的请求路径，RPC风格为`/`
    pub path: &'a str,
    pub query_map: &'a BTreeMap<String, String>,
    pub request_body: Option<&'a RequestBody<'a>>,
}

fn replace_percent_encode(s: &str) -> String {
    s.replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenApiStyle {
    RPC,
    ROA,
}

/// CanonicalURI
///
/// return: (CanonicalURI, 完整的url用于发送http请求, CanonicalQueryString)
pub fn generate_can_uri(
    host: &str,
    path: &str,
    query_map: &BTreeMap<String, String>,
    style: OpenApiStyle,
) -> Result<(String, String, String), Error> {
    let base = match style {
        OpenApiStyle::RPC => format!("https://{host}/"),
        OpenApiStyle::ROA => format!("https://{host}{path}"),
    };
    let mut u = Url::parse(&base).map_err(|e| Error::Common(format!("url parse failed: {e}")))?;
    if !query_map.is_empty() {
        u.query_pairs_mut().extend_pairs(query_map);
    }
    // 使用的url::Url在构建的时候已经按照规范percentEncode过了，但是和文档提的java.net.URLEncoder一样也需要替换
    let can_uri = replace_percent_encode(u.path());
    // 传入的query_map已经是排序好的BTreeMap，所以直接使用url::Url构造的query部分就是排序好的
    let can_query_str = u.query().map(replace_percent_encode).unwrap_or_default();
    Ok((can_uri, u.to_string(), can_query_str))
}

pub struct GenerateCanHeadersRes {
    // CanonicalHeaders
    pub can_headers: String,
    // SignedHeaders
    pub can_signed_headers: String,
    // 公共请求头，当api调用的时候，直接把公共请求头加入请求的headers即可
    pub common_headers: HashMap<String, String>,
}

/// 传入后获得的签名，在发送的时候必须要和传入的一致
pub enum RequestBody<'a> {
    Json(&'a str),
    Binary(&'a [u8]),
}

impl RequestBody<'_> {
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => "application/json",
            RequestBody::Binary(_) => "application/octet-stream",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RequestBody::Json(s) => s.as_bytes(),
            RequestBody::Binary(b) => b,
        }
    }
}

// CanonicalizedHeaders
fn generate_can_headers(params: &SignParams<'_>, x_acs_content_sha256: &str) -> GenerateCanHeadersRes {
    let mut need_signed_headers = BTreeMap::new();
    need_signed_headers.insert("host".to_owned(), params.host.trim().to_owned());
    need_signed_headers.insert("x-acs-action".to_owned(), params.x_acs_action.to_owned());
    need_signed_headers.insert(
        "x-acs-content-sha256".to_owned(),
        x_acs_content_sha256.to_owned(),
    );
    need_signed_headers.insert("x-acs-date".to_owned(), params.x_acs_date.to_owned());
    need_signed_headers.insert(
        "x-acs-signature-nonce".to_owned(),
        params.x_acs_signature_nonce.to_owned(),
    );
    need_signed_headers.insert("x-acs-version".to_owned(), params.x_acs_version.to_owned());
    if let Some(s) = params.x_acs_security_token {
        need_signed_headers.insert("x-acs-security-token".to_owned(), s.trim().to_owned());
    }
    if let Some(body) = params.request_body {
        need_signed_headers.insert("content-type".to_owned(), body.content_type().to_owned());
    }

    let mut can_headers = String::new();
    let mut can_signed_headers = String::new();
    for (k, v) in &need_signed_headers {
        can_headers.push_str(format!("{k}:{v}\n").as_str());
        can_signed_headers.push_str(format!("{k};").as_str());
    }
    // 删除最后一个没用的`;`
    can_signed_headers.pop();

    let common_headers = need_signed_headers.into_iter().collect::<HashMap<_, _>>();

    GenerateCanHeadersRes {
        can_headers,
        can_signed_headers,
        common_headers,
    }
}

pub fn hash_sha256(bytes: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.unwrap_or(b""));
    hex::encode(hasher.finalize())
}

// 签名入口
pub fn get_openapi_request_header(
    access_key_secret: &str,
    access_key_id: &str,
    sign_params: SignParams<'_>,
) -> Result<(HashMap<String, String>, String), Error> {
    if access_key_secret.is_empty() {
        return Err(Error::EmptySecret);
    }
    // region    --- sign authorization
    let (can_uri, url_, can_query_str) = generate_can_uri(
        sign_params.host,
        sign_params.path,
        sign_params.query_map,
        sign_params.style,
    )?;

    // 如果没有body则使用空字符串的sha256值
    let body_hash = hash_sha256(sign_params.request_body.map(|b| b.as_bytes()));
    let generate_can_headers_res = generate_can_headers(&sign_params, &body_hash);

    let can_req_str = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        sign_params.req_method,
        can_uri,
        can_query_str,
        generate_can_headers_res.can_headers,
        generate_can_headers_res.can_signed_headers,
        body_hash
    );
    let hashed_can_request = hash_sha256(Some(can_req_str.as_bytes()));
    let str_to_sign = format!("{SIGNATURE_ALGORITHM}\n{hashed_can_request}");
    let signature = hex::encode(sign_hmac_sha256(
        access_key_secret.as_bytes(),
        str_to_sign.as_bytes(),
    ));
    // endregion --- sign authorization

    let mut common_headers = generate_can_headers_res.common_headers;
    let authorization = format!(
        "{SIGNATURE_ALGORITHM} Credential={},SignedHeaders={},Signature={}",
        access_key_id, generate_can_headers_res.can_signed_headers, signature
    );
    // 把Authorization加入common_headers构成最终的公共请求头
    common_headers.insert("Authorization".to_owned(), authorization);

    Ok((common_headers, url_))
}
