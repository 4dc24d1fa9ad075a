use crate::error::{Error, Result};
use crate::retry::AttemptError;
use crate::transport::HttpResponse;
use base64::{Engine, engine::general_purpose};
use md5::{Digest, Md5};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncReadExt;

pub const META_PREFIX: &str = "x-oss-meta-";

pub fn get_content_md5(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(Md5::digest(bytes))
}

// 用 buffer 读文件并计算MD5
pub(crate) async fn compute_md5_from_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(general_purpose::STANDARD.encode(hasher.finalize()))
}

/// [Object命名规则](https://help.aliyun.com/zh/oss/user-guide/object-naming-conventions)
pub(crate) fn validate_object_name(name: &str) -> Result<()> {
    let invalid = |msg: &str| Err(Error::Config(format!("invalid object name {name:?}: {msg}")));
    let len = name.len();
    if len == 0 {
        return invalid("empty");
    }
    if len > 1023 {
        return invalid("longer than 1023 bytes");
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return invalid("starts with '/' or '\\'");
    }
    if name.bytes().any(|b| b == b'\r' || b == b'\n') {
        return invalid("contains control characters");
    }
    // 忽略末尾`/`产生的空段
    let segments: Vec<&str> = name.trim_end_matches('/').split('/').collect();
    if name.ends_with("//") || segments.iter().any(|seg| seg.is_empty()) {
        return invalid("contains empty path segments");
    }
    if segments.iter().any(|seg| *seg == "." || *seg == "..") {
        return invalid("contains relative path segments");
    }
    Ok(())
}

/// 把builder序列化出来的字段转为header或者query，值为`None`的字段需要已经被跳过
pub(crate) fn to_string_map<T: serde::Serialize>(v: &T) -> Result<HashMap<String, String>> {
    Ok(serde_json::from_value(serde_json::to_value(v)?)?)
}

/// 响应头转为结构体，`x-oss-meta-*`单独返回
pub(crate) fn parse_response_header<T: DeserializeOwned>(
    headers: &HeaderMap,
) -> Result<(T, HashMap<String, String>)> {
    let mut map = Map::new();
    let mut metas = HashMap::new();
    for (k, v) in headers {
        let Ok(v) = v.to_str() else {
            continue;
        };
        let k = k.as_str().to_lowercase();
        if let Some(meta) = k.strip_prefix(META_PREFIX) {
            metas.insert(meta.to_owned(), v.to_owned());
        } else {
            map.insert(k, Value::String(v.to_owned()));
        }
    }
    Ok((serde_json::from_value(Value::Object(map))?, metas))
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
struct OssError {
    code: String,
    message: String,
    request_id: String,
}

/// OSS返回的错误是xml：`<Error><Code>NoSuchKey</Code>...</Error>`
pub(crate) fn parse_error(resp: &HttpResponse) -> AttemptError {
    let err = aliyun_common::helper::parse_xml_bytes::<OssError>(&resp.body).unwrap_or_default();
    // HEAD请求没有body，只能用header中的request id
    let request_id = if err.request_id.is_empty() {
        resp.headers
            .get("x-oss-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    } else {
        Some(err.request_id)
    };
    AttemptError::Api {
        status: resp.status,
        code: err.code,
        message: if err.message.is_empty() {
            resp.text()
        } else {
            err.message
        },
        request_id,
    }
}
