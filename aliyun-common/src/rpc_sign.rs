//! RPC风格接口的签名（签名版本V1：HMAC-SHA1）
//!
//! 签名文档：<https://help.aliyun.com/zh/sdk/product-overview/rpc-mechanism>

use crate::Error;
use crate::helper::sign_hmac_sha1;
use base64::{Engine, engine::general_purpose};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::BTreeMap;
use url::form_urlencoded;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const SIGNATURE_VERSION: &str = "1.0";

// 下边四个字符不用编码，移出需要编码的字符集
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// 按照RFC3986进行percentEncode，空格编码为`%20`
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, UNRESERVED).to_string()
}

/// CanonicalizedQueryString
///
/// 传入的是BTreeMap，所以参数已经按照key排好序
pub fn canonicalized_query(params: &BTreeMap<String, String>) -> String {
    // form_urlencoded和文档要求的编码有几个字符不同，需要替换
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
        .replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// StringToSign = HTTPMethod + "&" + percentEncode("/") + "&" + percentEncode(CanonicalizedQueryString)
pub fn string_to_sign(method: &str, params: &BTreeMap<String, String>) -> String {
    format!(
        "{}&{}&{}",
        method,
        percent_encode("/"),
        percent_encode(&canonicalized_query(params))
    )
}

/// 计算签名，`params`中不能包含`Signature`
pub fn sign(
    method: &str,
    params: &BTreeMap<String, String>,
    access_key_secret: &str,
) -> Result<String, Error> {
    if access_key_secret.is_empty() {
        return Err(Error::EmptySecret);
    }
    let str_to_sign = string_to_sign(method, params);
    let secret = format!("{access_key_secret}&");
    let res = sign_hmac_sha1(secret.as_bytes(), str_to_sign.as_bytes());
    Ok(general_purpose::STANDARD.encode(res))
}

/// 计算签名并把`Signature`加入参数中
pub fn sign_params(
    method: &str,
    params: &mut BTreeMap<String, String>,
    access_key_secret: &str,
) -> Result<(), Error> {
    params.remove("Signature");
    let signature = sign(method, params, access_key_secret)?;
    params.insert("Signature".to_owned(), signature);
    Ok(())
}

pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}
