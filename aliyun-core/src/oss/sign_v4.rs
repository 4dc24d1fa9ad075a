// 签名文档：https://help.aliyun.com/zh/oss/developer-reference/recommend-to-use-signature-version-4

use aliyun_common::Error;
use aliyun_common::helper::sign_hmac_sha256;
use aliyun_common::rpc_sign::percent_encode;
use reqwest::Method;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::macros::format_description;
use url::Url;

pub(crate) const SIGNATURE_VERSION: &str = "OSS4-HMAC-SHA256";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

pub(crate) fn date_str(date_time: &OffsetDateTime) -> Result<String, Error> {
    Ok(date_time.format(&format_description!("[year][month][day]"))?)
}

/// 如`20250117T110931Z`
pub(crate) fn date_time_str(date_time: &OffsetDateTime) -> Result<String, Error> {
    Ok(date_time.format(&format_description!(
        "[year][month][day]T[hour][minute][second]Z"
    ))?)
}

/// 参与签名的header：`content-type`、`content-md5`以及`x-oss-`开头的
pub(crate) fn is_signed_header(name: &str) -> bool {
    name == "content-type" || name == "content-md5" || name.starts_with("x-oss-")
}

// 构造过程参考文档中的[步骤1：构造CanonicalRequest]
// canonical_header的key需要是小写的
fn canonical_request(
    method: &Method,
    uri: &Url,
    bucket: Option<&str>,
    canonical_header: &BTreeMap<String, String>,
    additional_header: &[&str],
) -> String {
    let canonical_uri = match bucket {
        // uri.path即为object的名称
        Some(bucket) => format!("/{}{}", percent_encode(bucket), uri.path()),
        None => "/".to_owned(),
    };
    let canonical_query = uri
        .query_pairs()
        .filter(|(k, _)| k != "x-oss-signature")
        .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .map(|(k, v)| if v.is_empty() { k } else { format!("{k}={v}") })
        .collect::<Vec<_>>()
        .join("&");
    let canonical_headers: String = canonical_header
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k.to_lowercase(), v.trim()))
        .collect();

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{}\n{UNSIGNED_PAYLOAD}",
        additional_header.join(";")
    )
}

fn signing_key(access_key_secret: &str, date: &str, region: &str) -> Vec<u8> {
    let date_key = sign_hmac_sha256(format!("aliyun_v4{access_key_secret}").as_bytes(), date.as_bytes());
    let date_region_key = sign_hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = sign_hmac_sha256(&date_region_key, b"oss");
    sign_hmac_sha256(&date_region_service_key, b"aliyun_v4_request")
}

pub(crate) struct SignV4Param<'a> {
    pub signing_region: &'a str,
    pub method: &'a Method,
    pub uri: &'a Url,
    // 如果host中有bucket，则此处传入bucket名称，用于构建canonical_uri
    pub bucket: Option<&'a str>,
    pub header_map: &'a BTreeMap<String, String>,
    pub additional_header: &'a [&'a str],
    pub date_time: &'a OffsetDateTime,
}

/// 返回签名的十六进制字符串
pub(crate) fn signature(access_key_secret: &str, param: &SignV4Param<'_>) -> Result<String, Error> {
    if access_key_secret.is_empty() {
        return Err(Error::EmptySecret);
    }
    let date = date_str(param.date_time)?;
    let scope = format!("{date}/{}/oss/aliyun_v4_request", param.signing_region);
    let canonical = canonical_request(
        param.method,
        param.uri,
        param.bucket,
        param.header_map,
        param.additional_header,
    );
    let hashed = hex::encode(Sha256::digest(canonical.as_bytes()));
    let string_to_sign = format!(
        "{SIGNATURE_VERSION}\n{}\n{scope}\n{hashed}",
        date_time_str(param.date_time)?
    );
    let key = signing_key(access_key_secret, &date, param.signing_region);
    Ok(hex::encode(sign_hmac_sha256(&key, string_to_sign.as_bytes())))
}

/// Header中的`Authorization`
pub(crate) fn authorization(
    access_key_id: &str,
    access_key_secret: &str,
    param: &SignV4Param<'_>,
) -> Result<String, Error> {
    let signature = signature(access_key_secret, param)?;
    let date = date_str(param.date_time)?;
    let additional = if param.additional_header.is_empty() {
        String::new()
    } else {
        format!("AdditionalHeaders={},", param.additional_header.join(";"))
    };
    Ok(format!(
        "{SIGNATURE_VERSION} Credential={access_key_id}/{date}/{}/oss/aliyun_v4_request,{additional}Signature={signature}",
        param.signing_region
    ))
}
