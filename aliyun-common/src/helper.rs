use crate::Error;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha1::Sha1;
use sha2::Sha256;
use std::collections::HashMap;
use time::OffsetDateTime;
use time::macros::format_description;

/// 输出格式: YYYY-MM-DDThh:mm:ssZ
///
/// eg: 2025-11-13T13:31:09Z
pub fn iso8601(date_time: &OffsetDateTime) -> Result<String, Error> {
    let s = date_time.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
    ))?;
    Ok(s)
}

pub fn now_iso8601() -> Result<String, Error> {
    iso8601(&OffsetDateTime::now_utc())
}

pub fn into_header_map(map: HashMap<String, String>) -> Result<HeaderMap, Error> {
    let mut header_map = HeaderMap::with_capacity(map.len());
    for (k, v) in map {
        let name = HeaderName::from_bytes(k.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{k}: {e}")))?;
        let value =
            HeaderValue::from_str(&v).map_err(|e| Error::InvalidHeader(format!("{k}: {e}")))?;
        header_map.insert(name, value);
    }
    Ok(header_map)
}

pub fn sign_hmac_sha1(secret: &[u8], str_to_sign: &[u8]) -> Vec<u8> {
    type HmacSha1 = Hmac<Sha1>;
    // HMAC接受任意长度的key
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(str_to_sign);
    mac.finalize().into_bytes().to_vec()
}

pub fn sign_hmac_sha256(secret: &[u8], str_to_sign: &[u8]) -> Vec<u8> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(str_to_sign);
    mac.finalize().into_bytes().to_vec()
}

pub fn parse_xml_bytes<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    let text = String::from_utf8_lossy(bytes);
    let data = quick_xml::de::from_str(&text)?;
    Ok(data)
}
