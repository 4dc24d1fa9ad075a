//! Object基础操作
//!
//! [官方文档](https://help.aliyun.com/zh/oss/developer-reference/basic-operations-1/)

use super::sign_v4::{self, SIGNATURE_VERSION, SignV4Param};
use super::utils::{
    META_PREFIX, compute_md5_from_file, get_content_md5, parse_response_header, to_string_map,
    validate_object_name,
};
use super::{Client, OssBody, OssRequest};
use crate::error::{Error, Result};
use bon::Builder;
use bytes::Bytes;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;

/// 预签名URL的最长有效期（7天）
pub const MAX_PRESIGN_EXPIRES: u64 = 604_800;

// region:    --- put object
/// Header字段中：
/// - content_md5: 由程序自动添加
/// - content_length：由程序自动添加
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PutObject<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    client: &'a Client,
    // x-oss-meta-* Header，不序列化，收集到map中
    #[builder(field)]
    #[serde(skip_serializing)]
    custom_metas: HashMap<String, String>,
    #[serde(skip_serializing)]
    bucket: &'a str,

    /// 对于MIME不会进行检查合法性检查
    content_type: Option<&'a str>,
    cache_control: Option<&'a str>,
    content_disposition: Option<&'a str>,
    content_encoding: Option<&'a str>,
    x_oss_forbid_overwrite: Option<&'a str>,
    x_oss_object_acl: Option<&'a str>,
    x_oss_storage_class: Option<&'a str>,
    x_oss_tagging: Option<&'a str>,
}

/// `x-oss-meta-*`，key会自动加上前缀
pub trait OssMetaExt<'a>: Sized {
    fn custom_metas_mut(&mut self) -> &mut HashMap<String, String>;

    fn x_meta(mut self, key: &'a str, val: &'a str) -> Self {
        self.custom_metas_mut()
            .insert(format!("{META_PREFIX}{key}"), val.to_owned());
        self
    }

    fn x_metas(mut self, metas: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (key, val) in metas {
            self.custom_metas_mut()
                .insert(format!("{META_PREFIX}{key}"), val.to_owned());
        }
        self
    }
}

impl<'a, S: put_object_builder::State> OssMetaExt<'a> for PutObjectBuilder<'a, S> {
    fn custom_metas_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.custom_metas
    }
}

pub enum PutObjectBody {
    Bytes(Bytes),
    /// 流式上传，不会把整个文件读到内存中
    FilePath(PathBuf),
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PutObjectResponseHeader {
    pub etag: Option<String>,
    pub content_md5: Option<String>,
    pub x_oss_hash_crc64ecma: Option<String>,
    pub x_oss_version_id: Option<String>,
}

impl PutObject<'_> {
    /// - `object_name`：遵守OSS的Object[命名规则](https://help.aliyun.com/zh/oss/user-guide/object-naming-conventions)
    /// - `object`：如果需要创建文件夹，object_name以`/`结尾，数据为空即可
    pub async fn send(
        &self,
        object_name: &str,
        object: PutObjectBody,
    ) -> Result<PutObjectResponseHeader> {
        validate_object_name(object_name)?;
        let client = self.client;

        let mut headers = to_string_map(self)?;
        headers.extend(self.custom_metas.clone());
        let body = match object {
            PutObjectBody::Bytes(bytes) => {
                headers.insert("content-md5".to_owned(), get_content_md5(&bytes));
                headers.insert("content-length".to_owned(), bytes.len().to_string());
                OssBody::Bytes(bytes)
            }
            PutObjectBody::FilePath(path) => {
                let file_size = tokio::fs::metadata(&path).await?.len();
                headers.insert("content-length".to_owned(), file_size.to_string());
                headers.insert("content-md5".to_owned(), compute_md5_from_file(&path).await?);
                OssBody::File(path)
            }
        };

        let mut req = OssRequest::new("PutObject", Method::PUT);
        req.bucket = Some(self.bucket);
        req.object = Some(object_name);
        req.headers = headers;
        req.body = body;
        let host = client.bucket_host(self.bucket).await?;
        let resp = client.execute(&host, &req).await?;
        let (header, _) = parse_response_header(&resp.headers)?;
        Ok(header)
    }
}
// endregion: --- put object

// region:    --- get object
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GetObject<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    client: &'a Client,
    #[serde(skip_serializing)]
    bucket: &'a str,
    range: Option<&'a str>,
    if_modified_since: Option<&'a str>,
    if_none_match: Option<&'a str>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ObjectMeta {
    #[serde(default, skip_deserializing)]
    pub custom_x_oss_meta: HashMap<String, String>,
    #[serde_as(as = "DisplayFromStr")]
    pub content_length: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub x_oss_object_type: Option<String>,
    pub x_oss_storage_class: Option<String>,
    pub x_oss_hash_crc64ecma: Option<String>,
    pub x_oss_version_id: Option<String>,
}

impl GetObject<'_> {
    async fn get(&self, object_name: &str) -> Result<(Bytes, ObjectMeta)> {
        validate_object_name(object_name)?;
        let client = self.client;
        let mut req = OssRequest::new("GetObject", Method::GET);
        req.bucket = Some(self.bucket);
        req.object = Some(object_name);
        req.headers = to_string_map(self)?;
        let host = client.bucket_host(self.bucket).await?;
        let resp = client.execute(&host, &req).await?;
        let (mut meta, metas): (ObjectMeta, _) = parse_response_header(&resp.headers)?;
        meta.custom_x_oss_meta = metas;
        Ok((resp.body, meta))
    }

    pub async fn receive_bytes(&self, object_name: &str) -> Result<(Bytes, ObjectMeta)> {
        self.get(object_name).await
    }

    pub async fn download_to_file(&self, object_name: &str, file_path: &Path) -> Result<ObjectMeta> {
        let (data, meta) = self.get(object_name).await?;
        let mut file = tokio::fs::File::create(file_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(meta)
    }
}
// endregion: --- get object

impl Client {
    pub fn put_object(&self) -> PutObjectBuilder<'_> {
        PutObject::builder(self)
    }

    pub fn get_object(&self) -> GetObjectBuilder<'_> {
        GetObject::builder(self)
    }

    /// object不存在时返回`NotFound`
    pub async fn head_object(&self, bucket: &str, object_name: &str) -> Result<ObjectMeta> {
        validate_object_name(object_name)?;
        let mut req = OssRequest::new("HeadObject", Method::HEAD);
        req.bucket = Some(bucket);
        req.object = Some(object_name);
        let host = self.bucket_host(bucket).await?;
        let resp = self.execute(&host, &req).await?;
        let (mut meta, metas): (ObjectMeta, _) = parse_response_header(&resp.headers)?;
        meta.custom_x_oss_meta = metas;
        Ok(meta)
    }

    /// object不存在时也返回成功
    pub async fn delete_object(&self, bucket: &str, object_name: &str) -> Result<()> {
        validate_object_name(object_name)?;
        let mut req = OssRequest::new("DeleteObject", Method::DELETE);
        req.bucket = Some(bucket);
        req.object = Some(object_name);
        let host = self.bucket_host(bucket).await?;
        self.execute(&host, &req).await?;
        Ok(())
    }

    /// 生成GET的预签名URL，`expires`单位为秒，最长7天
    ///
    /// [签名文档和说明](https://help.aliyun.com/zh/oss/developer-reference/add-signatures-to-urls)
    pub async fn presign_get_object(
        &self,
        bucket: &str,
        object_name: &str,
        expires: u64,
    ) -> Result<String> {
        validate_object_name(object_name)?;
        if expires == 0 || expires > MAX_PRESIGN_EXPIRES {
            return Err(Error::Config(format!(
                "presign expires must be in 1..={MAX_PRESIGN_EXPIRES}"
            )));
        }
        let creds = self.inner.credentials.load().await?;
        let now = OffsetDateTime::now_utc();
        let date = sign_v4::date_str(&now)?;

        let mut req = OssRequest::new("GetObject", Method::GET);
        req.bucket = Some(bucket);
        req.object = Some(object_name);
        req.query = vec![
            ("x-oss-signature-version".to_owned(), SIGNATURE_VERSION.to_owned()),
            (
                "x-oss-credential".to_owned(),
                format!(
                    "{}/{date}/{}/oss/aliyun_v4_request",
                    creds.access_key_id, self.region
                ),
            ),
            ("x-oss-date".to_owned(), sign_v4::date_time_str(&now)?),
            ("x-oss-expires".to_owned(), expires.to_string()),
        ];
        if let Some(token) = &creds.sts_security_token {
            req.query
                .push(("x-oss-security-token".to_owned(), token.clone()));
        }
        let host = self.bucket_host(bucket).await?;
        let mut url = self.request_url(&host, &req)?;
        let headers = BTreeMap::new();
        let signature = sign_v4::signature(
            &creds.access_key_secret,
            &SignV4Param {
                signing_region: &self.region,
                method: &req.method,
                uri: &url,
                bucket: Some(bucket),
                header_map: &headers,
                additional_header: &[],
                date_time: &now,
            },
        )?;
        url.query_pairs_mut().append_pair("x-oss-signature", &signature);
        Ok(url.to_string())
    }
}
