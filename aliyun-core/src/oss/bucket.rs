//! Bucket相关操作
//!
//! [阿里云API文档](https://help.aliyun.com/zh/oss/developer-reference/bucket-operations/)

use super::utils::to_string_map;
use super::{Client, OssBody, OssRequest};
use crate::error::Result;
use crate::pagination::paginate_by_marker;
use aliyun_common::helper::parse_xml_bytes;
use bon::Builder;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

// region:    --- list buckets
#[serde_as]
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListBuckets<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    client: &'a Client,
    prefix: Option<&'a str>,
    marker: Option<&'a str>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    max_keys: Option<u16>,
    #[serde(skip_serializing)]
    resource_group_id: Option<&'a str>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListAllMyBucketsResult {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub max_keys: Option<u32>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
    pub buckets: Buckets,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct Buckets {
    pub bucket: Vec<BucketSummary>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase", default)]
pub struct BucketSummary {
    pub name: String,
    pub location: String,
    pub region: String,
    pub creation_date: String,
    pub extranet_endpoint: String,
    pub intranet_endpoint: String,
    pub storage_class: String,
    pub resource_group_id: Option<String>,
}

impl ListBuckets<'_> {
    /// 一页
    pub async fn send(&self) -> Result<ListAllMyBucketsResult> {
        let client = self.client;
        let mut req = OssRequest::new("ListBuckets", Method::GET);
        req.query = to_string_map(self)?.into_iter().collect();
        if let Some(rg) = self.resource_group_id {
            req.headers
                .insert("x-oss-resource-group-id".to_owned(), rg.to_owned());
        }
        let resp = client.execute(&client.endpoint, &req).await?;
        Ok(parse_xml_bytes(&resp.body)?)
    }

    /// 按Marker翻页获取全部bucket
    pub async fn send_all(&self) -> Result<Vec<BucketSummary>> {
        paginate_by_marker(|marker| async move {
            let marker = marker.or_else(|| self.marker.map(str::to_owned));
            let page = ListBuckets {
                client: self.client,
                prefix: self.prefix,
                marker: marker.as_deref(),
                max_keys: self.max_keys,
                resource_group_id: self.resource_group_id,
            }
            .send()
            .await?;
            Ok((page.buckets.bucket, page.next_marker, page.is_truncated))
        })
        .await
    }
}
// endregion: --- list buckets

// region:    --- put bucket
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PutBucket<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    client: &'a Client,
    #[serde(skip_serializing)]
    bucket: &'a str,
    #[serde(skip_serializing)]
    storage_class: Option<&'a str>,
    #[serde(skip_serializing)]
    data_redundancy_type: Option<&'a str>,
    // header
    x_oss_acl: Option<&'a str>,
    x_oss_resource_group_id: Option<&'a str>,
    x_oss_bucket_tagging: Option<&'a str>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateBucketConfiguration<'a> {
    /// 默认为`Standard`
    storage_class: Option<&'a str>,
    /// 默认为`LRS`
    data_redundancy_type: Option<&'a str>,
}

impl PutBucket<'_> {
    pub async fn send(&self) -> Result<()> {
        let client = self.client;
        let body = quick_xml::se::to_string(&CreateBucketConfiguration {
            storage_class: self.storage_class,
            data_redundancy_type: self.data_redundancy_type,
        })
        .map_err(|e| crate::Error::Common(format!("xml serialize failed: {e}")))?;

        let mut req = OssRequest::new("PutBucket", Method::PUT);
        req.bucket = Some(self.bucket);
        req.headers = to_string_map(self)?;
        req.body = OssBody::Bytes(body.into());
        // 创建前bucket还不存在，不需要查询金融云的域名
        let host = format!("{}.{}", self.bucket, client.endpoint);
        client.execute(&host, &req).await?;
        Ok(())
    }
}
// endregion: --- put bucket

// region:    --- delete bucket
impl Client {
    /// bucket不存在时也返回成功
    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut req = OssRequest::new("DeleteBucket", Method::DELETE);
        req.bucket = Some(bucket);
        let host = self.bucket_host(bucket).await?;
        self.execute(&host, &req).await?;
        Ok(())
    }
}
// endregion: --- delete bucket

// region:    --- list objects v2
/// `list-type`将自动设为2
#[serde_as]
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListObjectsV2<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    client: &'a Client,
    #[serde(skip_serializing)]
    bucket: &'a str,
    delimiter: Option<&'a str>,
    start_after: Option<&'a str>,
    continuation_token: Option<&'a str>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    max_keys: Option<u16>,
    prefix: Option<&'a str>,
    encoding_type: Option<&'a str>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    fetch_owner: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListBucketResult {
    pub name: String,
    pub prefix: String,
    pub max_keys: u32,
    pub delimiter: Option<String>,
    pub is_truncated: bool,
    pub start_after: Option<String>,
    pub continuation_token: Option<String>,
    pub next_continuation_token: Option<String>,
    pub key_count: u32,
    pub contents: Vec<Content>,
    pub common_prefixes: Vec<CommonPrefixes>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase", default)]
pub struct CommonPrefixes {
    pub prefix: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase", default)]
pub struct Content {
    pub key: String,
    pub last_modified: String,
    pub e_tag: String,
    pub size: u64,
    pub storage_class: String,
    pub r#type: String,
    pub owner: Option<Owner>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase", default)]
pub struct Owner {
    pub display_name: String,
    #[serde(rename = "ID")]
    pub id: String,
}

impl ListObjectsV2<'_> {
    /// 一页
    pub async fn send(&self) -> Result<ListBucketResult> {
        let client = self.client;
        let mut req = OssRequest::new("ListObjectsV2", Method::GET);
        req.bucket = Some(self.bucket);
        req.query = to_string_map(self)?.into_iter().collect();
        req.query.push(("list-type".to_owned(), "2".to_owned()));
        req.query.sort();
        let host = client.bucket_host(self.bucket).await?;
        let resp = client.execute(&host, &req).await?;
        Ok(parse_xml_bytes(&resp.body)?)
    }

    /// 按ContinuationToken翻页获取全部object
    pub async fn send_all(&self) -> Result<Vec<Content>> {
        let pages = paginate_by_marker(|token| async move {
            let token = token.or_else(|| self.continuation_token.map(str::to_owned));
            let page = ListObjectsV2 {
                client: self.client,
                bucket: self.bucket,
                delimiter: self.delimiter,
                start_after: self.start_after,
                continuation_token: token.as_deref(),
                max_keys: self.max_keys,
                prefix: self.prefix,
                encoding_type: self.encoding_type,
                fetch_owner: self.fetch_owner,
            }
            .send()
            .await?;
            // 只有CommonPrefixes的一页不是空页
            let items = if page.contents.is_empty() && page.common_prefixes.is_empty() {
                Vec::new()
            } else {
                vec![page.contents]
            };
            Ok((items, page.next_continuation_token, page.is_truncated))
        })
        .await?;
        Ok(pages.into_iter().flatten().collect())
    }
}
// endregion: --- list objects v2

// region:    --- get bucket info
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct BucketInfo {
    pub bucket: Bucket,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct Bucket {
    pub name: String,
    pub creation_date: String,
    pub extranet_endpoint: Option<String>,
    pub intranet_endpoint: Option<String>,
    pub location: String,
    pub storage_class: String,
    pub resource_group_id: Option<String>,
    pub data_redundancy_type: Option<String>,
    pub comment: Option<String>,
    pub access_control_list: AccessControlList,
    pub owner: Option<Owner>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccessControlList {
    pub grant: String,
}

impl Client {
    /// 总是使用地域的默认域名，金融云用它来获取bucket自己的域名
    pub(crate) async fn fetch_bucket_info(&self, bucket: &str) -> Result<BucketInfo> {
        let mut req = OssRequest::new("GetBucketInfo", Method::GET);
        req.bucket = Some(bucket);
        req.query.push(("bucketInfo".to_owned(), String::new()));
        let host = format!("{bucket}.{}", self.endpoint);
        let resp = self.execute(&host, &req).await?;
        Ok(parse_xml_bytes(&resp.body)?)
    }

    pub async fn get_bucket_info(&self, bucket: &str) -> Result<BucketInfo> {
        self.fetch_bucket_info(bucket).await
    }
}
// endregion: --- get bucket info

// region:    --- get bucket location
// xml数据为："<LocationConstraint>oss-cn-hangzhou</LocationConstraint>"，
// 这种情况下使用xml反序列化比较特殊，写法得类似于下面这样：
#[derive(Deserialize)]
struct LocationConstraint {
    #[serde(rename = "$text")]
    field: String,
}

impl Client {
    /// 返回如`oss-cn-hangzhou`
    pub async fn get_bucket_location(&self, bucket: &str) -> Result<String> {
        let mut req = OssRequest::new("GetBucketLocation", Method::GET);
        req.bucket = Some(bucket);
        req.query.push(("location".to_owned(), String::new()));
        let host = self.bucket_host(bucket).await?;
        let resp = self.execute(&host, &req).await?;
        let res: LocationConstraint = parse_xml_bytes(&resp.body)?;
        Ok(res.field)
    }
}
// endregion: --- get bucket location

// region:    --- get bucket stat
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct BucketStat {
    pub storage: u64,
    pub object_count: u64,
    pub multipart_upload_count: u64,
    pub live_channel_count: u64,
    pub last_modified_time: u64,
    pub standard_storage: u64,
    pub standard_object_count: u64,
    pub infrequent_access_storage: u64,
    pub infrequent_access_object_count: u64,
    pub archive_storage: u64,
    pub archive_object_count: u64,
    pub cold_archive_storage: u64,
    pub cold_archive_object_count: u64,
}

impl Client {
    pub async fn get_bucket_stat(&self, bucket: &str) -> Result<BucketStat> {
        let mut req = OssRequest::new("GetBucketStat", Method::GET);
        req.bucket = Some(bucket);
        req.query.push(("stat".to_owned(), String::new()));
        let host = self.bucket_host(bucket).await?;
        let resp = self.execute(&host, &req).await?;
        Ok(parse_xml_bytes(&resp.body)?)
    }
}
// endregion: --- get bucket stat

impl Client {
    pub fn list_buckets(&self) -> ListBucketsBuilder<'_> {
        ListBuckets::builder(self)
    }

    pub fn put_bucket(&self) -> PutBucketBuilder<'_> {
        PutBucket::builder(self)
    }

    pub fn list_objects_v2(&self) -> ListObjectsV2Builder<'_> {
        ListObjectsV2::builder(self)
    }
}
