//! [API 文档](https://help.aliyun.com/zh/oss/developer-reference/describeregions)

use super::{Client, OssRequest};
use crate::error::Result;
use aliyun_common::helper::parse_xml_bytes;
use bon::Builder;
use reqwest::Method;
use serde::Deserialize;

#[derive(Builder)]
pub struct DescribeRegions<'a> {
    #[builder(start_fn)]
    client: &'a Client,
    region: Option<&'a str>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct RegionInfoList {
    pub region_info: Vec<RegionInfo>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase", default)]
pub struct RegionInfo {
    pub region: String,
    pub internet_endpoint: String,
    pub internal_endpoint: String,
    pub accelerate_endpoint: String,
}

impl DescribeRegions<'_> {
    /// - `region`: 如果为`None`，则查询所有支持地域对应的Endpoint信息
    pub async fn send(&self) -> Result<RegionInfoList> {
        let client = self.client;
        let mut req = OssRequest::new("DescribeRegions", Method::GET);
        req.query = vec![(
            "regions".to_owned(),
            self.region.unwrap_or_default().to_owned(),
        )];
        let resp = client.execute(&client.endpoint, &req).await?;
        Ok(parse_xml_bytes(&resp.body)?)
    }
}

impl Client {
    pub fn describe_regions(&self) -> DescribeRegionsBuilder<'_> {
        DescribeRegions::builder(self)
    }
}
