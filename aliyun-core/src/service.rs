//! 支持的云产品以及每个产品的默认版本、域名和分页大小

use crate::config::CloudEnv;
use aliyun_common::open_api_sign::OpenApiStyle;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Ecs,
    Vpc,
    Slb,
    Alb,
    Nlb,
    Rds,
    Kvstore,
    Nas,
    /// MongoDB
    Dds,
    Elasticsearch,
    Kafka,
    /// 容器服务Kubernetes版
    Cs,
    /// 函数计算
    Fc,
    Alidns,
    /// 云监控
    Cms,
    Ram,
    Sts,
    /// SAML身份提供商等
    Ims,
    ResourceManager,
    /// 费用中心
    Bss,
    Tag,
}

/// 获取产品域名的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointMode {
    /// 先使用默认域名，再通过该产品的`DescribeRegions`获取各个地域的域名并缓存
    Regional,
    /// 域名固定为`<code>.<region>.aliyuncs.com`
    RegionTemplate,
    /// 域名固定为`<account_id>.<region>.<code>.aliyuncs.com`
    AccountRegion,
    /// 全局唯一的域名，不区分地域
    Global,
}

impl Service {
    pub const ALL: [Service; 21] = [
        Service::Ecs,
        Service::Vpc,
        Service::Slb,
        Service::Alb,
        Service::Nlb,
        Service::Rds,
        Service::Kvstore,
        Service::Nas,
        Service::Dds,
        Service::Elasticsearch,
        Service::Kafka,
        Service::Cs,
        Service::Fc,
        Service::Alidns,
        Service::Cms,
        Service::Ram,
        Service::Sts,
        Service::Ims,
        Service::ResourceManager,
        Service::Bss,
        Service::Tag,
    ];

    /// 产品code，也是域名的第一段
    pub fn code(&self) -> &'static str {
        match self {
            Service::Ecs => "ecs",
            Service::Vpc => "vpc",
            Service::Slb => "slb",
            Service::Alb => "alb",
            Service::Nlb => "nlb",
            Service::Rds => "rds",
            Service::Kvstore => "r-kvstore",
            Service::Nas => "nas",
            Service::Dds => "mongodb",
            Service::Elasticsearch => "elasticsearch",
            Service::Kafka => "alikafka",
            Service::Cs => "cs",
            Service::Fc => "fc",
            Service::Alidns => "alidns",
            Service::Cms => "metrics",
            Service::Ram => "ram",
            Service::Sts => "sts",
            Service::Ims => "ims",
            Service::ResourceManager => "resourcemanager",
            Service::Bss => "business",
            Service::Tag => "tag",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            Service::Ecs => "2014-05-26",
            Service::Vpc => "2016-04-28",
            Service::Slb => "2014-05-15",
            Service::Alb => "2020-06-16",
            Service::Nlb => "2022-04-30",
            Service::Rds => "2014-08-15",
            Service::Kvstore => "2015-01-01",
            Service::Nas => "2017-06-26",
            Service::Dds => "2015-12-01",
            Service::Elasticsearch => "2017-06-13",
            Service::Kafka => "2019-09-16",
            Service::Cs => "2015-12-15",
            Service::Fc => "2023-03-30",
            Service::Alidns => "2015-01-09",
            Service::Cms => "2019-01-01",
            Service::Ram => "2015-05-01",
            Service::Sts => "2015-04-01",
            Service::Ims => "2019-08-15",
            Service::ResourceManager => "2020-03-31",
            Service::Bss => "2017-12-14",
            Service::Tag => "2018-08-28",
        }
    }

    pub fn endpoint_mode(&self) -> EndpointMode {
        match self {
            Service::Ecs
            | Service::Vpc
            | Service::Slb
            | Service::Rds
            | Service::Kvstore
            | Service::Dds
            | Service::Tag => EndpointMode::Regional,
            Service::Alb
            | Service::Nlb
            | Service::Nas
            | Service::Elasticsearch
            | Service::Kafka
            | Service::Cs
            | Service::Cms => EndpointMode::RegionTemplate,
            Service::Fc => EndpointMode::AccountRegion,
            Service::Alidns
            | Service::Ram
            | Service::Sts
            | Service::Ims
            | Service::ResourceManager
            | Service::Bss => EndpointMode::Global,
        }
    }

    pub fn style(&self) -> OpenApiStyle {
        match self {
            Service::Elasticsearch | Service::Cs | Service::Fc => OpenApiStyle::ROA,
            _ => OpenApiStyle::RPC,
        }
    }

    /// 没有指定地域时使用的域名
    pub fn default_domain(&self, env: CloudEnv) -> String {
        match (self, env) {
            // 国际站的费用中心在新加坡
            (Service::Bss, CloudEnv::International) => {
                "business.ap-southeast-1.aliyuncs.com".to_owned()
            }
            (Service::Cs, _) => "cs.aliyuncs.com".to_owned(),
            (Service::Elasticsearch | Service::Kafka | Service::Nas | Service::Cms, _) => {
                format!("{}.cn-hangzhou.aliyuncs.com", self.code())
            }
            (Service::Alb | Service::Nlb, _) => format!("{}.cn-hangzhou.aliyuncs.com", self.code()),
            (Service::Fc, _) => "fc.cn-hangzhou.aliyuncs.com".to_owned(),
            _ => format!("{}.aliyuncs.com", self.code()),
        }
    }

    /// `RegionTemplate`模式下某个地域的域名
    pub fn region_domain(&self, region_id: &str) -> String {
        format!("{}.{}.aliyuncs.com", self.code(), region_id)
    }

    /// 计算类产品默认分页为50，其它为100
    pub fn default_page_size(&self) -> u32 {
        match self {
            Service::Ecs | Service::Vpc | Service::Slb | Service::Rds | Service::Kvstore => 50,
            _ => 100,
        }
    }

    /// 有自己的TagResources/UntagResources/ListTagResources接口的产品，其它产品走标签服务
    pub fn has_own_tag_api(&self) -> bool {
        matches!(
            self,
            Service::Ecs | Service::Vpc | Service::Slb | Service::Rds | Service::Kvstore
        )
    }

    /// 是否支持`ResourceGroupId`参数
    pub fn supports_resource_group(&self) -> bool {
        !matches!(
            self,
            Service::Ram
                | Service::Sts
                | Service::Ims
                | Service::ResourceManager
                | Service::Bss
                | Service::Cms
        )
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
