//! 产品域名解析
//!
//! 每个产品的缓存只在第一次需要某个地域的域名时通过该产品的`DescribeRegions`填充，
//! 之后的请求直接读缓存。读取的时候只会看到"未填充"或者"已填充"两种状态。

use crate::config::CloudEnv;
use crate::json::ValueExt;
use crate::service::Service;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    Hit(String),
    /// 缓存已经填充，但是没有这个地域
    Miss,
    /// 还没有成功调用过`DescribeRegions`
    Empty,
}

#[derive(Default)]
pub(crate) struct EndpointResolver {
    cache: RwLock<HashMap<Service, Arc<HashMap<String, String>>>>,
}

impl EndpointResolver {
    pub(crate) fn lookup(&self, service: Service, region_id: &str) -> Lookup {
        let cache = match self.cache.read() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        match cache.get(&service) {
            Some(map) => match map.get(region_id) {
                Some(host) => Lookup::Hit(host.clone()),
                None => Lookup::Miss,
            },
            None => Lookup::Empty,
        }
    }

    /// 并发填充时内容相同，后写入的覆盖先写入的
    pub(crate) fn populate(&self, service: Service, endpoints: HashMap<String, String>) {
        let mut cache = match self.cache.write() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.insert(service, Arc::new(endpoints));
    }
}

/// 解析各个产品`DescribeRegions`的返回
///
/// 不同产品的结构不一样，如`Regions.Region`、`Regions.RDSRegion`、`RegionIds.KVStoreRegion`，
/// 域名字段也有`RegionEndpoint`和`EndPoint`两种，没有域名的地域会被忽略
pub(crate) fn parse_region_endpoints(resp: &Value) -> HashMap<String, String> {
    let mut res = HashMap::new();
    let containers = ["Regions", "RegionIds"];
    for container in containers {
        let Some(Value::Object(inner)) = resp.get(container) else {
            continue;
        };
        for list in inner.values() {
            let items = match list {
                Value::Array(arr) => arr.clone(),
                Value::Object(_) => vec![list.clone()],
                _ => continue,
            };
            for item in items {
                let Some(region_id) = item.get_str_path("RegionId") else {
                    continue;
                };
                let endpoint = ["RegionEndpoint", "EndPoint", "Endpoint"]
                    .iter()
                    .find_map(|k| item.get_str_path(k))
                    .filter(|e| !e.is_empty());
                if let Some(endpoint) = endpoint {
                    res.insert(region_id, endpoint);
                }
            }
        }
    }
    res
}

// 金融云中部分产品使用的地域id和ECS不同：(产品, 对外的地域id, 产品接口使用的地域id)
const FINANCE_REGION_REWRITES: [(Service, &str, &str); 2] = [
    (Service::Kvstore, "cn-hangzhou-finance", "cn-hangzhou"),
    (Service::Slb, "cn-hangzhou-finance", "cn-hangzhou"),
];

/// 适配层的地域id -> 接口使用的地域id
pub fn rewrite_region_out(service: Service, region_id: &str) -> String {
    FINANCE_REGION_REWRITES
        .iter()
        .find(|(s, outer, _)| *s == service && *outer == region_id)
        .map(|(_, _, inner)| inner.to_string())
        .unwrap_or_else(|| region_id.to_owned())
}

/// 接口返回的地域id -> 适配层的地域id
pub fn rewrite_region_in(service: Service, region_id: &str) -> String {
    FINANCE_REGION_REWRITES
        .iter()
        .find(|(s, _, inner)| *s == service && *inner == region_id)
        .map(|(_, outer, _)| outer.to_string())
        .unwrap_or_else(|| region_id.to_owned())
}

/// 适配层的可用区id -> 接口使用的可用区id，如`cn-hangzhou-finance-b` -> `cn-hangzhou-b`
pub fn rewrite_zone_out(service: Service, zone_id: &str) -> String {
    for (s, outer, inner) in FINANCE_REGION_REWRITES {
        if s == service {
            if let Some(suffix) = zone_id.strip_prefix(outer).and_then(|z| z.strip_prefix('-')) {
                return format!("{inner}-{suffix}");
            }
        }
    }
    zone_id.to_owned()
}

/// 接口返回的可用区id -> 适配层的可用区id
pub fn rewrite_zone_in(service: Service, zone_id: &str) -> String {
    for (s, outer, inner) in FINANCE_REGION_REWRITES {
        if s == service {
            if let Some(suffix) = zone_id.strip_prefix(inner).and_then(|z| z.strip_prefix('-')) {
                // 可用区后缀只有一个字母，避免`cn-hangzhou-finance-b`再被匹配一次
                if suffix.len() == 1 {
                    return format!("{outer}-{suffix}");
                }
            }
        }
    }
    zone_id.to_owned()
}

/// 只有金融云需要改写
pub(crate) fn region_for_env(env: CloudEnv, service: Service, region_id: &str) -> String {
    match env {
        CloudEnv::Finance => rewrite_region_out(service, region_id),
        _ => region_id.to_owned(),
    }
}
