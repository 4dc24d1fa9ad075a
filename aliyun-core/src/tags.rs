//! 资源标签
//!
//! - ECS、VPC、SLB、RDS、Redis有自己的`TagResources`/`UntagResources`/`ListTagResources`接口
//! - Elasticsearch、容器服务、函数计算是ROA风格的标签接口
//! - 其它产品通过标签服务按ARN打标签
//!
//! 系统标签（`aliyun`、`acs:`开头）不会被修改。

use crate::Params;
use crate::client::Client;
use crate::error::Result;
use crate::inject::{append_tag_key_params, append_tag_params, filter_system_tags, is_system_tag_key};
use crate::json::ValueExt;
use crate::pagination::paginate_by_token;
use crate::region::Region;
use crate::service::Service;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagApi {
    Own,
    Roa {
        path: &'static str,
        tag_method: Method,
    },
    TagService,
}

fn tag_api(service: Service) -> TagApi {
    match service {
        Service::Elasticsearch => TagApi::Roa {
            path: "/openapi/tags",
            tag_method: Method::POST,
        },
        Service::Cs => TagApi::Roa {
            path: "/tags",
            tag_method: Method::PUT,
        },
        Service::Fc => TagApi::Roa {
            path: "/tags",
            tag_method: Method::POST,
        },
        s if s.has_own_tag_api() => TagApi::Own,
        _ => TagApi::TagService,
    }
}

/// 标签服务使用的资源ARN
pub fn resource_arn(
    service: Service,
    region_id: &str,
    account_id: &str,
    resource_type: &str,
    resource_id: &str,
) -> String {
    format!(
        "acs:{}:{region_id}:{account_id}:{resource_type}/{resource_id}",
        service.code()
    )
}

// 不同产品返回的结构和字段大小写都不一样
const TAG_LIST_PATHS: [&str; 6] = [
    "TagResources.TagResource",
    "TagResources",
    "Result.TagResources.TagResource",
    "Result.TagResources",
    "tag_resources.tag_resource",
    "tag_resources",
];
const NEXT_TOKEN_PATHS: [&str; 3] = ["NextToken", "Result.NextToken", "next_token"];

pub(crate) fn parse_tag_page(resp: &Value) -> (Vec<Value>, Option<String>) {
    let items = TAG_LIST_PATHS
        .iter()
        .map(|p| resp.get_array_path(p))
        .find(|items| !items.is_empty())
        .unwrap_or_default();
    let token = NEXT_TOKEN_PATHS.iter().find_map(|p| resp.get_str_path(p));
    (items, token)
}

fn tag_pair(item: &Value) -> Option<(String, String)> {
    let key = item
        .get_str_path("TagKey")
        .or_else(|| item.get_str_path("tag_key"))?;
    let value = item
        .get_str_path("TagValue")
        .or_else(|| item.get_str_path("tag_value"))
        .unwrap_or_default();
    Some((key, value))
}

impl Region {
    /// 给资源打标签，`replace`为true时会先删除不在`tags`中的非系统标签
    pub async fn tag_resource(
        &self,
        service: Service,
        resource_type: &str,
        resource_id: &str,
        tags: &HashMap<String, String>,
        replace: bool,
    ) -> Result<()> {
        let tags = filter_system_tags(tags);
        if replace {
            let existing = self.list_tags(service, resource_type, resource_id).await?;
            let stale: Vec<String> = existing
                .into_keys()
                .filter(|k| !tags.contains_key(k))
                .collect();
            if !stale.is_empty() {
                self.untag_resource(service, resource_type, resource_id, &stale)
                    .await?;
            }
        }
        if tags.is_empty() {
            return Ok(());
        }

        let mut params = Params::new();
        match tag_api(service) {
            TagApi::Own => {
                params.insert("ResourceType".to_owned(), resource_type.to_owned());
                params.insert("ResourceId.1".to_owned(), resource_id.to_owned());
                append_tag_params(&mut params, &tags);
                self.request(service, "TagResources", params).await?;
            }
            TagApi::Roa { path, tag_method } => {
                params.insert("ResourceType".to_owned(), resource_type.to_owned());
                params.insert("ResourceId.1".to_owned(), resource_id.to_owned());
                params.insert("RegionId".to_owned(), self.id().to_owned());
                append_tag_params(&mut params, &tags);
                self.roa_tag_call(service, "TagResources", path, tag_method, params)
                    .await?;
            }
            TagApi::TagService => {
                let arn = self.arn(service, resource_type, resource_id).await?;
                params.insert("ResourceARN.1".to_owned(), arn);
                params.insert("Tags".to_owned(), serde_json::to_string(&tags)?);
                self.request(Service::Tag, "TagResources", params).await?;
            }
        }
        Ok(())
    }

    /// 删除资源的标签，系统标签会被忽略
    pub async fn untag_resource(
        &self,
        service: Service,
        resource_type: &str,
        resource_id: &str,
        keys: &[String],
    ) -> Result<()> {
        let keys: Vec<&String> = keys.iter().filter(|k| !is_system_tag_key(k)).collect();
        if keys.is_empty() {
            return Ok(());
        }

        let mut params = Params::new();
        match tag_api(service) {
            TagApi::Own => {
                params.insert("ResourceType".to_owned(), resource_type.to_owned());
                params.insert("ResourceId.1".to_owned(), resource_id.to_owned());
                append_tag_key_params(&mut params, keys);
                self.request(service, "UntagResources", params).await?;
            }
            TagApi::Roa { path, .. } => {
                params.insert("ResourceType".to_owned(), resource_type.to_owned());
                params.insert("ResourceId.1".to_owned(), resource_id.to_owned());
                params.insert("RegionId".to_owned(), self.id().to_owned());
                append_tag_key_params(&mut params, keys);
                self.roa_tag_call(service, "UntagResources", path, Method::DELETE, params)
                    .await?;
            }
            TagApi::TagService => {
                let arn = self.arn(service, resource_type, resource_id).await?;
                params.insert("ResourceARN.1".to_owned(), arn);
                params.insert("TagKeys".to_owned(), serde_json::to_string(&keys)?);
                self.request(Service::Tag, "UntagResources", params).await?;
            }
        }
        Ok(())
    }

    /// 资源的非系统标签
    pub async fn list_tags(
        &self,
        service: Service,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<HashMap<String, String>> {
        let api = tag_api(service);
        let arn = if api == TagApi::TagService {
            Some(self.arn(service, resource_type, resource_id).await?)
        } else {
            None
        };
        let items = paginate_by_token(|token| {
            let api = api.clone();
            let arn = arn.clone();
            async move {
                let mut params = Params::new();
                if let Some(t) = token {
                    params.insert("NextToken".to_owned(), t);
                }
                let resp = match api {
                    TagApi::Own => {
                        params.insert("ResourceType".to_owned(), resource_type.to_owned());
                        params.insert("ResourceId.1".to_owned(), resource_id.to_owned());
                        self.request(service, "ListTagResources", params).await?
                    }
                    TagApi::Roa { path, .. } => {
                        params.insert("ResourceType".to_owned(), resource_type.to_owned());
                        params.insert("ResourceId.1".to_owned(), resource_id.to_owned());
                        params.insert("RegionId".to_owned(), self.id().to_owned());
                        self.roa_tag_call(service, "ListTagResources", path, Method::GET, params)
                            .await?
                    }
                    TagApi::TagService => {
                        if let Some(arn) = arn {
                            params.insert("ResourceARN.1".to_owned(), arn);
                        }
                        self.request(Service::Tag, "ListTagResources", params).await?
                    }
                };
                Ok(parse_tag_page(&resp))
            }
        })
        .await?;

        Ok(items
            .iter()
            .filter_map(tag_pair)
            .filter(|(k, _)| !is_system_tag_key(k))
            .collect())
    }

    async fn arn(&self, service: Service, resource_type: &str, resource_id: &str) -> Result<String> {
        let account_id = self.inner()?.account_id().await?;
        Ok(resource_arn(
            service,
            self.id(),
            &account_id,
            resource_type,
            resource_id,
        ))
    }

    async fn roa_tag_call(
        &self,
        service: Service,
        action: &str,
        path: &str,
        method: Method,
        params: Params,
    ) -> Result<Value> {
        let client = self.client()?;
        client
            .roa(service, action)
            .region_id(self.id())
            .path_pattern(path)
            .method(method)
            .params(params)
            .build()
            .send()
            .await
    }
}

impl Client {
    pub async fn tag_resource(
        &self,
        region_id: &str,
        service: Service,
        resource_type: &str,
        resource_id: &str,
        tags: &HashMap<String, String>,
        replace: bool,
    ) -> Result<()> {
        self.region(region_id)?
            .tag_resource(service, resource_type, resource_id, tags, replace)
            .await
    }

    pub async fn untag_resource(
        &self,
        region_id: &str,
        service: Service,
        resource_type: &str,
        resource_id: &str,
        keys: &[String],
    ) -> Result<()> {
        self.region(region_id)?
            .untag_resource(service, resource_type, resource_id, keys)
            .await
    }

    pub async fn list_tags(
        &self,
        region_id: &str,
        service: Service,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<HashMap<String, String>> {
        self.region(region_id)?
            .list_tags(service, resource_type, resource_id)
            .await
    }
}
