//! 多产品客户端
//!
//! 创建时通过ECS的`DescribeRegions`获取地域列表，失败则创建失败。
//! 账号ID和资源组列表在第一次使用时获取并缓存。

use crate::Params;
use crate::config::{ClientConfig, CloudEnv};
use crate::credentials::CredentialsProvider;
use crate::endpoint::{EndpointResolver, Lookup, parse_region_endpoints};
use crate::error::{Error, Result};
use crate::json::ValueExt;
use crate::pagination::{MAX_PAGE_SIZE, clamp_page_size, paginate_by_number, total_count};
use crate::region::Region;
use crate::retry::{MockableSleep, TokioSleep};
use crate::roa::RoaRequest;
use crate::rpc::{RpcCall, RpcRequest};
use crate::service::{EndpointMode, Service};
use crate::transport::{HttpSend, ReqwestHttpSend, Transport};
use bon::bon;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegionInfo {
    pub region_id: String,
    #[serde(default)]
    pub local_name: String,
    #[serde(default)]
    pub region_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub account_id: String,
}

/// 主账号和每个资源组各算一个子账号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAccount {
    pub name: String,
    /// 资源组对应的子账号为`<accessKey>/<groupId>`
    pub account: String,
    pub resource_group_id: Option<String>,
}

pub(crate) struct ClientInner {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) credentials: Arc<dyn CredentialsProvider>,
    pub(crate) transport: Transport,
    pub(crate) sleeper: Arc<dyn MockableSleep>,
    pub(crate) endpoints: EndpointResolver,
    pub(crate) regions: Vec<RegionInfo>,
    owner_id: OnceCell<String>,
    resource_groups: OnceCell<Vec<ResourceGroup>>,
}

#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

#[bon]
impl Client {
    /// ```no_run
    /// # async fn example() -> aliyun_core::Result<()> {
    /// use aliyun_core::{Client, ClientConfig};
    ///
    /// let config = ClientConfig::builder()
    ///     .account_name("prod")
    ///     .access_key("your_access_key")
    ///     .access_secret("your_access_secret")
    ///     .build();
    /// let client = Client::builder().config(config).build().await?;
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn new(
        config: ClientConfig,
        /// 不设置时使用reqwest
        http_send: Option<Arc<dyn HttpSend>>,
        /// 重试之间的等待，不设置时使用`tokio::time::sleep`
        sleeper: Option<Arc<dyn MockableSleep>>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let sender: Arc<dyn HttpSend> = match http_send {
            Some(s) => s,
            None => Arc::new(ReqwestHttpSend::from_config(&config)?),
        };
        let mut inner = ClientInner {
            credentials: config.credentials_provider(),
            transport: Transport::new(sender, config.clone()),
            sleeper: sleeper.unwrap_or_else(|| Arc::new(TokioSleep)),
            endpoints: EndpointResolver::default(),
            regions: Vec::new(),
            owner_id: OnceCell::new(),
            resource_groups: OnceCell::new(),
            config,
        };
        inner.regions = inner.bootstrap_regions().await?;
        debug!(
            "client {} ready with {} regions",
            inner.config.account_name,
            inner.regions.len()
        );
        Ok(Self {
            inner: Arc::new(inner),
        })
    }
}

impl Client {
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// RPC请求，使用产品的默认版本
    pub async fn request(&self, service: Service, action: &str, params: Params) -> Result<Value> {
        self.rpc(service, action).params(params).build().send().await
    }

    pub async fn request_with_version(
        &self,
        service: Service,
        version: &str,
        action: &str,
        params: Params,
    ) -> Result<Value> {
        self.rpc(service, action)
            .version(version)
            .params(params)
            .build()
            .send()
            .await
    }

    /// ROA请求，`path_pattern`为空时从`params["PathPattern"]`中获取
    pub async fn request_roa(
        &self,
        service: Service,
        version: &str,
        action: &str,
        path_pattern: &str,
        params: Params,
        body: Option<Value>,
    ) -> Result<Value> {
        self.roa(service, action)
            .version(version)
            .path_pattern(path_pattern)
            .params(params)
            .maybe_body(body)
            .build()
            .send()
            .await
    }

    /// 按页码获取全部数据，`list_path`如`"Vpcs.Vpc"`
    ///
    /// `params`中的`PageSize`不在`[1, 100]`范围内时使用产品的默认分页大小
    pub async fn request_all(
        &self,
        service: Service,
        action: &str,
        params: Params,
        list_path: &str,
    ) -> Result<Vec<Value>> {
        request_pages(self, service, action, None, params, list_path).await
    }

    pub fn rpc<'a>(
        &'a self,
        service: Service,
        action: &'a str,
    ) -> crate::rpc::RpcRequestBuilder<'a> {
        RpcRequest::builder(self, service, action)
    }

    pub fn roa<'a>(
        &'a self,
        service: Service,
        action: &'a str,
    ) -> crate::roa::RoaRequestBuilder<'a> {
        RoaRequest::builder(self, service, action)
    }

    /// 产品在某个地域的域名，需要时会调用该产品的`DescribeRegions`
    pub async fn resolve_endpoint(&self, service: Service, region_id: &str) -> Result<String> {
        let region = crate::endpoint::region_for_env(self.inner.config.cloud_env, service, region_id);
        Ok(self.inner.endpoint(service, Some(&region)).await)
    }

    pub fn regions(&self) -> Vec<Region> {
        self.inner
            .regions
            .iter()
            .map(|info| Region::new(info.clone(), Arc::downgrade(&self.inner)))
            .collect()
    }

    pub fn region(&self, region_id: &str) -> Result<Region> {
        self.inner
            .regions
            .iter()
            .find(|r| r.region_id == region_id)
            .map(|info| Region::new(info.clone(), Arc::downgrade(&self.inner)))
            .ok_or_else(|| Error::NotFound(format!("region {region_id}")))
    }

    pub async fn account_id(&self) -> Result<String> {
        self.inner.account_id().await
    }

    pub async fn resource_groups(&self) -> Result<Vec<ResourceGroup>> {
        self.inner.resource_groups().await
    }

    /// 通过ID或者名称查找资源组，名称对应多个资源组时返回`Duplicate`
    pub async fn resource_group(&self, id_or_name: &str) -> Result<ResourceGroup> {
        let groups = self.inner.resource_groups().await?;
        if let Some(g) = groups.iter().find(|g| g.id == id_or_name) {
            return Ok(g.clone());
        }
        let mut matched = groups
            .iter()
            .filter(|g| g.name == id_or_name || g.display_name == id_or_name);
        match (matched.next(), matched.next()) {
            (Some(g), None) => Ok(g.clone()),
            (Some(_), Some(_)) => Err(Error::Duplicate(format!("resource group {id_or_name}"))),
            _ => Err(Error::NotFound(format!("resource group {id_or_name}"))),
        }
    }

    /// 主账号加上每个资源组，配置了`resource_group_ids`时只返回其中的资源组
    ///
    /// 获取资源组失败时只返回主账号
    pub async fn sub_accounts(&self) -> Result<Vec<SubAccount>> {
        let config = &self.inner.config;
        let mut accounts = vec![SubAccount {
            name: config.account_name.clone(),
            account: config.access_key.clone(),
            resource_group_id: None,
        }];
        let groups = match self.inner.resource_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                warn!("list resource groups failed, only the primary account is returned: {e}");
                return Ok(accounts);
            }
        };
        accounts.extend(
            groups
                .into_iter()
                .filter(|g| {
                    config.resource_group_ids.is_empty() || config.resource_group_ids.contains(&g.id)
                })
                .map(|g| SubAccount {
                    name: format!("{}/{}", config.account_name, g.display_name),
                    account: format!("{}/{}", config.access_key, g.id),
                    resource_group_id: Some(g.id),
                }),
        );
        Ok(accounts)
    }
}

pub(crate) async fn request_pages(
    client: &Client,
    service: Service,
    action: &str,
    region_id: Option<&str>,
    params: Params,
    list_path: &str,
) -> Result<Vec<Value>> {
    let page_size = params
        .get("PageSize")
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    let page_size = clamp_page_size(page_size, service.default_page_size());
    paginate_by_number(page_size, |page_number, page_size| {
        let mut params = params.clone();
        params.insert("PageNumber".to_owned(), page_number.to_string());
        params.insert("PageSize".to_owned(), page_size.to_string());
        async move {
            let resp = client
                .rpc(service, action)
                .maybe_region_id(region_id)
                .params(params)
                .build()
                .send()
                .await?;
            Ok((resp.get_array_path(list_path), total_count(&resp)))
        }
    })
    .await
}

impl ClientInner {
    /// ECS的地域列表，同时填充ECS的域名缓存
    async fn bootstrap_regions(&self) -> Result<Vec<RegionInfo>> {
        let service = Service::Ecs;
        let params = Params::new();
        let call = RpcCall {
            service,
            host: service.default_domain(self.config.cloud_env),
            version: service.api_version(),
            action: "DescribeRegions",
            params: &params,
        };
        let resp = self.execute_rpc(&call).await?;
        let mut regions = resp
            .get_array_path("Regions.Region")
            .into_iter()
            .map(serde_json::from_value::<RegionInfo>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        // 金融云只保留金融云地域
        if self.config.cloud_env == CloudEnv::Finance {
            regions.retain(|r| r.region_id.contains("finance"));
        }
        self.endpoints.populate(service, parse_region_endpoints(&resp));
        Ok(regions)
    }

    /// 产品的域名，解析失败时使用默认域名
    pub(crate) async fn endpoint(&self, service: Service, region_id: Option<&str>) -> String {
        let env = self.config.cloud_env;
        let default = service.default_domain(env);
        let Some(region_id) = region_id.filter(|r| !r.is_empty()) else {
            return default;
        };
        match service.endpoint_mode() {
            EndpointMode::Global => default,
            EndpointMode::RegionTemplate => service.region_domain(region_id),
            EndpointMode::AccountRegion => match self.account_id().await {
                Ok(account) => format!("{account}.{region_id}.{}.aliyuncs.com", service.code()),
                Err(e) => {
                    warn!("resolve {service} endpoint without account id: {e}");
                    service.region_domain(region_id)
                }
            },
            EndpointMode::Regional => {
                if self.endpoints.lookup(service, region_id) == Lookup::Empty {
                    if let Err(e) = self.bootstrap_endpoints(service).await {
                        warn!("DescribeRegions of {service} failed, use {default}: {e}");
                        return default;
                    }
                }
                match self.endpoints.lookup(service, region_id) {
                    Lookup::Hit(host) => host,
                    _ => default,
                }
            }
        }
    }

    async fn bootstrap_endpoints(&self, service: Service) -> Result<()> {
        let params = Params::new();
        let call = RpcCall {
            service,
            host: service.default_domain(self.config.cloud_env),
            version: service.api_version(),
            action: "DescribeRegions",
            params: &params,
        };
        let resp = self.execute_rpc(&call).await?;
        self.endpoints.populate(service, parse_region_endpoints(&resp));
        Ok(())
    }

    pub(crate) async fn account_id(&self) -> Result<String> {
        self.owner_id
            .get_or_try_init(|| async {
                let service = Service::Sts;
                let params = Params::new();
                let call = RpcCall {
                    service,
                    host: service.default_domain(self.config.cloud_env),
                    version: service.api_version(),
                    action: "GetCallerIdentity",
                    params: &params,
                };
                let resp = self.execute_rpc(&call).await?;
                resp.get_str_path("AccountId")
                    .ok_or_else(|| Error::Common("GetCallerIdentity without AccountId".to_owned()))
            })
            .await
            .cloned()
    }

    /// 获取失败时返回`NoPermission`，下次调用会重新获取
    pub(crate) async fn resource_groups(&self) -> Result<Vec<ResourceGroup>> {
        let groups = self
            .resource_groups
            .get_or_try_init(|| async {
                let items = paginate_by_number(MAX_PAGE_SIZE, |page_number, page_size| async move {
                    let service = Service::ResourceManager;
                    let mut params = Params::new();
                    params.insert("PageNumber".to_owned(), page_number.to_string());
                    params.insert("PageSize".to_owned(), page_size.to_string());
                    let call = RpcCall {
                        service,
                        host: service.default_domain(self.config.cloud_env),
                        version: service.api_version(),
                        action: "ListResourceGroups",
                        params: &params,
                    };
                    let resp = self.execute_rpc(&call).await?;
                    Ok((
                        resp.get_array_path("ResourceGroups.ResourceGroup"),
                        total_count(&resp),
                    ))
                })
                .await?;
                items
                    .into_iter()
                    .map(serde_json::from_value::<ResourceGroup>)
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(Error::from)
            })
            .await
            .map_err(|e| match e {
                Error::Fatal { .. } | Error::NotFound(_) => {
                    Error::NoPermission(format!("ListResourceGroups: {e}"))
                }
                other => other,
            })?;
        Ok(groups.clone())
    }
}
