use crate::Params;
use crate::client::{Client, ClientInner, RegionInfo, request_pages};
use crate::config::CloudEnv;
use crate::endpoint::{rewrite_region_in, rewrite_zone_in, rewrite_zone_out};
use crate::error::{Error, Result};
use crate::service::Service;
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

/// 某个地域，通过它发出的请求会自动带上`RegionId`
///
/// 只持有客户端的弱引用，客户端释放之后所有请求都会返回错误
#[derive(Clone)]
pub struct Region {
    info: RegionInfo,
    client: Weak<ClientInner>,
}

impl Region {
    pub(crate) fn new(info: RegionInfo, client: Weak<ClientInner>) -> Self {
        Self { info, client }
    }

    pub fn id(&self) -> &str {
        &self.info.region_id
    }

    pub fn local_name(&self) -> &str {
        &self.info.local_name
    }

    pub fn info(&self) -> &RegionInfo {
        &self.info
    }

    pub fn client(&self) -> Result<Client> {
        self.client
            .upgrade()
            .map(|inner| Client { inner })
            .ok_or_else(|| Error::Common("client has been dropped".to_owned()))
    }

    pub(crate) fn inner(&self) -> Result<Arc<ClientInner>> {
        self.client
            .upgrade()
            .ok_or_else(|| Error::Common("client has been dropped".to_owned()))
    }

    pub async fn request(&self, service: Service, action: &str, params: Params) -> Result<Value> {
        let client = self.client()?;
        client
            .rpc(service, action)
            .region_id(self.id())
            .params(params)
            .build()
            .send()
            .await
    }

    /// 同`request`，同时注入配置的资源组
    pub async fn request_in_resource_group(
        &self,
        service: Service,
        action: &str,
        params: Params,
    ) -> Result<Value> {
        let client = self.client()?;
        client
            .rpc(service, action)
            .region_id(self.id())
            .params(params)
            .with_resource_group(true)
            .build()
            .send()
            .await
    }

    /// 按页码获取这个地域的全部数据，见[`Client::request_all`]
    pub async fn request_all(
        &self,
        service: Service,
        action: &str,
        params: Params,
        list_path: &str,
    ) -> Result<Vec<Value>> {
        let client = self.client()?;
        request_pages(&client, service, action, Some(self.id()), params, list_path).await
    }

    pub async fn request_roa(
        &self,
        service: Service,
        action: &str,
        path_pattern: &str,
        params: Params,
        body: Option<Value>,
    ) -> Result<Value> {
        let client = self.client()?;
        client
            .roa(service, action)
            .region_id(self.id())
            .path_pattern(path_pattern)
            .params(params)
            .maybe_body(body)
            .build()
            .send()
            .await
    }

    pub async fn endpoint(&self, service: Service) -> Result<String> {
        self.client()?.resolve_endpoint(service, self.id()).await
    }

    fn is_finance(&self) -> bool {
        self.client
            .upgrade()
            .is_some_and(|inner| inner.config.cloud_env == CloudEnv::Finance)
    }

    /// 发给接口之前的可用区id，只有金融云会改写
    pub fn zone_out(&self, service: Service, zone_id: &str) -> String {
        if self.is_finance() {
            rewrite_zone_out(service, zone_id)
        } else {
            zone_id.to_owned()
        }
    }

    /// 接口返回的可用区id
    pub fn zone_in(&self, service: Service, zone_id: &str) -> String {
        if self.is_finance() {
            rewrite_zone_in(service, zone_id)
        } else {
            zone_id.to_owned()
        }
    }

    /// 接口返回的地域id
    pub fn region_in(&self, service: Service, region_id: &str) -> String {
        if self.is_finance() {
            rewrite_region_in(service, region_id)
        } else {
            region_id.to_owned()
        }
    }
}

impl Debug for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("region_id", &self.info.region_id)
            .field("local_name", &self.info.local_name)
            .finish()
    }
}
