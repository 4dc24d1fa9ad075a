#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod inject;
pub mod json;
pub mod oss;
pub mod pagination;
pub mod region;
pub mod retry;
pub mod roa;
pub mod rpc;
pub mod service;
pub mod tags;
pub mod transport;

use std::collections::BTreeMap;

/// OpenAPI请求参数，按key排序
pub type Params = BTreeMap<String, String>;

pub use client::{Client, RegionInfo, ResourceGroup, SubAccount};
pub use config::{ClientConfig, CloudEnv, PermissionHook, RetryConfig};
pub use credentials::{Credentials, CredentialsError, CredentialsProvider, StaticCredentialsProvider};
pub use endpoint::{rewrite_region_in, rewrite_region_out, rewrite_zone_in, rewrite_zone_out};
pub use error::{Error, ErrorKind, Result, TransportError};
pub use json::ValueExt;
pub use region::Region;
pub use retry::{MockableSleep, TokioSleep};
pub use roa::RoaRequest;
pub use rpc::RpcRequest;
pub use service::{EndpointMode, Service};
pub use transport::{HttpResponse, HttpSend, ReqwestHttpSend};
