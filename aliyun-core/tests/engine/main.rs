//! 使用脚本化的`HttpSend`测试完整的请求流程，不访问网络

use aliyun_core::oss::object::PutObjectBody;
use aliyun_core::{
    Client, ClientConfig, CloudEnv, Error, ErrorKind, HttpResponse, HttpSend, MockableSleep,
    Params, Service, TransportError,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, StatusCode};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ECS_REGIONS: &str = r#"{
    "RequestId": "r-1",
    "Regions": {"Region": [
        {"RegionId": "cn-hangzhou", "LocalName": "华东1（杭州）", "RegionEndpoint": "ecs.cn-hangzhou.aliyuncs.com"},
        {"RegionId": "cn-shanghai", "LocalName": "华东2（上海）", "RegionEndpoint": "ecs.cn-shanghai.aliyuncs.com"}
    ]}
}"#;

const RESOURCE_GROUPS: &str = r#"{
    "TotalCount": 3,
    "ResourceGroups": {"ResourceGroup": [
        {"Id": "rg-1", "Name": "ops", "DisplayName": "Ops"},
        {"Id": "rg-2", "Name": "web", "DisplayName": "shared"},
        {"Id": "rg-3", "Name": "api", "DisplayName": "shared"}
    ]}
}"#;

#[derive(Clone)]
enum Reply {
    Status(StatusCode, &'static str),
    Network(&'static str),
}

#[derive(Debug, Clone)]
struct Recorded {
    key: String,
    method: Method,
    host: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
}

/// 按接口名返回预设的响应，队列只剩一个时重复使用
#[derive(Default)]
struct ScriptedSend {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    log: Mutex<Vec<Recorded>>,
}

impl ScriptedSend {
    fn new() -> Arc<Self> {
        let s = Arc::new(Self::default());
        s.route("DescribeRegions", [Reply::Status(StatusCode::OK, ECS_REGIONS)]);
        s
    }

    /// `key`为接口名，或者`<host> <接口名>`，OSS请求为`<METHOD> <host><path>`
    fn route(&self, key: &str, replies: impl IntoIterator<Item = Reply>) {
        self.routes
            .lock()
            .unwrap()
            .insert(key.to_owned(), replies.into_iter().collect());
    }

    fn calls(&self, key: &str) -> Vec<Recorded> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.key == key)
            .cloned()
            .collect()
    }

    fn total(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    fn next_reply(&self, keys: &[String]) -> Reply {
        let mut routes = self.routes.lock().unwrap();
        for key in keys {
            if let Some(queue) = routes.get_mut(key) {
                return if queue.len() > 1 {
                    queue.pop_front().unwrap()
                } else {
                    queue.front().cloned().unwrap()
                };
            }
        }
        Reply::Status(StatusCode::OK, r#"{"RequestId":"default"}"#)
    }
}

#[async_trait]
impl HttpSend for ScriptedSend {
    async fn http_send(&self, req: Request) -> Result<HttpResponse, TransportError> {
        let url = req.url();
        let host = url.host_str().unwrap_or_default().to_owned();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let action = query.get("Action").cloned().or_else(|| {
            req.headers()
                .get("x-acs-action")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        });
        let key = match &action {
            Some(a) => a.clone(),
            None => format!("{} {host}{}", req.method(), url.path()),
        };
        let mut keys = Vec::new();
        if let Some(a) = &action {
            keys.push(format!("{host} {a}"));
        }
        keys.push(key.clone());

        self.log.lock().unwrap().push(Recorded {
            key,
            method: req.method().clone(),
            host,
            query,
            headers: req.headers().clone(),
        });
        match self.next_reply(&keys) {
            Reply::Status(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::Network(msg) => Err(TransportError::new(msg)),
        }
    }
}

#[derive(Default)]
struct NoSleep(Mutex<Vec<Duration>>);

#[async_trait]
impl MockableSleep for NoSleep {
    async fn sleep(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

fn config() -> ClientConfig {
    ClientConfig::builder()
        .account_name("prod")
        .access_key("AK1")
        .access_secret("SK1")
        .build()
}

async fn client_with(
    config: ClientConfig,
    send: Arc<ScriptedSend>,
) -> (Client, Arc<NoSleep>) {
    let sleeper = Arc::new(NoSleep::default());
    let client = Client::builder()
        .config(config)
        .http_send(send)
        .sleeper(sleeper.clone())
        .build()
        .await
        .unwrap();
    (client, sleeper)
}

#[tokio::test]
async fn bootstrap_loads_regions_and_ecs_endpoints() {
    let send = ScriptedSend::new();
    let (client, _) = client_with(config(), send.clone()).await;

    assert_eq!(client.regions().len(), 2);
    let region = client.region("cn-hangzhou").unwrap();
    assert_eq!(region.local_name(), "华东1（杭州）");
    assert_eq!(
        client.region("cn-nowhere").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        client.resolve_endpoint(Service::Ecs, "cn-shanghai").await.unwrap(),
        "ecs.cn-shanghai.aliyuncs.com"
    );
    // 域名来自创建时的DescribeRegions
    assert_eq!(send.total(), 1);
    let boot = &send.calls("DescribeRegions")[0];
    assert_eq!(boot.host, "ecs.aliyuncs.com");
    assert_eq!(boot.query["Version"], "2014-05-26");
    assert_eq!(boot.query["SignatureMethod"], "HMAC-SHA1");
    assert!(boot.query.contains_key("Signature"));
}

#[tokio::test]
async fn bootstrap_failure_fails_construction() {
    let send = ScriptedSend::new();
    send.route(
        "DescribeRegions",
        [Reply::Status(
            StatusCode::FORBIDDEN,
            r#"{"Code":"InvalidAccessKeyId.NotFound","Message":"Specified access key is not found."}"#,
        )],
    );
    let res = Client::builder()
        .config(config())
        .http_send(send.clone())
        .sleeper(Arc::new(NoSleep::default()))
        .build()
        .await;
    assert!(matches!(res, Err(Error::InvalidAccessKey(_))));
    assert_eq!(send.total(), 1);
}

#[tokio::test]
async fn finance_keeps_only_finance_regions() {
    let send = ScriptedSend::new();
    send.route(
        "DescribeRegions",
        [Reply::Status(
            StatusCode::OK,
            r#"{"Regions":{"Region":[
                {"RegionId":"cn-hangzhou"},
                {"RegionId":"cn-shanghai-finance-1","RegionEndpoint":"ecs.cn-shanghai-finance-1.aliyuncs.com"}
            ]}}"#,
        )],
    );
    let mut conf = config();
    conf.cloud_env = CloudEnv::Finance;
    let (client, _) = client_with(conf, send).await;
    let ids: Vec<String> = client.regions().iter().map(|r| r.id().to_owned()).collect();
    assert_eq!(ids, ["cn-shanghai-finance-1"]);
}

#[tokio::test]
async fn retry_then_success_with_fresh_nonce() {
    let send = ScriptedSend::new();
    send.route(
        "DescribeInstances",
        [
            Reply::Status(
                StatusCode::CONFLICT,
                r#"{"Code":"Operation.Conflict","Message":"conflict","RequestId":"r-2"}"#,
            ),
            Reply::Network("connection reset by peer"),
            Reply::Status(StatusCode::OK, r#"{"Instances":{"Instance":[]},"TotalCount":0}"#),
        ],
    );
    let (client, sleeper) = client_with(config(), send.clone()).await;

    let resp = client
        .request(Service::Ecs, "DescribeInstances", Params::new())
        .await
        .unwrap();
    assert_eq!(resp["TotalCount"], 0);

    let calls = send.calls("DescribeInstances");
    assert_eq!(calls.len(), 3);
    let mut nonces: Vec<&String> = calls.iter().map(|c| &c.query["SignatureNonce"]).collect();
    nonces.dedup();
    assert_eq!(nonces.len(), 3);
    assert_eq!(
        sleeper.0.lock().unwrap().as_slice(),
        &[Duration::from_secs(10), Duration::from_secs(20)]
    );
}

#[tokio::test]
async fn retryable_error_stops_after_three_attempts() {
    let send = ScriptedSend::new();
    send.route(
        "StopInstance",
        [Reply::Status(
            StatusCode::FORBIDDEN,
            r#"{"Code":"OperationDenied.ResourceControl","Message":"try later"}"#,
        )],
    );
    let (client, sleeper) = client_with(config(), send.clone()).await;

    let err = client
        .request(Service::Ecs, "StopInstance", Params::new())
        .await
        .unwrap_err();
    match err {
        Error::Throttled { code, attempts, .. } => {
            assert_eq!(code, "OperationDenied.ResourceControl");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(send.calls("StopInstance").len(), 3);
    assert_eq!(sleeper.0.lock().unwrap().len(), 2);
}

/// 在退避等待中取消请求，之后不会再返回
struct CancelOnSleep(CancellationToken);

#[async_trait]
impl MockableSleep for CancelOnSleep {
    async fn sleep(&self, _duration: Duration) {
        self.0.cancel();
        std::future::pending::<()>().await;
    }
}

#[tokio::test]
async fn cancel_during_backoff_stops_retries() {
    let send = ScriptedSend::new();
    send.route(
        "StopInstance",
        [Reply::Status(
            StatusCode::FORBIDDEN,
            r#"{"Code":"OperationDenied.ResourceControl","Message":"try later"}"#,
        )],
    );
    let token = CancellationToken::new();
    let client = Client::builder()
        .config(config())
        .http_send(send.clone())
        .sleeper(Arc::new(CancelOnSleep(token.clone())))
        .build()
        .await
        .unwrap();

    let err = client
        .rpc(Service::Ecs, "StopInstance")
        .cancel(&token)
        .build()
        .send()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(send.calls("StopInstance").len(), 1);
}

#[tokio::test]
async fn rpc_call_to_roa_service_is_rejected() {
    let send = ScriptedSend::new();
    let (client, _) = client_with(config(), send.clone()).await;
    let before = send.total();

    let err = client
        .request(Service::Cs, "DescribeClustersV1", Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(send.total(), before);
}

#[tokio::test]
async fn non_retryable_errors_are_classified() {
    let send = ScriptedSend::new();
    send.route(
        "RunInstances",
        [Reply::Status(
            StatusCode::FORBIDDEN,
            r#"{"Code":"OperationDenied.NoStock","Message":"sold out"}"#,
        )],
    );
    send.route(
        "ModifyInstanceAttribute",
        [Reply::Status(
            StatusCode::BAD_REQUEST,
            r#"{"Code":"InvalidParameter","Message":"bad","RequestId":"r-9"}"#,
        )],
    );
    send.route(
        "DescribeInstanceAttribute",
        [Reply::Status(
            StatusCode::NOT_FOUND,
            r#"{"Code":"InvalidInstanceId.NotFound","Message":"missing"}"#,
        )],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    let err = client
        .request(Service::Ecs, "RunInstances", Params::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StockOut { .. }));

    let err = client
        .request(Service::Ecs, "ModifyInstanceAttribute", Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("InvalidParameter"));
    assert_eq!(err.request_id(), Some("r-9"));

    let err = client
        .request(Service::Ecs, "DescribeInstanceAttribute", Params::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(send.calls("DescribeInstanceAttribute").len(), 1);
}

#[tokio::test]
async fn delete_on_missing_resource_succeeds() {
    let send = ScriptedSend::new();
    send.route(
        "DeleteVSwitch",
        [Reply::Status(
            StatusCode::NOT_FOUND,
            r#"{"Code":"InvalidVSwitchId.NotFound","Message":"The specified vswitch does not exist."}"#,
        )],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    let mut params = Params::new();
    params.insert("VSwitchId".to_owned(), "vsw-1".to_owned());
    let resp = client
        .request(Service::Vpc, "DeleteVSwitch", params)
        .await
        .unwrap();
    assert_eq!(resp, json!({}));
    let calls = send.calls("DeleteVSwitch");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::DELETE);
}

#[tokio::test]
async fn read_only_account_never_dispatches_writes() {
    let send = ScriptedSend::new();
    let mut conf = config();
    conf.read_only = true;
    let (client, _) = client_with(conf, send.clone()).await;
    let before = send.total();

    let err = client
        .request(Service::Ecs, "DeleteInstance", Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountReadOnly);
    let err = client
        .roa(Service::Cs, "CreateCluster")
        .path_pattern("/clusters")
        .build()
        .send()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountReadOnly);
    assert_eq!(send.total(), before);

    // 只读接口不受影响
    client
        .request(Service::Ecs, "DescribeInstances", Params::new())
        .await
        .unwrap();
    assert_eq!(send.total(), before + 1);
}

#[tokio::test]
async fn endpoints_are_bootstrapped_once_per_service() {
    let send = ScriptedSend::new();
    send.route(
        "vpc.aliyuncs.com DescribeRegions",
        [Reply::Status(
            StatusCode::OK,
            r#"{"Regions":{"Region":[{"RegionId":"cn-hangzhou","RegionEndpoint":"vpc.cn-hangzhou.aliyuncs.com"}]}}"#,
        )],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    for _ in 0..2 {
        assert_eq!(
            client.resolve_endpoint(Service::Vpc, "cn-hangzhou").await.unwrap(),
            "vpc.cn-hangzhou.aliyuncs.com"
        );
    }
    // 缓存里没有的地域使用默认域名
    assert_eq!(
        client.resolve_endpoint(Service::Vpc, "cn-nowhere").await.unwrap(),
        "vpc.aliyuncs.com"
    );
    let vpc_boot = send
        .calls("DescribeRegions")
        .into_iter()
        .filter(|c| c.host == "vpc.aliyuncs.com")
        .count();
    assert_eq!(vpc_boot, 1);

    // 地域请求发到解析出来的域名，并带上RegionId
    client
        .region("cn-hangzhou")
        .unwrap()
        .request(Service::Vpc, "DescribeVpcs", Params::new())
        .await
        .unwrap();
    let call = &send.calls("DescribeVpcs")[0];
    assert_eq!(call.host, "vpc.cn-hangzhou.aliyuncs.com");
    assert_eq!(call.query["RegionId"], "cn-hangzhou");
}

#[tokio::test]
async fn request_all_pages_with_service_default_size() {
    let send = ScriptedSend::new();
    send.route(
        "DescribeVpcs",
        [
            Reply::Status(
                StatusCode::OK,
                r#"{"TotalCount":3,"Vpcs":{"Vpc":[{"VpcId":"vpc-1"},{"VpcId":"vpc-2"}]}}"#,
            ),
            Reply::Status(
                StatusCode::OK,
                r#"{"TotalCount":3,"Vpcs":{"Vpc":{"VpcId":"vpc-3"}}}"#,
            ),
        ],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    let mut params = Params::new();
    params.insert("PageSize".to_owned(), "500".to_owned());
    let vpcs = client
        .region("cn-hangzhou")
        .unwrap()
        .request_all(Service::Vpc, "DescribeVpcs", params, "Vpcs.Vpc")
        .await
        .unwrap();
    let ids: Vec<_> = vpcs.iter().map(|v| v["VpcId"].as_str().unwrap()).collect();
    assert_eq!(ids, ["vpc-1", "vpc-2", "vpc-3"]);

    let calls = send.calls("DescribeVpcs");
    assert_eq!(calls.len(), 2);
    // 超出范围的PageSize换成VPC的默认值
    assert!(calls.iter().all(|c| c.query["PageSize"] == "50"));
    assert_eq!(calls[0].query["PageNumber"], "1");
    assert_eq!(calls[1].query["PageNumber"], "2");
    assert_eq!(calls[1].query["RegionId"], "cn-hangzhou");
}

#[tokio::test]
async fn request_all_reads_total_record_count() {
    let send = ScriptedSend::new();
    send.route(
        "DescribeDBInstances",
        [Reply::Status(
            StatusCode::OK,
            r#"{"TotalRecordCount":2,"Items":{"DBInstance":[{"DBInstanceId":"rm-1"},{"DBInstanceId":"rm-2"}]}}"#,
        )],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    let dbs = client
        .region("cn-hangzhou")
        .unwrap()
        .request_all(Service::Rds, "DescribeDBInstances", Params::new(), "Items.DBInstance")
        .await
        .unwrap();
    assert_eq!(dbs.len(), 2);
    assert_eq!(send.calls("DescribeDBInstances").len(), 1);
}

#[tokio::test]
async fn request_all_without_total_stops_on_short_page() {
    let send = ScriptedSend::new();
    send.route(
        "DescribeLoadBalancers",
        [Reply::Status(
            StatusCode::OK,
            r#"{"LoadBalancers":{"LoadBalancer":[{"LoadBalancerId":"lb-1"},{"LoadBalancerId":"lb-2"}]}}"#,
        )],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    let lbs = client
        .region("cn-hangzhou")
        .unwrap()
        .request_all(
            Service::Slb,
            "DescribeLoadBalancers",
            Params::new(),
            "LoadBalancers.LoadBalancer",
        )
        .await
        .unwrap();
    assert_eq!(lbs.len(), 2);
    assert_eq!(send.calls("DescribeLoadBalancers").len(), 1);
}

#[tokio::test]
async fn endpoint_bootstrap_failure_falls_back_to_default() {
    let send = ScriptedSend::new();
    send.route(
        "slb.aliyuncs.com DescribeRegions",
        [Reply::Status(
            StatusCode::BAD_REQUEST,
            r#"{"Code":"InvalidParameter","Message":"bad"}"#,
        )],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    assert_eq!(
        client.resolve_endpoint(Service::Slb, "cn-hangzhou").await.unwrap(),
        "slb.aliyuncs.com"
    );
    assert_eq!(
        client.resolve_endpoint(Service::Alb, "cn-hangzhou").await.unwrap(),
        "alb.cn-hangzhou.aliyuncs.com"
    );
    assert_eq!(
        client.resolve_endpoint(Service::Ram, "cn-hangzhou").await.unwrap(),
        "ram.aliyuncs.com"
    );
}

#[tokio::test]
async fn permission_hook_is_notified() {
    let send = ScriptedSend::new();
    send.route(
        "DescribeInstances",
        [Reply::Status(
            StatusCode::FORBIDDEN,
            r#"{"Code":"Forbidden.RAM","Message":"User not authorized to operate on the specified resource."}"#,
        )],
    );
    send.route(
        "QueryAccountBalance",
        [Reply::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"Code":"InternalError","Message":"internal"}"#,
        )],
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_hook = seen.clone();
    let conf = ClientConfig::builder()
        .access_key("AK1")
        .access_secret("SK1")
        .permission_hook(Arc::new(move |service: &str, action: &str| {
            seen_hook
                .lock()
                .unwrap()
                .push(format!("{service}:{action}"));
        }))
        .build();
    let (client, _) = client_with(conf, send).await;

    let err = client
        .request(Service::Ecs, "DescribeInstances", Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("Forbidden.RAM"));
    let err = client
        .request(Service::Bss, "QueryAccountBalance", Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoPermission);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["ecs:DescribeInstances", "business:QueryAccountBalance"]
    );
}

#[tokio::test]
async fn resource_groups_lookup_and_sub_accounts() {
    let send = ScriptedSend::new();
    send.route(
        "ListResourceGroups",
        [Reply::Status(StatusCode::OK, RESOURCE_GROUPS)],
    );
    let mut conf = config();
    conf.resource_group_ids = vec!["rg-missing".to_owned(), "rg-2".to_owned()];
    let (client, _) = client_with(conf, send.clone()).await;

    assert_eq!(client.resource_group("rg-1").await.unwrap().name, "ops");
    assert_eq!(client.resource_group("web").await.unwrap().id, "rg-2");
    assert_eq!(
        client.resource_group("shared").await.unwrap_err().kind(),
        ErrorKind::Duplicate
    );
    assert_eq!(
        client.resource_group("nothing").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let accounts = client.sub_accounts().await.unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].account, "AK1");
    assert_eq!(accounts[1].name, "prod/shared");
    assert_eq!(accounts[1].account, "AK1/rg-2");
    assert_eq!(accounts[1].resource_group_id.as_deref(), Some("rg-2"));

    // 第一个存在的资源组被注入
    client
        .region("cn-hangzhou")
        .unwrap()
        .request_in_resource_group(Service::Ecs, "DescribeInstances", Params::new())
        .await
        .unwrap();
    let call = &send.calls("DescribeInstances")[0];
    assert_eq!(call.query["ResourceGroupId"], "rg-2");
    assert_eq!(call.host, "ecs.cn-hangzhou.aliyuncs.com");

    // 资源组列表只获取一次
    assert_eq!(send.calls("ListResourceGroups").len(), 1);
}

#[tokio::test]
async fn sub_accounts_without_permission_returns_primary() {
    let send = ScriptedSend::new();
    send.route(
        "ListResourceGroups",
        [Reply::Status(
            StatusCode::FORBIDDEN,
            r#"{"Code":"NoPermission","Message":"denied"}"#,
        )],
    );
    let (client, _) = client_with(config(), send).await;

    assert_eq!(
        client.resource_groups().await.unwrap_err().kind(),
        ErrorKind::NoPermission
    );
    let accounts = client.sub_accounts().await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "prod");
}

#[tokio::test]
async fn tag_replace_removes_stale_tags() {
    let send = ScriptedSend::new();
    send.route(
        "ListTagResources",
        [Reply::Status(
            StatusCode::OK,
            r#"{"TagResources":{"TagResource":[
                {"ResourceId":"i-1","TagKey":"env","TagValue":"prod"},
                {"ResourceId":"i-1","TagKey":"old","TagValue":"1"},
                {"ResourceId":"i-1","TagKey":"acs:rm:rgId","TagValue":"rg-1"}
            ]}}"#,
        )],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    let mut tags = HashMap::new();
    tags.insert("env".to_owned(), "dev".to_owned());
    tags.insert("aliyun-managed".to_owned(), "x".to_owned());
    client
        .tag_resource("cn-hangzhou", Service::Ecs, "instance", "i-1", &tags, true)
        .await
        .unwrap();

    let untag = &send.calls("UntagResources")[0];
    assert_eq!(untag.query["TagKey.1"], "old");
    assert!(!untag.query.contains_key("TagKey.2"));
    let tag = &send.calls("TagResources")[0];
    assert_eq!(tag.query["Tag.1.Key"], "env");
    assert_eq!(tag.query["Tag.1.Value"], "dev");
    assert!(!tag.query.contains_key("Tag.2.Key"));
    assert_eq!(tag.query["ResourceId.1"], "i-1");
    assert_eq!(tag.query["RegionId"], "cn-hangzhou");

    let listed = client
        .list_tags("cn-hangzhou", Service::Ecs, "instance", "i-1")
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert!(!listed.contains_key("acs:rm:rgId"));
}

#[tokio::test]
async fn tag_service_uses_resource_arn() {
    let send = ScriptedSend::new();
    send.route(
        "GetCallerIdentity",
        [Reply::Status(StatusCode::OK, r#"{"AccountId":"1234567890"}"#)],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    let mut tags = HashMap::new();
    tags.insert("team".to_owned(), "infra".to_owned());
    client
        .tag_resource("cn-hangzhou", Service::Nas, "filesystem", "fs-1", &tags, false)
        .await
        .unwrap();
    let call = &send.calls("TagResources")[0];
    assert_eq!(
        call.query["ResourceARN.1"],
        "acs:nas:cn-hangzhou:1234567890:filesystem/fs-1"
    );
    assert_eq!(call.query["Tags"], r#"{"team":"infra"}"#);
}

#[tokio::test]
async fn roa_request_is_signed_with_headers() {
    let send = ScriptedSend::new();
    send.route(
        "DescribeClustersV1",
        [Reply::Status(StatusCode::OK, r#"{"clusters":[]}"#)],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    let resp = client
        .roa(Service::Cs, "DescribeClustersV1")
        .path_pattern("/api/v1/clusters")
        .build()
        .send()
        .await
        .unwrap();
    assert_eq!(resp, json!({"clusters": []}));
    let call = &send.calls("DescribeClustersV1")[0];
    assert_eq!(call.method, Method::GET);
    assert_eq!(call.host, "cs.aliyuncs.com");
    assert_eq!(call.headers["x-acs-version"], "2015-12-15");
    let auth = call.headers["authorization"].to_str().unwrap();
    assert!(auth.starts_with("ACS3-HMAC-SHA256 Credential=AK1"));
}

#[tokio::test]
async fn oss_requests_share_the_engine() {
    let send = ScriptedSend::new();
    send.route(
        "HEAD bucket-1.oss-cn-hangzhou.aliyuncs.com/missing.txt",
        [Reply::Status(StatusCode::NOT_FOUND, "")],
    );
    send.route(
        "DELETE bucket-1.oss-cn-hangzhou.aliyuncs.com/missing.txt",
        [Reply::Status(
            StatusCode::NOT_FOUND,
            r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><RequestId>req-1</RequestId></Error>"#,
        )],
    );
    let (client, _) = client_with(config(), send.clone()).await;
    let oss = client.oss_client("cn-hangzhou");

    let err = oss.head_object("bucket-1", "missing.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    oss.delete_object("bucket-1", "missing.txt").await.unwrap();

    let head = &send.calls("HEAD bucket-1.oss-cn-hangzhou.aliyuncs.com/missing.txt")[0];
    let auth = head.headers["authorization"].to_str().unwrap();
    assert!(auth.starts_with("OSS4-HMAC-SHA256 Credential=AK1/"));
    assert!(auth.contains("/cn-hangzhou/oss/aliyun_v4_request"));
    assert_eq!(head.headers["x-oss-content-sha256"], "UNSIGNED-PAYLOAD");

    let err = oss.head_object("bucket-1", "/bad").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

const FINANCE_REGIONS: &str = r#"{"Regions":{"Region":[
    {"RegionId":"cn-shanghai-finance-1","RegionEndpoint":"ecs.cn-shanghai-finance-1.aliyuncs.com"}
]}}"#;

const NO_SUCH_BUCKET: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchBucket</Code><Message>The specified bucket does not exist.</Message><RequestId>req-2</RequestId></Error>"#;

async fn finance_client(send: Arc<ScriptedSend>) -> Client {
    send.route("DescribeRegions", [Reply::Status(StatusCode::OK, FINANCE_REGIONS)]);
    let mut conf = config();
    conf.cloud_env = CloudEnv::Finance;
    client_with(conf, send).await.0
}

#[tokio::test]
async fn finance_bucket_uses_extranet_endpoint() {
    let send = ScriptedSend::new();
    send.route(
        "GET fin-data.oss-cn-shanghai-finance-1.aliyuncs.com/",
        [Reply::Status(
            StatusCode::OK,
            r#"<?xml version="1.0" encoding="UTF-8"?><BucketInfo><Bucket><Name>fin-data</Name><ExtranetEndpoint>oss-cn-shanghai-finance-1-pub.aliyuncs.com</ExtranetEndpoint><Location>oss-cn-shanghai-finance-1</Location></Bucket></BucketInfo>"#,
        )],
    );
    send.route(
        "GET fin-data.oss-cn-shanghai-finance-1-pub.aliyuncs.com/",
        [Reply::Status(
            StatusCode::OK,
            r#"<?xml version="1.0" encoding="UTF-8"?><BucketStat><Storage>10</Storage><ObjectCount>2</ObjectCount></BucketStat>"#,
        )],
    );
    let client = finance_client(send.clone()).await;
    let oss = client.oss_client("cn-shanghai-finance-1");

    for _ in 0..2 {
        let stat = oss.get_bucket_stat("fin-data").await.unwrap();
        assert_eq!(stat.object_count, 2);
    }
    // GetBucketInfo只查询一次
    assert_eq!(
        send.calls("GET fin-data.oss-cn-shanghai-finance-1.aliyuncs.com/").len(),
        1
    );
    assert_eq!(
        send.calls("GET fin-data.oss-cn-shanghai-finance-1-pub.aliyuncs.com/").len(),
        2
    );
}

#[tokio::test]
async fn finance_missing_bucket_can_be_deleted_and_created() {
    let send = ScriptedSend::new();
    send.route(
        "GET fin-new.oss-cn-shanghai-finance-1.aliyuncs.com/",
        [Reply::Status(StatusCode::NOT_FOUND, NO_SUCH_BUCKET)],
    );
    send.route(
        "DELETE fin-new.oss-cn-shanghai-finance-1.aliyuncs.com/",
        [Reply::Status(StatusCode::NOT_FOUND, NO_SUCH_BUCKET)],
    );
    let client = finance_client(send.clone()).await;
    let oss = client.oss_client("cn-shanghai-finance-1");

    // 不存在的bucket删除成功，域名不缓存
    oss.delete_bucket("fin-new").await.unwrap();
    oss.delete_bucket("fin-new").await.unwrap();
    assert_eq!(
        send.calls("DELETE fin-new.oss-cn-shanghai-finance-1.aliyuncs.com/").len(),
        2
    );
    assert_eq!(
        send.calls("GET fin-new.oss-cn-shanghai-finance-1.aliyuncs.com/").len(),
        2
    );

    // 创建时不查询GetBucketInfo
    oss.put_bucket().bucket("fin-new").build().send().await.unwrap();
    assert_eq!(
        send.calls("PUT fin-new.oss-cn-shanghai-finance-1.aliyuncs.com/").len(),
        1
    );
    assert_eq!(
        send.calls("GET fin-new.oss-cn-shanghai-finance-1.aliyuncs.com/").len(),
        2
    );
}

#[tokio::test]
async fn list_buckets_follows_next_marker() {
    let send = ScriptedSend::new();
    send.route(
        "GET oss-cn-hangzhou.aliyuncs.com/",
        [
            Reply::Status(
                StatusCode::OK,
                r#"<?xml version="1.0" encoding="UTF-8"?><ListAllMyBucketsResult><IsTruncated>true</IsTruncated><NextMarker>bucket-a</NextMarker><Buckets><Bucket><Name>bucket-a</Name></Bucket></Buckets></ListAllMyBucketsResult>"#,
            ),
            Reply::Status(
                StatusCode::OK,
                r#"<?xml version="1.0" encoding="UTF-8"?><ListAllMyBucketsResult><IsTruncated>false</IsTruncated><Buckets><Bucket><Name>bucket-b</Name></Bucket></Buckets></ListAllMyBucketsResult>"#,
            ),
        ],
    );
    let (client, _) = client_with(config(), send.clone()).await;

    let buckets = client
        .oss_client("cn-hangzhou")
        .list_buckets()
        .build()
        .send_all()
        .await
        .unwrap();
    let names: Vec<_> = buckets.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["bucket-a", "bucket-b"]);

    let calls = send.calls("GET oss-cn-hangzhou.aliyuncs.com/");
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].query.contains_key("marker"));
    assert_eq!(calls[1].query["marker"], "bucket-a");
}

#[tokio::test]
async fn oss_read_only_rejects_uploads() {
    let send = ScriptedSend::new();
    let mut conf = config();
    conf.read_only = true;
    let (client, _) = client_with(conf, send.clone()).await;
    let before = send.total();

    let err = client
        .oss_client("cn-hangzhou")
        .put_object()
        .bucket("bucket-1")
        .build()
        .send("a.txt", PutObjectBody::Bytes("hello".into()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountReadOnly);
    assert_eq!(send.total(), before);
}

#[tokio::test]
async fn presigned_url_carries_v4_query() {
    let send = ScriptedSend::new();
    let (client, _) = client_with(config(), send).await;
    let oss = client.oss_client("cn-hangzhou");

    let url = oss
        .presign_get_object("bucket-1", "dir/a.txt", 3600)
        .await
        .unwrap();
    assert!(url.starts_with("https://bucket-1.oss-cn-hangzhou.aliyuncs.com/dir/a.txt?"));
    assert!(url.contains("x-oss-signature-version=OSS4-HMAC-SHA256"));
    assert!(url.contains("x-oss-expires=3600"));
    assert!(url.contains("x-oss-signature="));

    let err = oss
        .presign_get_object("bucket-1", "a.txt", 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}
