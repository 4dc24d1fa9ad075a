//! 需要真实AccessKey的测试，配置写在`tests/live/config.toml`中

use aliyun_core::oss::object::PutObjectBody;
use aliyun_core::{Client, ClientConfig, Params, Service};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct LiveConfig {
    pub region_id: String,
    pub bucket: String,
}

// 同一个文件中既有`ClientConfig`的字段，也有测试用的字段
async fn get_client() -> (Client, LiveConfig) {
    let file_str = std::fs::read_to_string("tests/live/config.toml").unwrap();
    let client_conf: ClientConfig = toml::from_str(&file_str).unwrap();
    let conf: LiveConfig = toml::from_str(&file_str).unwrap();
    let client = Client::builder().config(client_conf).build().await.unwrap();
    (client, conf)
}

#[tokio::test]
#[ignore]
async fn regions_and_account() {
    let (client, _) = get_client().await;
    for region in client.regions() {
        println!("{} {}", region.id(), region.local_name());
    }
    match client.account_id().await {
        Ok(id) => println!("account id: {id}"),
        Err(e) => println!("{e}"),
    }
}

#[tokio::test]
#[ignore]
async fn describe_vpcs() {
    let (client, conf) = get_client().await;
    let region = client.region(&conf.region_id).unwrap();
    println!("vpc endpoint: {:?}", region.endpoint(Service::Vpc).await);
    let res = region.request(Service::Vpc, "DescribeVpcs", Params::new()).await;
    match res {
        Ok(v) => println!("res:\n{v:#}"),
        Err(e) => println!("{e}"),
    }
}

#[tokio::test]
#[ignore]
async fn sub_accounts() {
    let (client, _) = get_client().await;
    match client.sub_accounts().await {
        Ok(accounts) => println!("{accounts:#?}"),
        Err(e) => println!("{e}"),
    }
}

#[tokio::test]
#[ignore]
async fn oss_put_get_delete() {
    let (client, conf) = get_client().await;
    let oss = client.oss_client(&conf.region_id);

    let res = oss
        .put_object()
        .bucket(&conf.bucket)
        .content_type("text/plain")
        .build()
        .send("aliyun-core-test/hello.txt", PutObjectBody::Bytes("hello".into()))
        .await;
    println!("put: {res:?}");

    let res = oss
        .get_object()
        .bucket(&conf.bucket)
        .build()
        .receive_bytes("aliyun-core-test/hello.txt")
        .await;
    match res {
        Ok((data, meta)) => println!("{:?}\n{meta:#?}", String::from_utf8_lossy(&data)),
        Err(e) => println!("{e}"),
    }

    let url = oss
        .presign_get_object(&conf.bucket, "aliyun-core-test/hello.txt", 600)
        .await;
    println!("presign: {url:?}");

    let res = oss
        .delete_object(&conf.bucket, "aliyun-core-test/hello.txt")
        .await;
    println!("delete: {res:?}");
}

#[tokio::test]
#[ignore]
async fn oss_list_buckets() {
    let (client, conf) = get_client().await;
    let oss = client.oss_client(&conf.region_id);
    match oss.list_buckets().build().send_all().await {
        Ok(buckets) => println!("{buckets:#?}"),
        Err(e) => println!("{e}"),
    }
    let oss_region = format!("oss-{}", conf.region_id);
    match oss.describe_regions().region(&oss_region).build().send().await {
        Ok(regions) => println!("{regions:#?}"),
        Err(e) => println!("{e}"),
    }
}
