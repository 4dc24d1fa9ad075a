//! 阿里云签名以及响应解析相关的公共工具，供`aliyun-core`使用

mod error;
pub mod helper;
pub mod open_api_sign;
pub mod rpc_sign;

pub use error::Error;
