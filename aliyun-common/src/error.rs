#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("error: {0}")]
    Common(String),
    #[error("access key secret is empty")]
    EmptySecret,
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("time format error: {0}")]
    TimeFormat(#[from] time::error::Format),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::DeError),
}
