use crate::credentials::CredentialsError;

/// 统一的错误分类，对应各个资源适配层需要区分处理的情况
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("duplicate resource: {0}")]
    Duplicate(String),
    #[error("invalid access key: {0}")]
    InvalidAccessKey(String),
    #[error("no permission: {0}")]
    NoPermission(String),
    #[error("account is read only, refuse to call {0}")]
    AccountReadOnly(String),
    /// 重试次数用完后依然返回需要重试的错误码
    #[error("throttled after {attempts} attempts: [{code}] {message}")]
    Throttled {
        code: String,
        message: String,
        attempts: u32,
    },
    /// 重试次数用完后依然是网络层面的错误
    #[error("transient transport error after {attempts} attempts: {message}")]
    Transient { message: String, attempts: u32 },
    #[error(
        "[{code}] {message}: the requested resource is sold out in this region, try another zone or instance type"
    )]
    StockOut { code: String, message: String },
    #[error("api error (RequestId: {}): [{code}] {message}", .request_id.as_deref().unwrap_or("-"))]
    Fatal {
        code: String,
        message: String,
        request_id: Option<String>,
    },
    #[error("request cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("config error: {0}")]
    Config(String),
    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error: {0}")]
    Common(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Duplicate,
    InvalidAccessKey,
    NoPermission,
    AccountReadOnly,
    Throttled,
    Transient,
    StockOut,
    Fatal,
    Cancelled,
    DeadlineExceeded,
    Config,
    Unexpected,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Duplicate(_) => ErrorKind::Duplicate,
            Error::InvalidAccessKey(_) => ErrorKind::InvalidAccessKey,
            Error::NoPermission(_) => ErrorKind::NoPermission,
            Error::AccountReadOnly(_) => ErrorKind::AccountReadOnly,
            Error::Throttled { .. } => ErrorKind::Throttled,
            Error::Transient { .. } | Error::Transport(_) => ErrorKind::Transient,
            Error::StockOut { .. } => ErrorKind::StockOut,
            Error::Fatal { .. } => ErrorKind::Fatal,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Error::Config(_) => ErrorKind::Config,
            Error::Credentials(_)
            | Error::Json(_)
            | Error::Xml(_)
            | Error::Io(_)
            | Error::Common(_) => ErrorKind::Unexpected,
        }
    }

    /// 阿里云返回的错误码
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Throttled { code, .. }
            | Error::StockOut { code, .. }
            | Error::Fatal { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Fatal { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<aliyun_common::Error> for Error {
    fn from(e: aliyun_common::Error) -> Self {
        match e {
            aliyun_common::Error::Json(e) => Error::Json(e),
            aliyun_common::Error::Xml(e) => Error::Xml(e),
            aliyun_common::Error::EmptySecret => Error::Fatal {
                code: "EmptyAccessKeySecret".to_owned(),
                message: "access key secret is empty, refuse to sign request".to_owned(),
                request_id: None,
            },
            other => Error::Common(other.to_string()),
        }
    }
}

/// 网络层面的错误，保留完整的错误链文本用于判断是否需要重试
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub is_timeout: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_timeout: false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(s) = source {
            message.push_str(": ");
            message.push_str(&s.to_string());
            source = s.source();
        }
        Self {
            message,
            is_timeout: e.is_timeout(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
