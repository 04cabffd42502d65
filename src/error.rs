use crate::xray::Protocol;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("protocol {0} is not supported")]
    UnsupportedProtocol(String),
    #[error("transport {network} is not supported for {protocol}")]
    UnsupportedTransport { protocol: String, network: String },
    #[error("inbound has TLS enabled but no domain name is configured")]
    TlsRequiresDomain,
    #[error("trojan needs a domain name for SNI")]
    DomainRequiredForTrojan,
    #[error("client #{position} has no email label")]
    MissingLabel { position: usize },
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("inbound index {index} out of range ({len} inbounds)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no user matches the given secret")]
    UnknownUser,
    #[error("user {0} already exists in this inbound")]
    AlreadyExists(String),
    #[error("invalid user label {0:?}")]
    InvalidLabel(String),
    #[error("password length {length} is below the minimum of {min}")]
    InvalidPasswordLength { length: usize, min: usize },
    #[error("inbound port {0} is not a single port in 1-65535")]
    InvalidPort(String),
    #[error("neither a server ip nor a domain name is configured")]
    NoServerAddress,
    #[error("server ip {0:?} is not an ip address")]
    InvalidServerIp(String),
    #[error("share links are not supported for {0}")]
    UnsupportedLinkProtocol(Protocol),
    #[error("invalid clash template: {0}")]
    InvalidTemplate(String),
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl ConvertError {
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::File {
            path: path.into(),
            source,
        }
    }
}
