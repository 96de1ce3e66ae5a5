use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailoverError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("no available resource: {0}")]
    NoAvailableResource(String),
}

impl FailoverError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FailoverError>;
