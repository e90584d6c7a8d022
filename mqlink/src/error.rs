use config::ConfigError;
use thiserror::Error;
use tokio::time::error::Elapsed;

/// Typed errors surfaced by the facade.
///
/// Most failure modes are absorbed where they occur (connect retries,
/// fire-and-forget broker calls); what remains is configuration loading
/// and the bounded teardown drain.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("drain timeout")]
    DrainTimeout(Elapsed),
    #[error("{0}")]
    Msg(String),
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    ConfigError(ConfigError),
}

impl From<String> for ClientError {
    #[inline]
    fn from(e: String) -> Self {
        ClientError::Msg(e)
    }
}

impl From<&str> for ClientError {
    #[inline]
    fn from(e: &str) -> Self {
        ClientError::Msg(e.to_string())
    }
}

impl From<anyhow::Error> for ClientError {
    #[inline]
    fn from(e: anyhow::Error) -> Self {
        ClientError::Anyhow(e)
    }
}

impl From<Elapsed> for ClientError {
    #[inline]
    fn from(e: Elapsed) -> Self {
        ClientError::DrainTimeout(e)
    }
}

impl From<ConfigError> for ClientError {
    #[inline]
    fn from(e: ConfigError) -> Self {
        ClientError::ConfigError(e)
    }
}
