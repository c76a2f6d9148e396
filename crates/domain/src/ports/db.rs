use thiserror::Error;

use super::BoxFuture;

#[derive(Debug, Error)]
pub enum BackendHealthError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend misconfigured: {0}")]
    Misconfigured(String),
}

/// The data backend the comment ports talk to, as seen by `/health`.
pub trait BackendAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn health_check(&self) -> BoxFuture<'_, Result<(), BackendHealthError>>;
}
