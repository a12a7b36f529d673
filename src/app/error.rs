use thiserror::Error;

/// Failure taxonomy shared by every service.
///
/// `NotFound` covers both a missing row and a row the actor may not
/// see; read paths never distinguish the two. Mutating paths do
/// return `Forbidden` separately. Store failures are surfaced as
/// retryable; the publisher swallows them instead (see
/// `jobs::publisher`).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("not authorized")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("storage unavailable")]
    Store(#[from] sqlx::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}
