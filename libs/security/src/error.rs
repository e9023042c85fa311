use thiserror::Error;

/// Authentication failures; all of them map to HTTP 401 at the adapter.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing or not a bearer token")]
    Missing,
    #[error("token issuer is not trusted: {0}")]
    UntrustedIssuer(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl AuthError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        AuthError::InvalidToken(message.into())
    }
}
