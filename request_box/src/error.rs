//! Typed failures reported by the token registry and capture service.

use thiserror::Error;

/// Errors returned by inbox resolution and token lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The token argument was the empty string.
    #[error("token is empty")]
    EmptyToken,

    /// The token is well-formed but has no live inbox.
    #[error("token '{token}' not found")]
    TokenNotFound {
        /// The token that was looked up
        token: String,
    },

    /// No fresh identifier could be obtained for a new token.
    #[error("token source exhausted")]
    IdentitySourceExhausted,
}

impl CaptureError {
    pub fn not_found(token: impl Into<String>) -> Self {
        Self::TokenNotFound {
            token: token.into(),
        }
    }
}

/// Result alias for core operations.
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(CaptureError::EmptyToken.to_string(), "token is empty");
        assert_eq!(
            CaptureError::not_found("abc").to_string(),
            "token 'abc' not found"
        );
        assert_eq!(
            CaptureError::IdentitySourceExhausted.to_string(),
            "token source exhausted"
        );
    }
}
