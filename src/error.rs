use std::time::Duration;

use thiserror::Error;

// ============================================================================
// ProviderError: failures reported by the identity backend
// ============================================================================

/// Classification of provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The backend rejected the supplied credentials.
    InvalidCredentials,
    /// Network or backend unavailable.
    Transport,
    /// The backend refused the request for any other reason.
    Rejected,
}

/// Error value returned by an `AuthProvider`.
///
/// Carries the backend's message (suitable for inline display) and an
/// optional machine-readable code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub code: Option<String>,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            kind: ProviderErrorKind::Transport,
        }
    }

    pub fn with_kind(message: impl Into<String>, kind: ProviderErrorKind) -> Self {
        Self {
            message: message.into(),
            code: None,
            kind,
        }
    }

    pub fn invalid_credentials() -> Self {
        Self::with_kind("Invalid credentials", ProviderErrorKind::InvalidCredentials)
            .with_code("invalid_credentials")
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

// ============================================================================
// AuthError: crate-level error
// ============================================================================

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("auth session accessed outside a mounted AuthSession; call AuthContext::provide first")]
    NotMounted,

    #[error("auth session has been unmounted")]
    Unmounted,

    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),
}

impl AuthError {
    /// The provider error behind this failure, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(e) => Some(e),
            _ => None,
        }
    }

    /// True when the backend rejected the credentials.
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(
            self,
            Self::Provider(ProviderError {
                kind: ProviderErrorKind::InvalidCredentials,
                ..
            })
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
