use serde::Deserialize;
use thiserror::Error;

use crate::secrets::StoreError;
use crate::session::LogoutReason;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMessage {
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
}

/// Wire shape of a structured backend rejection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error_code: String,
    #[serde(default)]
    pub messages: Vec<FieldMessage>,
}

/// Domain code the credential endpoints use to reject a refresh token.
pub const CODE_INVALID_CREDENTIALS: &str = "user.token.invalid";

/// Failure taxonomy every layer above the raw transport speaks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Unreachable backend. Always retryable; never a logout.
    #[error("no connection")]
    NoConnection,

    /// The server rejected the bearer token on a business call.
    #[error("unauthorized (http {status})")]
    Unauthorized { status: u16 },

    /// No usable refresh token; any live session has been torn down.
    #[error("invalid refresh token ({reason:?})")]
    InvalidRefreshToken { reason: LogoutReason },

    #[error("backend rejected the request ({code})")]
    Domain {
        code: String,
        messages: Vec<FieldMessage>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Anything else. Surfaced as a generic technical error, no retry.
    #[error("unexpected failure")]
    Unclassified {
        status: Option<u16>,
        detail: Option<String>,
    },
}

impl ApiError {
    pub(crate) fn unclassified(detail: impl Into<String>) -> Self {
        Self::Unclassified {
            status: None,
            detail: Some(detail.into()),
        }
    }

    /// Retry affordances are offered for connectivity failures only.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoConnection)
    }

    /// True when a credential endpoint rejected the refresh token, either by
    /// HTTP status or by the structured invalid-credentials code.
    pub(crate) fn is_credential_rejection(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Domain { code, .. } => code == CODE_INVALID_CREDENTIALS,
            _ => false,
        }
    }
}

pub(crate) fn is_auth_status(status: u16) -> bool {
    matches!(status, 401 | 403)
}
