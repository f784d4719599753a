use std::time::Duration;

use reqwest::StatusCode;

/// Why a live vendor call could not be used.
///
/// Never leaves the client layer: every variant is absorbed into a fallback
/// payload and logged with [`CapabilityError::class`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum CapabilityError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("credentials rejected (HTTP {0})")]
    Auth(u16),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("service not configured")]
    NotConfigured,
    #[error("artifact storage failed: {0}")]
    Storage(String),
}

impl CapabilityError {
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            CapabilityError::Timeout(timeout)
        } else if err.is_decode() {
            CapabilityError::MalformedResponse(err.to_string())
        } else {
            CapabilityError::Transport(err.to_string())
        }
    }

    pub fn from_status(status: StatusCode, resource: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                CapabilityError::Auth(status.as_u16())
            }
            StatusCode::NOT_FOUND => CapabilityError::ResourceNotFound(resource.to_string()),
            other => CapabilityError::Status(other.as_u16()),
        }
    }

    /// Classified cause used in logs and fallback reasons.
    pub fn class(&self) -> &'static str {
        match self {
            CapabilityError::Transport(_) | CapabilityError::Timeout(_) => "TransportFailure",
            CapabilityError::Auth(_) => "AuthFailure",
            CapabilityError::Status(_) => "UpstreamFailure",
            CapabilityError::MalformedResponse(_) => "MalformedResponse",
            CapabilityError::ResourceNotFound(_) => "ResourceNotFound",
            CapabilityError::NotConfigured => "NotConfigured",
            CapabilityError::Storage(_) => "StorageFailure",
        }
    }

    /// Whether this failure switches the client into fallback mode.
    ///
    /// Unreachable, rejecting or erroring backends latch. A backend that
    /// answered with an unusable body or a missing resource is reachable, so
    /// that call falls back once and the next call tries live again. Local
    /// storage failures say nothing about the backend.
    pub fn latches(&self) -> bool {
        matches!(
            self,
            CapabilityError::Transport(_)
                | CapabilityError::Timeout(_)
                | CapabilityError::Auth(_)
                | CapabilityError::Status(_)
                | CapabilityError::NotConfigured
        )
    }
}
