use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Where a capability result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Produced by the vendor backend.
    Live,
    /// Synthesized locally because the backend was unusable.
    Fallback,
}

/// Provenance block attached to every capability response body.
///
/// A fallback is still a usable answer: callers render it, then use
/// `is_fallback` to tell the user that a feature is degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProvenanceMeta {
    pub provenance: Provenance,
    pub is_fallback: bool,
    /// Why the fallback path was taken (absent for live results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl ProvenanceMeta {
    pub fn live() -> Self {
        Self {
            provenance: Provenance::Live,
            is_fallback: false,
            fallback_reason: None,
        }
    }

    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            provenance: Provenance::Fallback,
            is_fallback: true,
            fallback_reason: Some(reason.into()),
        }
    }
}

/// Outcome of one capability invocation.
///
/// Always carries a renderable payload. The provenance fields are private so
/// a fallback can never be built without its reason.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityResult<T> {
    payload: T,
    meta: ProvenanceMeta,
}

impl<T> CapabilityResult<T> {
    pub fn live(payload: T) -> Self {
        Self {
            payload,
            meta: ProvenanceMeta::live(),
        }
    }

    pub fn fallback(payload: T, reason: impl Into<String>) -> Self {
        Self {
            payload,
            meta: ProvenanceMeta::fallback(reason),
        }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn meta(&self) -> &ProvenanceMeta {
        &self.meta
    }

    pub fn provenance(&self) -> Provenance {
        self.meta.provenance
    }

    pub fn is_fallback(&self) -> bool {
        self.meta.is_fallback
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.meta.fallback_reason.as_deref()
    }

    pub fn into_parts(self) -> (T, ProvenanceMeta) {
        (self.payload, self.meta)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CapabilityResult<U> {
        CapabilityResult {
            payload: f(self.payload),
            meta: self.meta,
        }
    }
}
