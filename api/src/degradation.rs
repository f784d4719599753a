//! Per-client health state and the live/fallback decision.
//!
//! Each vendor client owns one [`HealthTracker`]. Once a call fails in a way
//! that says the backend is unusable the tracker latches into fallback mode
//! and ordinary calls skip the network entirely. Only a successful health
//! probe leaves fallback mode.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::clients::error::CapabilityError;

/// The four vendor capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    Completion,
    Speech,
    VectorStore,
    Avatar,
}

impl Service {
    /// Vendor label used in logs and the health report.
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Completion => "groq",
            Service::Speech => "elevenlabs",
            Service::VectorStore => "pinecone",
            Service::Avatar => "ready_player_me",
        }
    }
}

/// Health state of one client.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ServiceHealth {
    pub last_known_available: bool,
    pub fallback_engaged: bool,
    pub last_error: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl ServiceHealth {
    fn fresh() -> Self {
        Self {
            last_known_available: true,
            fallback_engaged: false,
            last_error: None,
            last_checked_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Ordinary,
    HealthProbe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AttemptLive,
    UseFallbackDirectly,
}

/// Pure policy: health probes always go out, ordinary calls only while the
/// client is not latched.
pub fn decide(health: &ServiceHealth, kind: CallKind) -> Decision {
    match kind {
        CallKind::HealthProbe => Decision::AttemptLive,
        CallKind::Ordinary if health.fallback_engaged => Decision::UseFallbackDirectly,
        CallKind::Ordinary => Decision::AttemptLive,
    }
}

/// Point-in-time view of a tracker, for the health report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthSnapshot {
    #[serde(flatten)]
    pub health: ServiceHealth,
    /// Ordinary calls answered from fallback without touching the network
    pub short_circuited_calls: u64,
}

/// Shared, internally synchronized [`ServiceHealth`].
///
/// The lock is only held for field updates, never across an await, so
/// concurrent requests always observe a consistent state.
#[derive(Debug)]
pub struct HealthTracker {
    service: Service,
    state: Mutex<ServiceHealth>,
    short_circuited: AtomicU64,
}

impl HealthTracker {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            state: Mutex::new(ServiceHealth::fresh()),
            short_circuited: AtomicU64::new(0),
        }
    }

    /// Tracker for a client without credentials: latched from the start.
    pub fn unconfigured(service: Service) -> Self {
        let tracker = Self::new(service);
        tracker.with_state(|state| {
            state.last_known_available = false;
            state.fallback_engaged = true;
            state.last_error = Some(CapabilityError::NotConfigured.to_string());
        });
        tracker
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn current(&self) -> ServiceHealth {
        self.with_state(|state| state.clone())
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            health: self.current(),
            short_circuited_calls: self.short_circuited.load(Ordering::Relaxed),
        }
    }

    pub fn decide(&self, kind: CallKind) -> Decision {
        self.with_state(|state| decide(state, kind))
    }

    pub fn record_success(&self) {
        self.with_state(|state| {
            state.last_known_available = true;
            state.fallback_engaged = false;
            state.last_error = None;
            state.last_checked_at = Some(Utc::now());
        });
    }

    /// Record a failed live call. Returns whether the failure latched.
    pub fn record_failure(&self, err: &CapabilityError) -> bool {
        let latches = err.latches();
        self.with_state(|state| {
            if latches {
                state.last_known_available = false;
                state.fallback_engaged = true;
            }
            state.last_error = Some(err.to_string());
            state.last_checked_at = Some(Utc::now());
        });
        latches
    }

    /// Run one ordinary call under the policy.
    ///
    /// `Err` carries the fallback reason; the caller substitutes its
    /// synthetic payload. Failures are logged here with their class.
    pub async fn attempt<T, Fut>(
        &self,
        operation: &'static str,
        call: impl FnOnce() -> Fut,
    ) -> Result<T, String>
    where
        Fut: Future<Output = Result<T, CapabilityError>>,
    {
        if self.decide(CallKind::Ordinary) == Decision::UseFallbackDirectly {
            self.short_circuited.fetch_add(1, Ordering::Relaxed);
            let last_error = self
                .current()
                .last_error
                .unwrap_or_else(|| "backend unavailable".to_string());
            tracing::debug!(
                service = self.service.as_str(),
                operation,
                "Fallback engaged, skipping live call"
            );
            return Err(format!("fallback engaged: {last_error}"));
        }

        match call().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                let latched = self.record_failure(&err);
                tracing::warn!(
                    service = self.service.as_str(),
                    operation,
                    class = err.class(),
                    error = %err,
                    latched,
                    "Live call failed, using fallback"
                );
                Err(format!("{}: {err}", err.class()))
            }
        }
    }

    /// Run a health probe under the policy. A probe is the only way out of
    /// fallback mode.
    pub async fn probe<Fut>(&self, call: impl FnOnce() -> Fut) -> bool
    where
        Fut: Future<Output = Result<(), CapabilityError>>,
    {
        debug_assert_eq!(self.decide(CallKind::HealthProbe), Decision::AttemptLive);
        match call().await {
            Ok(()) => {
                self.record_success();
                tracing::info!(service = self.service.as_str(), "Health probe succeeded");
                true
            }
            Err(err) => {
                // A reachable backend answering oddly is still not healthy.
                self.with_state(|state| {
                    state.last_known_available = false;
                    state.fallback_engaged = true;
                    state.last_error = Some(err.to_string());
                    state.last_checked_at = Some(Utc::now());
                });
                tracing::warn!(
                    service = self.service.as_str(),
                    class = err.class(),
                    error = %err,
                    "Health probe failed"
                );
                false
            }
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ServiceHealth) -> R) -> R {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn latched_state_short_circuits_ordinary_calls_only() {
        let mut health = ServiceHealth::fresh();
        assert_eq!(decide(&health, CallKind::Ordinary), Decision::AttemptLive);
        health.fallback_engaged = true;
        assert_eq!(
            decide(&health, CallKind::Ordinary),
            Decision::UseFallbackDirectly
        );
        assert_eq!(decide(&health, CallKind::HealthProbe), Decision::AttemptLive);
    }

    #[test]
    fn auth_failure_latches_and_success_clears() {
        let tracker = HealthTracker::new(Service::Speech);
        assert!(tracker.record_failure(&CapabilityError::Auth(401)));
        let health = tracker.current();
        assert!(health.fallback_engaged);
        assert!(!health.last_known_available);
        assert!(health.last_error.is_some());

        tracker.record_success();
        let health = tracker.current();
        assert!(!health.fallback_engaged);
        assert!(health.last_known_available);
        assert!(health.last_error.is_none());
    }

    #[test]
    fn malformed_response_does_not_latch() {
        let tracker = HealthTracker::new(Service::Completion);
        assert!(!tracker.record_failure(&CapabilityError::MalformedResponse("x".into())));
        assert!(!tracker.current().fallback_engaged);
        assert_eq!(tracker.decide(CallKind::Ordinary), Decision::AttemptLive);
    }

    #[test]
    fn unconfigured_tracker_starts_latched() {
        let tracker = HealthTracker::unconfigured(Service::Avatar);
        let health = tracker.current();
        assert!(health.fallback_engaged);
        assert_eq!(health.last_error.as_deref(), Some("service not configured"));
    }

    #[tokio::test]
    async fn attempt_skips_the_call_once_latched() {
        let tracker = HealthTracker::new(Service::VectorStore);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let first: Result<(), String> = tracker
            .attempt("query", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CapabilityError::Transport("connection refused".into()))
            })
            .await;
        assert!(first.unwrap_err().starts_with("TransportFailure"));

        for _ in 0..3 {
            let result: Result<(), String> = tracker
                .attempt("query", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            assert!(result.unwrap_err().starts_with("fallback engaged"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.snapshot().short_circuited_calls, 3);

        assert!(tracker.probe(|| async { Ok(()) }).await);
        let live: Result<u8, String> = tracker.attempt("query", || async { Ok(7) }).await;
        assert_eq!(live, Ok(7));
    }

    #[tokio::test]
    async fn failed_probe_keeps_fallback_engaged() {
        let tracker = HealthTracker::unconfigured(Service::Speech);
        let healthy = tracker
            .probe(|| async { Err(CapabilityError::Status(503)) })
            .await;
        assert!(!healthy);
        assert!(tracker.current().fallback_engaged);
    }
}
