use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::orchestrator::ScenarioOrchestrator;

/// Shared by every handler. Cloning is cheap; the orchestrator (and the
/// per-client health it owns) is shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub orchestrator: Arc<ScenarioOrchestrator>,
}
