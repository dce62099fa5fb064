use crate::{RenderService, SessionState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Healthy,
    /// Serving, but the next request will pay for a browser start
    Degraded,
}

/// Snapshot returned by `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall: HealthLevel,
    pub session: SessionState,
    pub session_launches: usize,
    pub active_contexts: usize,
    pub checked_at: DateTime<Utc>,
}

/// Build a health report without touching the browser
///
/// Reflects the last known slot state; the session itself is not contacted.
pub fn check_health(service: &RenderService) -> HealthReport {
    let session = service.sessions.state();
    let overall = match session {
        SessionState::Absent => HealthLevel::Degraded,
        SessionState::Busy | SessionState::Live => HealthLevel::Healthy,
    };

    let report = HealthReport {
        overall,
        session,
        session_launches: service.sessions.launch_count(),
        active_contexts: service.producer.active_contexts(),
        checked_at: Utc::now(),
    };
    debug!("Health check: {:?}", report.overall);
    report
}
