//! # Activity Log
//!
//! Append-only record of state transitions, for audit and support.
//!
//! Logging an activity must never fail a business operation: the trait
//! returns nothing, and implementations swallow their own failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One recorded activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// What happened, e.g. "sale.created", "return.inspected".
    pub event: String,
    /// Business key of the entity (sale numero or return codigo).
    pub entity_id: String,
    /// Who triggered it.
    pub actor_id: String,
    /// Free-form detail, e.g. "enviado -> entregado".
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Sink for activities. The orchestrator records transitions through this
/// seam so tests can capture them and production can ship them anywhere.
pub trait ActivityLog: Send + Sync {
    fn record(&self, activity: Activity);
}

/// Default sink: structured tracing events.
#[derive(Debug, Clone, Default)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn record(&self, activity: Activity) {
        info!(
            event = %activity.event,
            entity_id = %activity.entity_id,
            actor_id = %activity.actor_id,
            detail = %activity.detail,
            "Activity"
        );
    }
}

impl Activity {
    pub fn new(
        event: impl Into<String>,
        entity_id: impl Into<String>,
        actor_id: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Activity {
            event: event.into(),
            entity_id: entity_id.into(),
            actor_id: actor_id.into(),
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Test sink that captures activities in memory.
    #[derive(Debug, Clone, Default)]
    pub struct CapturingLog {
        pub activities: Arc<Mutex<Vec<Activity>>>,
    }

    impl ActivityLog for CapturingLog {
        fn record(&self, activity: Activity) {
            if let Ok(mut activities) = self.activities.lock() {
                activities.push(activity);
            }
        }
    }

    #[test]
    fn test_capture() {
        let log = CapturingLog::default();
        log.record(Activity::new("sale.created", "VEN-1", "u1", "creada"));

        let captured = log.activities.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].event, "sale.created");
        assert_eq!(captured[0].entity_id, "VEN-1");
    }
}
