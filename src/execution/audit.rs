use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{AuditEvent, AuditEventType};
use crate::persistence::SignalStore;

/// Best-effort writer for the security audit trail
///
/// Write failures are logged and swallowed; the trail never blocks trading.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn SignalStore>,
    enabled: bool,
    operator_id: Uuid,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn SignalStore>, enabled: bool, operator_id: Uuid) -> Self {
        Self {
            store,
            enabled,
            operator_id,
        }
    }

    pub async fn record(&self, event_type: AuditEventType, details: Value) {
        if !self.enabled {
            return;
        }

        let event = AuditEvent {
            user_id: Some(self.operator_id),
            event_type,
            details,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_audit_event(&event).await {
            tracing::warn!("Failed to log {} audit: {}", event_type.as_str(), e);
        }
    }
}
