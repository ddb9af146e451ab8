//! # Audit Trail
//!
//! Append-only structured event log. Core logic only ever appends; nothing
//! in this service mutates or deletes recorded events. When a database pool
//! is configured, events are also written through to the `audit_events`
//! table; a persistence failure is logged but never fails the operation
//! being audited.

use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;

use registra_core::AuditEvent;

/// Shared append-only audit log.
#[derive(Clone, Default)]
pub struct AuditTrail {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl AuditTrail {
    /// Empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn append(&self, event: AuditEvent) {
        self.events.write().push(event);
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Snapshot of all events, in append order.
    pub fn list(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// Events whose subject matches, in append order.
    pub fn for_subject(&self, subject: &str) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.subject == subject)
            .cloned()
            .collect()
    }

    /// Append an event and write it through to the database when a pool is
    /// configured.
    pub async fn record(&self, event: AuditEvent, pool: Option<&PgPool>) {
        if let Some(pool) = pool {
            if let Err(e) = crate::db::audit::insert(pool, &event).await {
                tracing::error!(
                    action = %event.action,
                    subject = %event.subject,
                    error = %e,
                    "failed to persist audit event"
                );
            }
        }
        self.append(event);
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registra_core::UserId;

    #[test]
    fn append_preserves_order() {
        let trail = AuditTrail::new();
        let actor = UserId::new();
        trail.append(AuditEvent::new("request.submit", actor, "r1"));
        trail.append(AuditEvent::new("request.approve", actor, "r1"));
        trail.append(AuditEvent::new("document.open", actor, "d1"));

        let events = trail.list();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].action, "request.submit");
        assert_eq!(events[2].action, "document.open");
    }

    #[test]
    fn for_subject_filters() {
        let trail = AuditTrail::new();
        let actor = UserId::new();
        trail.append(AuditEvent::new("document.open", actor, "d1"));
        trail.append(AuditEvent::new("document.open", actor, "d2"));
        trail.append(AuditEvent::new("document.print", actor, "d1"));

        assert_eq!(trail.for_subject("d1").len(), 2);
        assert_eq!(trail.for_subject("d9").len(), 0);
    }
}
