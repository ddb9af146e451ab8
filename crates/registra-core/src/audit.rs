//! Structured audit events.
//!
//! The audit sink is append-only: core logic emits events and never mutates
//! or deletes them. Denied attempts are recorded with the same fidelity as
//! allowed ones — for the confidential-document lifecycle the audit trail is
//! part of the security boundary, not an afterthought.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A single append-only audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Dotted action name, e.g. `access_request.approved`,
    /// `document.open_denied`.
    pub action: String,
    /// The acting user.
    pub actor: UserId,
    /// The subject record, e.g. `access_request/<uuid>`.
    pub subject: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Free-form structured context.
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    /// Build an event with empty metadata, stamped now.
    pub fn new(action: impl Into<String>, actor: UserId, subject: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            actor,
            subject: subject.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach structured metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
