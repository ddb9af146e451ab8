//! Persistence for audit events. Append-only: inserts, never updates.

use sqlx::PgPool;

use registra_core::AuditEvent;

/// Append one event.
pub async fn insert(pool: &PgPool, event: &AuditEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events (action, actor, subject, occurred_at, metadata) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&event.action)
    .bind(event.actor.as_uuid())
    .bind(&event.subject)
    .bind(event.timestamp)
    .bind(sqlx::types::Json(&event.metadata))
    .execute(pool)
    .await?;
    Ok(())
}
