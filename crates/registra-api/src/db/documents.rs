//! Persistence for confidential document grants.

use sqlx::PgPool;

use registra_workflow::DocumentGrant;

/// Persist an advanced lifecycle state. When the grant has tombstoned, the
/// rendered artifact row is purged in the same transaction.
pub async fn update(pool: &PgPool, document: &DocumentGrant) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE document_grants SET record = $2 WHERE id = $1")
        .bind(document.id.as_uuid())
        .bind(sqlx::types::Json(document))
        .execute(&mut *tx)
        .await?;

    if document.is_tombstoned() {
        sqlx::query("DELETE FROM document_blobs WHERE document_id = $1")
            .bind(document.id.as_uuid())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await
}
