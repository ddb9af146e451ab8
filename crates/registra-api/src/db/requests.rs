//! Persistence for access requests and their derived grants.

use sqlx::PgPool;

use registra_workflow::{AccessGrant, AccessRequest, DocumentGrant};

/// Insert a freshly submitted request.
///
/// The partial unique index on pending rows turns a concurrent duplicate
/// into a unique violation; callers map that to a conflict.
pub async fn insert(pool: &PgPool, request: &AccessRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO access_requests \
         (id, requester, registry, capability, district, local, group_id, status, deleted_at, record) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(request.id.as_uuid())
    .bind(request.requester.as_uuid())
    .bind(request.registry.as_str())
    .bind(request.capability.as_str())
    .bind(request.scope.district.as_str())
    .bind(request.scope.local.as_str())
    .bind(request.group_id.map(|g| g.as_uuid()))
    .bind(request.status.as_str())
    .bind(request.deleted_at)
    .bind(sqlx::types::Json(request))
    .execute(pool)
    .await?;
    Ok(())
}

/// Persist a decision (approve or reject) on an existing request.
pub async fn update_decision(pool: &PgPool, request: &AccessRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE access_requests SET status = $2, deleted_at = $3, record = $4 WHERE id = $1",
    )
    .bind(request.id.as_uuid())
    .bind(request.status.as_str())
    .bind(request.deleted_at)
    .bind(sqlx::types::Json(request))
    .execute(pool)
    .await?;
    Ok(())
}

/// Upsert a grant row.
pub async fn update_grant(pool: &PgPool, grant: &AccessGrant) -> Result<(), sqlx::Error> {
    upsert_grant(grant, pool).await
}

async fn upsert_grant<'e, E>(grant: &AccessGrant, executor: E) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        "INSERT INTO access_grants (id, user_id, registry, district, local, record) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (id) DO UPDATE SET record = EXCLUDED.record",
    )
    .bind(grant.id.as_uuid())
    .bind(grant.user_id.as_uuid())
    .bind(grant.registry.as_str())
    .bind(grant.scope.district.as_str())
    .bind(grant.scope.local.as_str())
    .bind(sqlx::types::Json(grant))
    .execute(executor)
    .await?;
    Ok(())
}

/// Persist an approval atomically: the decided request, the upserted grant,
/// and (for confidential-document approvals) the document grant plus its
/// rendered artifact.
pub async fn persist_approval(
    pool: &PgPool,
    request: &AccessRequest,
    grant: &AccessGrant,
    document: Option<(&DocumentGrant, &str)>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE access_requests SET status = $2, record = $3 WHERE id = $1")
        .bind(request.id.as_uuid())
        .bind(request.status.as_str())
        .bind(sqlx::types::Json(request))
        .execute(&mut *tx)
        .await?;

    upsert_grant(grant, &mut *tx).await?;

    if let Some((doc, content)) = document {
        sqlx::query("INSERT INTO document_grants (id, user_id, record) VALUES ($1, $2, $3)")
            .bind(doc.id.as_uuid())
            .bind(doc.user_id.as_uuid())
            .bind(sqlx::types::Json(doc))
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO document_blobs (document_id, content) VALUES ($1, $2)")
            .bind(doc.id.as_uuid())
            .bind(content)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await
}
