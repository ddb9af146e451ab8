//! Persistence for officer credentialing.

use sqlx::PgPool;

use registra_core::{OfficerId, TenantScope};
use registra_workflow::{Officer, OfficerRequest};

/// Insert a freshly submitted credentialing request.
pub async fn insert_request(pool: &PgPool, request: &OfficerRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO officer_requests (id, requester, district, local, status, record) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(request.id.as_uuid())
    .bind(request.requester.as_uuid())
    .bind(request.scope.district.as_str())
    .bind(request.scope.local.as_str())
    .bind(request.status.as_str())
    .bind(sqlx::types::Json(request))
    .execute(pool)
    .await?;
    Ok(())
}

/// Persist a pipeline action on an existing request.
pub async fn update_request(pool: &PgPool, request: &OfficerRequest) -> Result<(), sqlx::Error> {
    update_request_on(request, pool).await
}

async fn update_request_on<'e, E>(request: &OfficerRequest, executor: E) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query("UPDATE officer_requests SET status = $2, record = $3 WHERE id = $1")
        .bind(request.id.as_uuid())
        .bind(request.status.as_str())
        .bind(sqlx::types::Json(request))
        .execute(executor)
        .await?;
    Ok(())
}

async fn upsert_officer<'e, E>(officer: &Officer, executor: E) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        "INSERT INTO officers (officer_uuid, district, local, is_active, record) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (officer_uuid) DO UPDATE SET \
         district = EXCLUDED.district, local = EXCLUDED.local, \
         is_active = EXCLUDED.is_active, record = EXCLUDED.record",
    )
    .bind(officer.officer_uuid.as_uuid())
    .bind(officer.scope.district.as_str())
    .bind(officer.scope.local.as_str())
    .bind(officer.is_active)
    .bind(sqlx::types::Json(officer))
    .execute(executor)
    .await?;
    Ok(())
}

async fn bump_headcount<'e, E>(
    scope: &TenantScope,
    delta: i64,
    executor: E,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        "INSERT INTO headcounts (district, local, count) VALUES ($1, $2, $3) \
         ON CONFLICT (district, local) DO UPDATE SET count = headcounts.count + EXCLUDED.count",
    )
    .bind(scope.district.as_str())
    .bind(scope.local.as_str())
    .bind(delta)
    .execute(executor)
    .await?;
    Ok(())
}

/// Persist an oath completion atomically: the completed request, the
/// created-or-reactivated identity, and the headcount change.
pub async fn persist_completion(
    pool: &PgPool,
    request: &OfficerRequest,
    officer: &Officer,
    headcount_delta: i64,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    update_request_on(request, &mut *tx).await?;
    upsert_officer(officer, &mut *tx).await?;
    if headcount_delta != 0 {
        bump_headcount(&request.scope, headcount_delta, &mut *tx).await?;
    }
    tx.commit().await
}

/// Persist an identity merge atomically: the surviving identity, the
/// re-pointed requests, the duplicate's deletion, and the headcount
/// decrement for the duplicate's scope.
pub async fn persist_merge(
    pool: &PgPool,
    survivor: &Officer,
    duplicate_id: OfficerId,
    duplicate_scope: &TenantScope,
    repointed: &[OfficerRequest],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    upsert_officer(survivor, &mut *tx).await?;
    for request in repointed {
        update_request_on(request, &mut *tx).await?;
    }
    sqlx::query("DELETE FROM officers WHERE officer_uuid = $1")
        .bind(duplicate_id.as_uuid())
        .execute(&mut *tx)
        .await?;
    bump_headcount(duplicate_scope, -1, &mut *tx).await?;
    tx.commit().await
}
