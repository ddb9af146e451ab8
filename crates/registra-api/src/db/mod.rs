//! # Database Layer
//!
//! Optional Postgres write-through. The in-memory stores stay authoritative
//! at runtime; every table carries the indexed key columns plus a `record`
//! JSONB column holding the full serialized struct, which is what startup
//! hydration reads back. Without `DATABASE_URL` the service runs entirely
//! in-memory.

pub mod audit;
pub mod documents;
pub mod officers;
pub mod requests;
pub mod secrets;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use registra_core::TenantScope;
use registra_workflow::{AccessGrant, AccessRequest, DocumentGrant, Officer, OfficerRequest};

use crate::state::AppState;

/// Connect and run pending migrations.
pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;
    Ok(pool)
}

/// Whether an error is a Postgres unique-constraint violation (SQLSTATE
/// 23505). The duplicate-pending index surfaces through here.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

/// Hydrate the in-memory stores from the database at startup.
pub async fn hydrate(pool: &PgPool, state: &AppState) -> anyhow::Result<()> {
    for row in sqlx::query("SELECT district, secret_hex FROM tenant_secrets")
        .fetch_all(pool)
        .await?
    {
        let district: String = row.try_get("district")?;
        let secret_hex: String = row.try_get("secret_hex")?;
        let secret = registra_crypto::TenantSecret::from_hex(&secret_hex)
            .with_context(|| format!("stored tenant secret for {district} is invalid"))?;
        state.keyring.provision(district, secret);
    }

    for row in sqlx::query("SELECT record FROM access_requests")
        .fetch_all(pool)
        .await?
    {
        let sqlx::types::Json(r): sqlx::types::Json<AccessRequest> = row.try_get("record")?;
        state.requests.insert(r.id, r);
    }

    for row in sqlx::query("SELECT record FROM access_grants")
        .fetch_all(pool)
        .await?
    {
        let sqlx::types::Json(g): sqlx::types::Json<AccessGrant> = row.try_get("record")?;
        state.grants.insert(g.id, g);
    }

    for row in sqlx::query("SELECT record FROM document_grants")
        .fetch_all(pool)
        .await?
    {
        let sqlx::types::Json(d): sqlx::types::Json<DocumentGrant> = row.try_get("record")?;
        state.documents.insert(d.id, d);
    }

    for row in sqlx::query("SELECT document_id, content FROM document_blobs")
        .fetch_all(pool)
        .await?
    {
        let id: uuid::Uuid = row.try_get("document_id")?;
        let content: String = row.try_get("content")?;
        state
            .blobs
            .insert(registra_core::DocumentId::from_uuid(id), content);
    }

    for row in sqlx::query("SELECT record FROM officer_requests")
        .fetch_all(pool)
        .await?
    {
        let sqlx::types::Json(r): sqlx::types::Json<OfficerRequest> = row.try_get("record")?;
        state.officer_requests.insert(r.id, r);
    }

    for row in sqlx::query("SELECT record FROM officers")
        .fetch_all(pool)
        .await?
    {
        let sqlx::types::Json(o): sqlx::types::Json<Officer> = row.try_get("record")?;
        state.officers.insert(o.officer_uuid, o);
    }

    for row in sqlx::query("SELECT district, local, count FROM headcounts")
        .fetch_all(pool)
        .await?
    {
        let district: String = row.try_get("district")?;
        let local: String = row.try_get("local")?;
        let count: i64 = row.try_get("count")?;
        state.headcounts.insert(TenantScope::new(district, local), count);
    }

    tracing::info!(
        requests = state.requests.len(),
        grants = state.grants.len(),
        documents = state.documents.len(),
        officer_requests = state.officer_requests.len(),
        officers = state.officers.len(),
        "hydrated stores from database"
    );
    Ok(())
}
