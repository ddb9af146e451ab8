//! Persistence for per-district tenant secrets.
//!
//! A secret is written once when a district is provisioned and never
//! replaced: re-provisioning would orphan every field encrypted under the
//! old key.

use sqlx::PgPool;

use registra_crypto::TenantSecret;

/// Store a district's secret unless one already exists.
pub async fn ensure(pool: &PgPool, district: &str, secret: &TenantSecret) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tenant_secrets (district, secret_hex) VALUES ($1, $2) \
         ON CONFLICT (district) DO NOTHING",
    )
    .bind(district)
    .bind(secret.to_hex())
    .execute(pool)
    .await?;
    Ok(())
}
