//! Service binary: configuration, database wiring, listener.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use registra_api::state::AppState;
use registra_api::{app, db};
use registra_crypto::MasterSecret;

#[derive(Parser, Debug)]
#[command(name = "registra-api", about = "Membership registry API service")]
struct Args {
    /// Listen port.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Postgres connection string. Omit to run entirely in-memory.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Field-encryption master key, 64 hex characters.
    #[arg(long, env = "REGISTRA_MASTER_KEY_HEX")]
    master_key_hex: Option<String>,

    /// Generate a random master key at startup instead of requiring one.
    /// Encrypted fields will not survive a restart.
    #[arg(long)]
    ephemeral_master_key: bool,

    /// Skip session checks and act as a synthetic administrator. Local
    /// development only.
    #[arg(long, env = "REGISTRA_AUTH_DISABLED")]
    auth_disabled: bool,

    /// Districts to provision tenant secrets for at startup,
    /// comma-separated.
    #[arg(long, env = "REGISTRA_DISTRICTS", value_delimiter = ',')]
    districts: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let (master, ephemeral) = match (&args.master_key_hex, args.ephemeral_master_key) {
        (Some(hex), _) => (
            MasterSecret::from_hex(hex).context("REGISTRA_MASTER_KEY_HEX is invalid")?,
            false,
        ),
        (None, true) => {
            tracing::warn!("running with an ephemeral master key; encrypted fields will not survive a restart");
            (MasterSecret::generate(), true)
        }
        (None, false) => anyhow::bail!(
            "REGISTRA_MASTER_KEY_HEX is required (or pass --ephemeral-master-key for development)"
        ),
    };

    let mut state = AppState::with_master(master, ephemeral);
    if args.auth_disabled {
        tracing::warn!("session authentication is DISABLED; every call runs as an administrator");
        state = state.with_auth_disabled();
    }

    if let Some(url) = &args.database_url {
        let pool = db::init_pool(url).await?;
        db::hydrate(&pool, &state).await?;
        state = state.with_pool(pool);
    }

    for district in &args.districts {
        let district = district.trim();
        if district.is_empty() {
            continue;
        }
        state.ensure_district(district);
        if let Some(pool) = &state.db_pool {
            let secret = state
                .keyring
                .secret_for(district)
                .context("district secret missing after provisioning")?;
            db::secrets::ensure(pool, district, &secret)
                .await
                .with_context(|| format!("failed to persist tenant secret for {district}"))?;
        }
        tracing::info!(district, "district provisioned");
    }

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, in_memory = state.db_pool.is_none(), "listening");

    axum::serve(listener, app(state))
        .await
        .context("server exited with error")?;
    Ok(())
}
