use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tablegate::acl::AclPolicy;
use tablegate::config;
use tablegate::database::{DatabaseManager, MemoryStore, PgStore, RowStore, SchemaCatalog};
use tablegate::AppState;

#[derive(Debug, Parser)]
#[command(name = "tablegate", version, about = "Permission-aware CRUD over runtime-defined tables")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "TABLEGATE_PORT", default_value_t = 3000)]
    port: u16,

    /// Serve from process memory instead of Postgres
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL and friends are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .filter(|_| std::env::var("TABLEGATE_PORT").is_err())
        .unwrap_or(args.port);

    let config = config::config().clone();
    tracing::info!("Starting tablegate in {:?} mode", config.environment);
    if tablegate::is_production!() && config.security.jwt_secret.is_empty() {
        bail!("SECURITY_JWT_SECRET must be set in production");
    }

    let catalog = Arc::new(SchemaCatalog::with_system_tables()?);
    let store: Arc<dyn RowStore> = if args.memory {
        tracing::warn!("Using in-memory storage; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        let pool = DatabaseManager::connect(&config.database)
            .await
            .context("failed to connect to database")?;
        Arc::new(PgStore::new(pool, catalog.clone(), config.database.enable_query_logging))
    };

    for schema in catalog.schemas().await {
        store
            .apply_schema(&schema.create_change())
            .await
            .with_context(|| format!("failed to prepare table '{}'", schema.name))?;
    }
    let loaded = catalog
        .load_from(store.as_ref())
        .await
        .context("failed to load table definitions")?;
    tracing::info!("Loaded {} runtime table definitions", loaded);

    let acl = Arc::new(AclPolicy::from_config(&config.acl));
    let state = AppState::new(config, store, acl, catalog);
    let app = tablegate::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("tablegate listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
