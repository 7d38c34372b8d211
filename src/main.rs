use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;

use hwlock::config::Config;
use hwlock::db::{AppState, DocumentStore, SqliteStore, queries};
use hwlock::handlers;
use hwlock::id::EntityType;
use hwlock::licensing::generate_key;
use hwlock::models::{ActivityAction, ActorType, CreateLicense};
use hwlock::util::{ActivityLogBuilder, MS_PER_DAY, RequestMeta, now_ms};

#[derive(Parser, Debug)]
#[command(name = "hwlock")]
#[command(about = "License server that binds license keys to hardware IDs")]
struct Cli {
    /// Seed the database with demo licenses (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds a few demo licenses: one perpetual, one expiring in 30 days, one
/// already expired. Only runs when the license collection is empty.
fn seed_dev_data(state: &AppState) -> hwlock::error::Result<()> {
    let store = state.store.as_ref();
    if !queries::list_licenses(store)?.is_empty() {
        tracing::info!("Database already has licenses, skipping seed");
        return Ok(());
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let now = now_ms();
    let batch_id = EntityType::Batch.gen_id();
    let expiries = [
        ("perpetual", None),
        ("30 days", Some(now + 30 * MS_PER_DAY)),
        ("expired", Some(now - MS_PER_DAY)),
    ];

    let mut keys = Vec::with_capacity(expiries.len());
    for (label, expiry) in expiries {
        let license = queries::create_license(
            store,
            &CreateLicense {
                key: generate_key(&state.config.license_key_prefix),
                expiry,
                created_by: "system".into(),
                batch_id: Some(batch_id.clone()),
            },
        )?;
        tracing::info!("License ({}): {}", label, license.key);
        keys.push(license.key);
    }

    ActivityLogBuilder::new(store, &RequestMeta::default())
        .actor(ActorType::System, None)
        .action(ActivityAction::SeedLicenses)
        .details(serde_json::json!({ "batchId": batch_id, "keys": keys }))
        .save()?;

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");

    // Copy-paste friendly output (no log formatting)
    println!();
    println!("--- COPY FROM HERE ---");
    for key in &keys {
        println!("  license: {}", key);
    }
    println!("--- END COPY ---");
    println!();
    Ok(())
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hwlock=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let store = SqliteStore::open(&config.database_path).unwrap_or_else(|e| {
        tracing::error!("Failed to open database {}: {}", config.database_path, e);
        std::process::exit(1);
    });
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    if let Some(ref key) = config.generated_admin_key {
        tracing::warn!("============================================");
        tracing::warn!("ADMIN_API_KEY not set, generated one for this run:");
        tracing::warn!("Admin API Key: {}", key);
        tracing::warn!("SET ADMIN_API_KEY TO KEEP A STABLE KEY ACROSS RESTARTS");
        tracing::warn!("============================================");
    }

    let rate_limit = config.rate_limit;
    let addr = config.addr();
    let db_path = config.database_path.clone();
    let retention_days = config.activity_log_retention_days;
    let dev_mode = config.dev_mode;

    let state = AppState::new(store, config);

    // Purge old activity on startup (0 = never purge)
    if retention_days > 0 {
        match queries::purge_old_activity(state.store.as_ref(), retention_days) {
            Ok(count) if count > 0 => {
                tracing::info!("Purged {} activity entries older than {} days", count, retention_days);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to purge old activity entries: {}", e);
            }
        }
    }

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set HWLOCK_ENV=dev)");
        } else if let Err(e) = seed_dev_data(&state) {
            tracing::error!("Failed to seed dev data: {}", e);
        }
    }

    // Build the application router
    let app = Router::new()
        // Public endpoints (validation API, per-IP rate limited)
        .merge(handlers::public::router(rate_limit))
        // Admin API (admin key auth)
        .merge(handlers::admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Track if we should clean up on exit
    let cleanup_on_exit = cli.ephemeral && dev_mode;
    if cli.ephemeral && !dev_mode {
        tracing::warn!("--ephemeral flag ignored: not in dev mode (set HWLOCK_ENV=dev)");
    }
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("hwlock server listening on {}", addr);

    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        tracing::error!("Server error: {}", e);
    }

    // Cleanup on exit if ephemeral mode
    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        // Also remove WAL and SHM files if they exist
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
