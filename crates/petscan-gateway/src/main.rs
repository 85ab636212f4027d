//! PetScan Gateway Binary
//!
//! Runs the HTTP gateway for authenticated pet image analysis.

use std::env;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use petscan_core::TokenService;
use petscan_gateway::{
    create_router, AppState, AuthService, GatewayConfig, MemoryStore, PasswordHasher, UserStore,
};
use petscan_worker::{ProcessInvoker, WorkerAnalyzer};

#[tokio::main]
async fn main() {
    // Initialize logging
    let log_level = env::var("PETSCAN_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if let Err(e) = run().await {
        error!(error = %e, "Gateway stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::from_env()?;

    // Token service; the secret itself is never logged
    let tokens = TokenService::new(&config.jwt_secret, config.jwt_expiration_ms)?;
    info!(
        algorithm = ?tokens.algorithm(),
        lifetime_secs = tokens.lifetime().num_seconds(),
        "Token service ready"
    );

    let users = open_store(&config).await?;

    let invoker = ProcessInvoker::new(config.worker.clone());
    if !invoker.has_worker() {
        return Err(format!("worker program {:?} is not embedded", config.worker.worker).into());
    }

    info!(
        port = config.port,
        interpreter = %config.worker.interpreter.display(),
        worker = %config.worker.worker,
        timeout = ?config.worker.timeout,
        origins = ?config.allowed_origins,
        "Starting PetScan gateway"
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState {
        auth: AuthService::new(users, PasswordHasher::new(), tokens),
        analyzer: Arc::new(WorkerAnalyzer::new(invoker)),
        config,
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "PetScan gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn open_store(config: &GatewayConfig) -> Result<Arc<dyn UserStore>, Box<dyn std::error::Error>> {
    #[cfg(feature = "postgres")]
    if let Some(url) = &config.database_url {
        let store = petscan_gateway::PostgresStore::new(url).await?;
        return Ok(Arc::new(store));
    }

    if config.database_url.is_some() {
        warn!("PETSCAN_DATABASE_URL is set but the postgres feature is disabled; using memory store");
    } else {
        info!("Using in-memory user store");
    }
    Ok(Arc::new(MemoryStore::new()))
}
