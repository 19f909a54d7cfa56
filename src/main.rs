//! Activity relay binary.
//!
//! Wires the activity store, the broadcast transport, the bus and the live
//! and catch-up surfaces, then serves until SIGINT/SIGTERM.

use std::error::Error;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use activity_relay::adapters::http::{build_router, SyncAppState};
use activity_relay::adapters::websocket::LiveState;
use activity_relay::adapters::{
    ActivityBus, BroadcastRelay, HmacTokenSigner, InMemoryBroadcastTransport,
    JwtSessionValidator, MembershipPermissionChecker, PostgresActivityLogReader,
    RedisBroadcastTransport,
};
use activity_relay::application::{ActivityDispatcher, CatchupReconciler, SubscriberRegistry};
use activity_relay::config::{AppConfig, SecurityConfig, ServerConfig};
use activity_relay::ports::{BroadcastTransport, SessionValidator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let catalog = Arc::new(config.catalog.build()?);
    tracing::info!(
        tracked_types = catalog.len(),
        environment = ?config.server.environment,
        "Configuration loaded"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        tracing::info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }
    let store = Arc::new(PostgresActivityLogReader::new(pool));

    let transport: Arc<dyn BroadcastTransport> = match config.redis.url.as_deref() {
        Some(url) if config.redis.is_enabled() => Arc::new(
            RedisBroadcastTransport::connect(url, config.redis.channel.clone()).await?,
        ),
        _ => {
            tracing::warn!("No Redis URL configured, using the in-process broadcast transport");
            Arc::new(InMemoryBroadcastTransport::new())
        }
    };

    let bus = Arc::new(ActivityBus::new(catalog.clone()));
    let registry = Arc::new(SubscriberRegistry::new());
    let dispatcher = ActivityDispatcher::new_shared(
        registry.clone(),
        Arc::new(MembershipPermissionChecker::new(catalog.clone())),
        Arc::new(HmacTokenSigner::new(config.security.token_signing_secret.clone())),
    );
    bus.on_any(dispatcher);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay = BroadcastRelay::new(transport, bus);
    let relay_handle = tokio::spawn(async move {
        if let Err(e) = relay.run(shutdown_rx).await {
            tracing::error!(error = %e, "Broadcast relay failed");
        }
    });

    let sessions = session_validator(&config.security);
    let live = LiveState::new(registry, sessions.clone(), &config.dispatch);
    let sync = SyncAppState {
        reconciler: Arc::new(CatchupReconciler::new(store.clone(), store, catalog)),
    };
    let app = build_router(live, sync, sessions, &config.server);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Activity relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = relay_handle.await {
        tracing::warn!(error = %e, "Broadcast relay task did not finish cleanly");
    }
    tracing::info!("Activity relay shut down");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if server.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    }
}

fn session_validator(security: &SecurityConfig) -> Arc<dyn SessionValidator> {
    let mut validator = JwtSessionValidator::new(security.jwt_secret.clone());
    if let Some(issuer) = &security.jwt_issuer {
        validator = validator.with_issuer(issuer.clone());
    }
    if let Some(audience) = &security.jwt_audience {
        validator = validator.with_audience(audience.clone());
    }
    Arc::new(validator)
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
