use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{error, info, warn};

use printshop_crm as crm;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = crm::config::load_config()?;
    crm::config::init_tracing(&cfg.log_level, cfg.log_json);

    // Init DB
    let db_pool = crm::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        crm::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let db_arc = Arc::new(db_pool);
    let app_state = crm::AppState::new(db_arc.clone(), cfg.clone());

    if let Some(period) = cfg.orphan_sweep_interval() {
        spawn_orphan_sweep(app_state.clone(), period, cfg.orphan_grace());
    }

    let app = crm::build_router(app_state)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors_layer(&cfg));

    // Bind and serve
    let ip: std::net::IpAddr = cfg.host.parse()?;
    let addr = SocketAddr::from((ip, cfg.port));
    info!("printshop-crm listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Ok(pool) = Arc::try_unwrap(db_arc) {
        if let Err(e) = crm::db::close_pool(pool).await {
            warn!("Failed to close database pool cleanly: {}", e);
        }
    }

    Ok(())
}

/// Periodically removes pedidos left without items by an interrupted creation.
fn spawn_orphan_sweep(state: crm::AppState, period: Duration, grace: Duration) {
    info!(?period, ?grace, "orphan pedido sweep enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match state.services.pedidos.reconcile_orphans(grace).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "orphan pedidos removed"),
                Err(e) => warn!(error = %e, "orphan pedido sweep failed"),
            }
        }
    });
}

/// Explicit origins when configured. Otherwise `validate_all` has already
/// required development mode or `cors_allow_any_origin`.
fn cors_layer(cfg: &crm::config::AppConfig) -> CorsLayer {
    let origins = cfg.cors_origins();
    if origins.is_empty() {
        info!("no CORS origins configured, allowing any origin");
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => sigterm.recv().await,
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        Ok(()) = signal::ctrl_c() => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
