use sslcz_relay::api::{build_router, AppState};
use sslcz_relay::config::AppConfig;
use sslcz_relay::database::{InMemoryOrderRepository, OrderRepository};
use sslcz_relay::health::HealthChecker;
use sslcz_relay::logging::{init_tracing, mask_identifier};
use sslcz_relay::payments::providers::SslCommerzProvider;
use sslcz_relay::payments::PaymentGateway;
use sslcz_relay::services::{ImageProxyService, PaymentFlowService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        sandbox = config.sslcommerz.sandbox,
        store = %mask_identifier(&config.sslcommerz.store_id),
        gateway = config.sslcommerz.base_url(),
        "🚀 Starting SSLCommerz relay"
    );
    if config.security.internal_token.is_none() {
        warn!("INTERNAL_SHARED_TOKEN not set; /initiate and /orders are open");
    }

    let gateway: Arc<dyn PaymentGateway> = Arc::new(SslCommerzProvider::new(
        config.sslcommerz.clone(),
    )?);
    let orders: Arc<dyn OrderRepository> = Arc::new(InMemoryOrderRepository::new());
    let health_checker = HealthChecker::new(orders.clone(), gateway.name(), gateway.is_sandbox());

    let payments = Arc::new(PaymentFlowService::new(
        gateway,
        orders,
        config.redirects.clone(),
    ));
    let images = Arc::new(ImageProxyService::new(&config.images)?);

    let app = build_router(
        AppState {
            payments,
            images,
            health_checker,
            security: config.security.clone(),
        },
        &config.server,
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "✅ Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}
