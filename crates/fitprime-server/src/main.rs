mod config;

use config::AppConfig;
use fitprime_api::{AdminKey, AppState, GuardServices, build_router};
use fitprime_webhook::{UnregisteredInstancePolicy, WebhookSecret};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully");

    let policy = config.unregistered_policy();
    if policy == UnregisteredInstancePolicy::Allow {
        warn!("Webhooks for unregistered instances will be accepted without a token check");
    }

    // Create the guard stores and start their sweepers
    let mut services = GuardServices::with_retention(config.retention(), policy);
    services.start(&config.sweep_settings());

    let webhook_secret = config
        .security
        .webhook_signing_secret
        .clone()
        .map(WebhookSecret::new);
    if webhook_secret.is_none() {
        info!("No webhook signing secret configured, signatures will not be checked");
    }

    // Create application state
    let app_state = AppState::new(
        &services,
        AdminKey::new(config.security.admin_api_key.clone()),
        webhook_secret,
        config.webhook_limits(),
    )
    .with_admin_limit(config.admin_limit())
    .with_trusted_proxy(config.server.trust_proxy_headers);

    if config.server.trust_proxy_headers {
        warn!("Client addresses will be taken from X-Forwarded-For/X-Real-IP headers");
    }

    let app = build_router(app_state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            services.stop().await;
            std::process::exit(1);
        }
    };

    info!("Server listening on http://{}", addr);

    // Client addresses feed the per-IP rate limit keys
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    services.stop().await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Wait for SIGINT or SIGTERM for graceful shutdown
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
