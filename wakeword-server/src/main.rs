/// Wake-word detection service binary
///
/// Serves the HTTP control plane and the WebSocket streaming endpoint.

use std::sync::Arc;
use tracing::{error, info};
use wakeword_server::{api, AppState, EnergyModelFactory, ServiceConfig, WakeWordRegistry, VERSION};

#[tokio::main]
async fn main() {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wakeword_server=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting wake-word detection service v{}", VERSION);

    // Load configuration
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Wake words: {:?}", config.keywords.as_slice());
    info!(
        "Threshold: {}, status messages: {}, idle timeout: {:?}",
        config.threshold, config.emit_status, config.idle_timeout
    );

    // Load the initial model generation
    let registry = match WakeWordRegistry::new(Arc::new(EnergyModelFactory), config.keywords.clone()) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to load wake-word model: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::new(registry, config));

    if let Err(e) = api::serve(state).await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    info!("Wake-word detection service stopped");
}
