use std::sync::Arc;

use log::{error, info, warn};

use room_relay::config::ServerConfig;
use room_relay::core::Hub;
use room_relay::game_service::HttpGameService;
use room_relay::handlers::{routes, RelayContext};

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, game service={}",
        config.host, config.port, config.game_service_url
    );

    let addr = match config.listen_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let http = match reqwest::Client::builder()
        .timeout(config.service_timeout)
        .build()
    {
        Ok(http) => http,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let service = HttpGameService::with_client(http.clone(), &config.game_service_url);
    let hub = Hub::spawn();
    let ctx = RelayContext::new(hub, Arc::new(service), config, http);

    let server = match warp::serve(routes(ctx)).try_bind_ephemeral(addr) {
        Ok((bound, server)) => {
            info!("Starting Room Relay server on {}", bound);
            server
        }
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    server.await;
}
