pub mod proxy;
pub mod websocket;

use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::config::ServerConfig;
use crate::constants::WS_PATH;
use crate::core::hub::HubHandle;
use crate::game_service::GameService;

/// Shared state handed to every route
#[derive(Clone)]
pub struct RelayContext {
    pub hub: HubHandle,
    pub service: Arc<dyn GameService>,
    pub config: Arc<ServerConfig>,
    /// Client used by the reverse proxy
    pub http: reqwest::Client,
}

impl RelayContext {
    pub fn new(
        hub: HubHandle,
        service: Arc<dyn GameService>,
        config: ServerConfig,
        http: reqwest::Client,
    ) -> Self {
        Self {
            hub,
            service,
            config: Arc::new(config),
            http,
        }
    }
}

#[derive(Debug, Serialize)]
struct Stats {
    clients: usize,
    rooms: usize,
}

/// All routes: `/ws`, `/health`, `/stats`, then the proxy for anything else
pub fn routes(
    ctx: RelayContext,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let ws_route = warp::path(WS_PATH)
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_context(ctx.clone()))
        .map(|ws: warp::ws::Ws, ctx: RelayContext| {
            log::debug!("New websocket connection");
            ws.max_message_size(ctx.config.max_message_size)
                .on_upgrade(move |socket| websocket::handle_ws_client(socket, ctx))
        });

    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "OK");

    let stats_route = warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(stats);

    let proxy_route = proxy::proxy_route(
        ctx.http.clone(),
        ctx.config.game_service_url.clone(),
        ctx.config.max_proxy_body,
    );

    ws_route.or(health_route).or(stats_route).or(proxy_route)
}

// Helper function to include the relay context in a request
fn with_context(
    ctx: RelayContext,
) -> impl Filter<Extract = (RelayContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

async fn stats(ctx: RelayContext) -> Result<Response, Infallible> {
    match ctx.hub.snapshot().await {
        Ok(snapshot) => Ok(warp::reply::json(&Stats {
            clients: snapshot.client_count(),
            rooms: snapshot.room_count(),
        })
        .into_response()),
        Err(e) => {
            log::error!("Stats unavailable: {}", e);
            Ok(warp::reply::with_status(e.to_string(), StatusCode::SERVICE_UNAVAILABLE)
                .into_response())
        }
    }
}
