pub mod session_handler;
pub mod trade_plan_handler;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde_json::Value;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::application::services::trade_session::TradeSession;
use crate::infrastructure::exchange_client_factory::ExchangeRegistry;
use crate::rate_limit::{rate_limit_middleware, GlobalRateLimiter};

/// Request bodies are tiny; trade requests travel over the WebSocket
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state of every HTTP and WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub session: TradeSession,
    pub registry: Arc<ExchangeRegistry>,
}

/// Build the application router. Only session upgrades are rate limited.
pub fn build_router(state: AppState, limiter: GlobalRateLimiter) -> Router {
    let sessions = Router::new()
        .route("/ws", get(session_handler::websocket_handler))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/trade-plans/:id", get(trade_plan_handler::get_trade_plan))
        .merge(sessions)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

pub async fn health_check(State(state): State<AppState>) -> Json<HashMap<String, Value>> {
    let mut exchanges = serde_json::Map::new();
    for exchange in state.registry.exchanges() {
        let healthy = match state.registry.get(&exchange) {
            Ok(client) => client.is_healthy().await,
            Err(_) => false,
        };
        exchanges.insert(exchange.to_string(), Value::from(healthy));
    }

    let mut response = HashMap::new();
    response.insert("status".to_string(), Value::from("running"));
    response.insert("exchanges".to_string(), Value::Object(exchanges));
    Json(response)
}
