use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::errors::FlowErrorResponse;
use super::handlers::FlowExchange;
use crate::crypto::SIGNATURE_HEADER;

#[derive(Clone)]
pub struct AppState {
    exchange: Arc<FlowExchange>,
}

impl AppState {
    pub fn new(exchange: Arc<FlowExchange>) -> Self {
        Self { exchange }
    }
}

/// Build the endpoint router; exposed separately so tests can drive it
/// without a listener
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Flow data-exchange callback
        .route("/flows/receive", post(receive_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(
    exchange: Arc<FlowExchange>,
    bind: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(AppState::new(exchange));

    let addr = format!("{}:{}", bind, port).parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Flow exchange endpoint listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining connections");
}

async fn health_handler() -> impl IntoResponse {
    axum::response::Json(json!({
        "status": "ok",
        "service": "flow-exchange-node",
    }))
}

/// The single protocol endpoint
///
/// The body is taken as raw bytes before any parsing: the signature covers
/// exactly what was sent. A successful exchange answers 200 `text/plain`
/// with the bare base64 ciphertext; media retrieval continues on a spawned
/// task after the reply.
async fn receive_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.exchange.run(&body, signature) {
        Ok(completed) => {
            let response_body = state.exchange.dispatch_completed(completed);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain")],
                response_body,
            )
                .into_response()
        }
        Err(error) => {
            tracing::warn!("exchange rejected: {}", error);
            FlowErrorResponse(error).into_response()
        }
    }
}
