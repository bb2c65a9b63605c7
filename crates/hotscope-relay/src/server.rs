//! WebSocket front for the relay.
//!
//! Remote inspector UIs (and, in test rigs, backends) connect here;
//! each socket is translated into one relay endpoint. The endpoint name
//! travels in the query string, the backend's session key as `tab`.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use hotscope_protocols::{Message, RelayError, SessionKey, BACKEND_ENDPOINT_NAME};

use crate::relay::{Relay, SenderContext};

/// Relay server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayServerConfig {
    /// Host to bind to (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on (default: 8090).
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

impl Default for RelayServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl RelayServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    /// Endpoint name: `hotscope-inspector-<key>` or `hotscope-backend`.
    name: String,
    /// Session key for backend connections.
    tab: Option<i64>,
}

/// Create the Axum router for the relay server.
pub fn create_router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .with_state(relay)
}

/// Bind and serve until the process exits.
pub async fn serve(config: RelayServerConfig, relay: Arc<Relay>) -> Result<(), RelayError> {
    let addr: std::net::SocketAddr = config
        .address()
        .parse()
        .map_err(|e| RelayError::BindFailed(format!("invalid address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RelayError::BindFailed(e.to_string()))?;
    info!("Relay server listening at http://{}", config.address());
    axum::serve(listener, create_router(relay))
        .await
        .map_err(|e| RelayError::BindFailed(e.to_string()))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(relay): State<Arc<Relay>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, relay, params))
}

/// Translate one socket into one relay endpoint.
async fn handle_socket(socket: WebSocket, relay: Arc<Relay>, params: ConnectParams) {
    let connected = if params.name == BACKEND_ENDPOINT_NAME {
        relay.connect_backend(SenderContext {
            session: params.tab.map(SessionKey),
        })
    } else {
        relay.connect_inspector(&params.name)
    };
    let mut handle = match connected {
        Ok(handle) => handle,
        Err(e) => {
            warn!(name = %params.name, error = %e, "endpoint rejected");
            return;
        }
    };
    let conn_id = uuid::Uuid::new_v4().to_string();
    debug!(
        %conn_id,
        name = %params.name,
        session = %handle.session(),
        "socket endpoint connected"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();
    loop {
        tokio::select! {
            relayed = handle.recv() => match relayed {
                Some(message) => {
                    let text = match message.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(%conn_id, error = %e, "unserializable relay message dropped");
                            continue;
                        }
                    };
                    if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                // Session torn down; close the socket.
                None => break,
            },

            frame = ws_rx.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match Message::from_json(&text) {
                    Ok(message) => {
                        if handle.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(%conn_id, error = %e, "undecodable frame dropped"),
                },
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%conn_id, error = %e, "socket error");
                    break;
                }
            },
        }
    }
    // Dropping the handle disconnects the endpoint and, if paired,
    // tears the session down.
    debug!(%conn_id, session = %handle.session(), "socket endpoint closed");
}

/// Health check endpoint.
async fn health_check(State(relay): State<Arc<Relay>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": "ok",
            "sessions": relay.session_count(),
        })
        .to_string(),
    )
}
