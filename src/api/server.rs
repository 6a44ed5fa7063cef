//! API Server Module
//!
//! Application state, router construction, and server startup.

use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::address::AddressCodec;
use crate::api::{addresses, websocket};
use crate::common::AppConfig;
use crate::index::{AddressIndex, HttpAddressIndex};
use crate::transform::{LedgerTxTransform, TxTransform};

/// Shared application state for all endpoints
pub struct AppState {
    /// External address index collaborator
    pub index: Arc<dyn AddressIndex>,
    /// Transaction transform collaborator
    pub transform: Arc<dyn TxTransform>,
    /// Address parsing/translation at the request boundary
    pub codec: AddressCodec,
}

/// Shared application state type
pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub fn new(
        index: Arc<dyn AddressIndex>,
        transform: Arc<dyn TxTransform>,
        codec: AddressCodec,
    ) -> SharedAppState {
        Arc::new(Self {
            index,
            transform,
            codec,
        })
    }

    /// State wired from configuration: HTTP index client and the default
    /// ledger transform.
    pub fn from_config(config: &AppConfig) -> SharedAppState {
        Self::new(
            Arc::new(HttpAddressIndex::new(&config.index_url)),
            Arc::new(LedgerTxTransform),
            AddressCodec::new(
                config.network.bitcoin_network(),
                config.translate_addresses,
            ),
        )
    }
}

/// GET /health
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "addrstream-api",
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

pub fn create_router(state: SharedAppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        // Single-address lookups
        .route("/address/:addr", get(addresses::show))
        .route("/address/:addr/balance", get(addresses::balance))
        .route("/address/:addr/totalReceived", get(addresses::total_received))
        .route("/address/:addr/totalSent", get(addresses::total_sent))
        .route(
            "/address/:addr/unconfirmedBalance",
            get(addresses::unconfirmed_balance),
        )
        .route("/address/:addr/utxo", get(addresses::utxo))
        // Multi-address aggregation
        .route("/addresses/utxo", post(addresses::multiutxo_post))
        .route("/addresses/:addrs/utxo", get(addresses::multiutxo_get))
        .route("/addresses/txs", post(addresses::multitxs_post))
        .route("/addresses/:addrs/txs", get(addresses::multitxs_get))
        // WebSocket
        .route("/ws", get(websocket::ws_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: SharedAppState, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "addrstream API listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

// =============================================================================
// Tests
// =============================================================================
