pub mod identity;
pub mod rest;
pub mod state;
pub mod validation;

use std::sync::Arc;

use cn_core::CnResult;
use cn_engine::EngineConfig;
use state::AppState;

/// Build the application state and serve the REST API until shutdown.
pub async fn serve(config: EngineConfig, bind_host: &str, port: u16) -> CnResult<()> {
    let state = Arc::new(AppState::init(config)?);
    let router = rest::create_router(state);

    let addr = format!("{bind_host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| cn_core::CnError::Internal(format!("bind {addr}: {e}")))?;
    tracing::info!(addr = %addr, "REST API listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| cn_core::CnError::Internal(format!("server error: {e}")))
}
