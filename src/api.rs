use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::display::DisplayBoard;
use crate::models::{DisplayValue, Signal, StatusSnapshot};

#[derive(Clone)]
pub struct ApiState {
    pub status: Arc<Mutex<StatusSnapshot>>,
    pub board: DisplayBoard,
}

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: StatusSnapshot,
    pub display: HashMap<Signal, DisplayValue>,
}

pub async fn get_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let status = state.status.lock().await.clone();
    let display = state.board.values().await;
    Json(StatusResponse { status, display })
}

pub async fn get_health() -> &'static str {
    "ok"
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/health", get(get_health))
        .with_state(state)
}

pub async fn start_server(port: u16, state: ApiState) -> Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {}", port))?;
    info!("Status API: http://localhost:{}/api/status", addr.port());
    axum::serve(listener, app).await.context("API server stopped")?;
    Ok(())
}
