// src/api.rs
//! Read-only HTTP projection for the rendering layer, plus a manual reload.

use std::sync::Arc;

use shuttle_axum::axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::carousel::{Carousel, PoolSummary, WindowSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub carousel: Arc<Carousel>,
}

impl AppState {
    pub fn new(carousel: Arc<Carousel>) -> Self {
        Self { carousel }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/window", get(window))
        .route("/pool", get(pool))
        .route("/admin/reload", post(admin_reload))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn window(State(state): State<AppState>) -> Json<WindowSnapshot> {
    Json(state.carousel.snapshot())
}

async fn pool(State(state): State<AppState>) -> Json<PoolSummary> {
    Json(state.carousel.pool_summary())
}

#[derive(serde::Serialize)]
struct ReloadOut {
    generation: u64,
    pool_size: usize,
}

async fn admin_reload(State(state): State<AppState>) -> Json<ReloadOut> {
    let pool = state.carousel.reload().await;
    info!(generation = pool.generation, pool = pool.len(), "manual reload");
    Json(ReloadOut {
        generation: pool.generation,
        pool_size: pool.len(),
    })
}
