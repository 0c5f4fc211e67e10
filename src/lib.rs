//! Stockroom API Library
//!
//! Warehouse stock ledger service: per-warehouse quantities, an append-only
//! movement audit trail, and transfers between warehouses.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

use handlers::inventory::InventoryHandlerState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub inventory_service: services::inventory::InventoryService,
}

impl InventoryHandlerState for AppState {
    fn inventory_service(&self) -> &services::inventory::InventoryService {
        &self.inventory_service
    }
}

/// Liveness probe.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Versioned API surface.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new().nest("/inventory", handlers::inventory::inventory_router())
}

/// Full application router, including health probes.
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1_routes())
}
