#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use std::sync::Arc;
use stockroom_api::{
    config::AppConfig,
    db,
    entities::{product, warehouse},
    events::{self, EventSender},
    services::inventory::InventoryService,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Harness spinning up the application against an in-memory SQLite database.
///
/// The pool is pinned to a single connection so the in-memory database
/// outlives individual acquisitions and writes serialize the way a real
/// backend's row locks would.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:", "127.0.0.1", 18080, "test");
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (tx, rx) = mpsc::channel(256);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));

        let inventory_service = InventoryService::new(db_arc.clone(), event_sender.clone());

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            inventory_service,
        };
        let router = stockroom_api::app_router().with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub fn service(&self) -> &InventoryService {
        &self.state.inventory_service
    }

    pub async fn seed_product(&self, sku: &str, name: &str, min_stock: i32) -> product::Model {
        product::ActiveModel {
            sku: Set(sku.to_string()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(dec!(19.9900)),
            min_stock: Set(min_stock),
            quantity: Set(0),
            dynamic_pricing: Set(false),
            competitor_price: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed product")
    }

    pub async fn seed_warehouse(&self, code: &str, name: &str) -> warehouse::Model {
        warehouse::ActiveModel {
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            location: Set(None),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed warehouse")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.send(request).await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
