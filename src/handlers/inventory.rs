use crate::entities::inventory_movement::MovementType;
use crate::errors::ServiceError;
use crate::services::inventory::{
    AdjustStockCommand, InventoryService, MovementFilter, TransferStockCommand,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// State trait giving handlers access to the inventory service.
pub trait InventoryHandlerState: Clone + Send + Sync + 'static {
    fn inventory_service(&self) -> &InventoryService;
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockRequest {
    #[validate(length(min = 1, message = "product SKU is required"))]
    pub product_sku: String,
    pub warehouse_id: i64,
    /// IN, OUT or ADJUST; defaults to ADJUST when omitted.
    pub movement_type: Option<String>,
    #[validate(range(min = 0, message = "quantity cannot be negative"))]
    pub quantity: i32,
    #[validate(length(min = 1, message = "adjustment reason is required"))]
    pub reason: String,
    pub reference_number: Option<String>,
    pub performed_by: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReduceStockRequest {
    #[validate(length(min = 1, message = "product SKU is required"))]
    pub product_sku: String,
    pub warehouse_id: i64,
    #[validate(range(min = 0, message = "quantity cannot be negative"))]
    pub quantity: i32,
    #[validate(length(min = 1, message = "reason is required"))]
    pub reason: String,
    pub reference_number: Option<String>,
    pub performed_by: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferStockRequest {
    #[validate(length(min = 1, message = "product SKU is required"))]
    pub product_sku: String,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    #[validate(range(min = 1, message = "transfer quantity must be > 0"))]
    pub quantity: i32,
    #[validate(length(min = 1, message = "transfer reference is required"))]
    pub reference: String,
    pub performed_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub product_sku: Option<String>,
    pub warehouse_id: Option<i64>,
    pub reference_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Export window in months; defaults to six.
    pub months: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LowStockRow {
    pub product_sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub min_stock: i32,
}

/// Create the inventory router
pub fn inventory_router<S>() -> Router<S>
where
    S: InventoryHandlerState,
{
    Router::new()
        .route("/adjust", post(adjust_stock::<S>))
        .route("/reduce", post(reduce_stock::<S>))
        .route("/transfer", post(transfer_stock::<S>))
        .route("/product/:sku/total", get(total_stock::<S>))
        .route(
            "/product/:sku/warehouse/:warehouse_id",
            get(stock_in_warehouse::<S>),
        )
        .route("/export", get(export_inventory::<S>))
        .route("/movements", get(list_movements::<S>))
        .route("/movements/summary", get(movement_summary::<S>))
        .route("/low-stock", get(low_stock::<S>))
}

/// Adjust stock manually (IN, OUT, ADJUST).
pub async fn adjust_stock<S>(
    State(state): State<S>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    payload.validate()?;
    let movement_type = parse_movement_type(payload.movement_type.as_deref())?;

    let adjustment = state
        .inventory_service()
        .adjust_stock(AdjustStockCommand {
            product_sku: payload.product_sku,
            warehouse_id: payload.warehouse_id,
            movement_type,
            quantity: payload.quantity,
            reason: Some(payload.reason),
            reference_number: payload.reference_number,
            performed_by: payload.performed_by,
        })
        .await?;

    Ok((StatusCode::OK, Json(adjustment)))
}

/// Reduce stock due to sales or shipment.
pub async fn reduce_stock<S>(
    State(state): State<S>,
    Json(payload): Json<ReduceStockRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    payload.validate()?;

    let adjustment = state
        .inventory_service()
        .reduce_stock(AdjustStockCommand {
            product_sku: payload.product_sku,
            warehouse_id: payload.warehouse_id,
            movement_type: MovementType::Out,
            quantity: payload.quantity,
            reason: Some(payload.reason),
            reference_number: payload.reference_number,
            performed_by: payload.performed_by,
        })
        .await?;

    Ok((StatusCode::OK, Json(adjustment)))
}

/// Transfer stock between warehouses.
pub async fn transfer_stock<S>(
    State(state): State<S>,
    Json(payload): Json<TransferStockRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    payload.validate()?;

    let outcome = state
        .inventory_service()
        .transfer_stock(TransferStockCommand {
            product_sku: payload.product_sku,
            from_warehouse_id: payload.from_warehouse_id,
            to_warehouse_id: payload.to_warehouse_id,
            quantity: payload.quantity,
            reference: payload.reference,
            performed_by: payload.performed_by,
        })
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

/// Get total stock by product SKU.
pub async fn total_stock<S>(
    State(state): State<S>,
    Path(sku): Path<String>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let total = state.inventory_service().total_stock(&sku).await?;
    Ok((StatusCode::OK, Json(total)))
}

/// Get stock in a specific warehouse.
pub async fn stock_in_warehouse<S>(
    State(state): State<S>,
    Path((sku, warehouse_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let quantity = state
        .inventory_service()
        .stock_in_warehouse(&sku, warehouse_id)
        .await?;
    Ok((StatusCode::OK, Json(quantity)))
}

/// Export the full ledger snapshot for analytics.
pub async fn export_inventory<S>(
    State(state): State<S>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let rows = state.inventory_service().list_inventory().await?;
    Ok((StatusCode::OK, Json(rows)))
}

/// Get inventory movement logs, optionally filtered.
pub async fn list_movements<S>(
    State(state): State<S>,
    Query(query): Query<MovementQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let movements = state
        .inventory_service()
        .list_movements(MovementFilter {
            product_sku: query.product_sku,
            warehouse_id: query.warehouse_id,
            reference_number: query.reference_number,
        })
        .await?;
    Ok((StatusCode::OK, Json(movements)))
}

/// Export summarized movement data for forecasting.
pub async fn movement_summary<S>(
    State(state): State<S>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let summary = state
        .inventory_service()
        .movement_summary(query.months)
        .await?;
    Ok((StatusCode::OK, Json(summary)))
}

/// Products currently below their minimum-stock threshold.
pub async fn low_stock<S>(State(state): State<S>) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let rows: Vec<LowStockRow> = state
        .inventory_service()
        .low_stock_products()
        .await?
        .into_iter()
        .map(|p| LowStockRow {
            product_sku: p.sku,
            product_name: p.name,
            quantity: p.quantity,
            min_stock: p.min_stock,
        })
        .collect();
    Ok((StatusCode::OK, Json(rows)))
}

fn parse_movement_type(raw: Option<&str>) -> Result<MovementType, ServiceError> {
    match raw {
        None => Ok(MovementType::Adjust),
        Some(s) => {
            MovementType::parse(s).ok_or_else(|| ServiceError::InvalidMovementType(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_type_defaults_to_adjust() {
        assert_eq!(parse_movement_type(None).unwrap(), MovementType::Adjust);
    }

    #[test]
    fn movement_type_rejects_garbage() {
        assert!(matches!(
            parse_movement_type(Some("RESTOCK")),
            Err(ServiceError::InvalidMovementType(_))
        ));
    }
}
