use crate::{
    entities::{
        inventory_item::{self, Entity as InventoryItem},
        inventory_movement::{self, Entity as InventoryMovement, MovementType},
        product::{self, Entity as Product},
        warehouse::{self, Entity as Warehouse},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Months, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, TransactionError,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Default audit window for movement summary exports, in months.
const DEFAULT_SUMMARY_WINDOW_MONTHS: u32 = 6;

/// A single-sided stock mutation request.
///
/// `performed_by` is supplied explicitly by the caller; the engine never
/// consults ambient identity.
#[derive(Debug, Clone)]
pub struct AdjustStockCommand {
    pub product_sku: String,
    pub warehouse_id: i64,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reason: Option<String>,
    pub reference_number: Option<String>,
    pub performed_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransferStockCommand {
    pub product_sku: String,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub quantity: i32,
    pub reference: String,
    pub performed_by: Option<String>,
}

/// Outcome of a completed single-sided mutation.
#[derive(Debug, Clone, Serialize)]
pub struct StockAdjustment {
    pub product_sku: String,
    pub product_name: String,
    pub warehouse_code: String,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub difference: i32,
    pub movement_type: MovementType,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub status: String,
    pub message: String,
    pub product_sku: String,
    pub quantity: i32,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
}

/// One row of the full ledger snapshot used for exports.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryRow {
    pub product_sku: String,
    pub product_name: String,
    pub warehouse_code: String,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MovementRecord {
    pub id: i64,
    pub product_sku: String,
    pub product_name: String,
    pub warehouse_code: String,
    pub movement_type: String,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub difference: i32,
    pub reason: String,
    pub reference_number: Option<String>,
    pub performed_by: String,
    pub created_at: DateTime<Utc>,
}

/// Reduced projection of a movement for analytics exports; drops the internal
/// id and performer.
#[derive(Debug, Clone, Serialize)]
pub struct MovementSummary {
    pub product_sku: String,
    pub warehouse_code: String,
    pub movement_type: String,
    pub difference: i32,
    pub reason: String,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_sku: Option<String>,
    pub warehouse_id: Option<i64>,
    pub reference_number: Option<String>,
}

#[derive(Debug, FromQueryResult)]
struct QuantitySum {
    total: Option<i64>,
}

/// The inventory engine: sole writer of ledger quantities and sole creator of
/// movement rows. Every mutation runs inside one database transaction so the
/// ledger update, its audit row, and the product-aggregate resync commit or
/// roll back together.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Applies a single-sided stock mutation (IN, OUT or ADJUST) against one
    /// warehouse and records the movement.
    ///
    /// IN adds, OUT subtracts and rejects when the ledger holds less than
    /// requested, ADJUST sets the absolute quantity. Transfer legs are not
    /// accepted here; they only come out of [`transfer_stock`].
    ///
    /// [`transfer_stock`]: InventoryService::transfer_stock
    #[instrument(skip(self, command), fields(sku = %command.product_sku, warehouse_id = command.warehouse_id))]
    pub async fn adjust_stock(
        &self,
        command: AdjustStockCommand,
    ) -> Result<StockAdjustment, ServiceError> {
        if command.quantity < 0 {
            return Err(ServiceError::InvalidQuantity(
                "quantity must be >= 0".to_string(),
            ));
        }
        match command.movement_type {
            MovementType::In | MovementType::Out | MovementType::Adjust => {}
            other => {
                return Err(ServiceError::InvalidMovementType(format!(
                    "{} is only produced by transfers",
                    other
                )))
            }
        }

        let cmd = command.clone();
        let (adjustment, total, min_stock) = self
            .db
            .transaction::<_, (StockAdjustment, i32, i32), ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = find_product(txn, &cmd.product_sku).await?;
                    let wh = find_warehouse(txn, cmd.warehouse_id).await?;

                    let item = ledger_row_for_update(txn, &product.sku, wh.id).await?;
                    let previous = item.quantity;
                    let new_quantity = match cmd.movement_type {
                        MovementType::In => previous.checked_add(cmd.quantity).ok_or_else(
                            || ServiceError::InvalidQuantity("quantity overflow".to_string()),
                        )?,
                        MovementType::Out => {
                            if cmd.quantity > previous {
                                return Err(ServiceError::InsufficientStock(format!(
                                    "warehouse {} holds {} of {}, requested {}",
                                    wh.code, previous, product.sku, cmd.quantity
                                )));
                            }
                            previous - cmd.quantity
                        }
                        MovementType::Adjust => cmd.quantity,
                        // rejected above
                        _ => unreachable!(),
                    };

                    let updated_at = Utc::now();
                    let mut active: inventory_item::ActiveModel = item.into();
                    active.quantity = Set(new_quantity);
                    active.updated_at = Set(updated_at);
                    active.update(txn).await?;

                    record_movement(
                        txn,
                        &product.sku,
                        wh.id,
                        previous,
                        new_quantity,
                        cmd.movement_type,
                        cmd.reason.as_deref(),
                        cmd.reference_number.clone(),
                        cmd.performed_by.as_deref(),
                    )
                    .await?;

                    let total = sync_product_stock(txn, &product).await?;

                    Ok((
                        StockAdjustment {
                            product_sku: product.sku,
                            product_name: product.name,
                            warehouse_code: wh.code,
                            previous_quantity: previous,
                            new_quantity,
                            difference: new_quantity - previous,
                            movement_type: cmd.movement_type,
                            updated_at,
                        },
                        total,
                        product.min_stock,
                    ))
                })
            })
            .await
            .map_err(unwrap_transaction_error)?;

        info!(
            sku = %adjustment.product_sku,
            warehouse = %adjustment.warehouse_code,
            previous = adjustment.previous_quantity,
            new = adjustment.new_quantity,
            movement_type = %adjustment.movement_type,
            "stock updated"
        );

        self.event_sender
            .send(Event::StockAdjusted {
                product_sku: adjustment.product_sku.clone(),
                warehouse_id: command.warehouse_id,
                previous_quantity: adjustment.previous_quantity,
                new_quantity: adjustment.new_quantity,
                movement_type: adjustment.movement_type.as_str().to_string(),
                reference_number: command.reference_number.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        if total < min_stock {
            self.event_sender
                .send(Event::LowStockDetected {
                    product_sku: adjustment.product_sku.clone(),
                    quantity: total,
                    min_stock,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(adjustment)
    }

    /// Convenience wrapper used by sales and shipment flows; forces OUT.
    pub async fn reduce_stock(
        &self,
        mut command: AdjustStockCommand,
    ) -> Result<StockAdjustment, ServiceError> {
        command.movement_type = MovementType::Out;
        self.adjust_stock(command).await
    }

    /// Moves stock between two warehouses as one atomic unit: source debit,
    /// destination credit, both movement legs and one aggregate resync commit
    /// together or not at all.
    #[instrument(skip(self, command), fields(sku = %command.product_sku))]
    pub async fn transfer_stock(
        &self,
        command: TransferStockCommand,
    ) -> Result<TransferOutcome, ServiceError> {
        if command.quantity <= 0 {
            return Err(ServiceError::InvalidQuantity(
                "transfer quantity must be > 0".to_string(),
            ));
        }
        if command.from_warehouse_id == command.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "source and destination warehouse cannot be the same".to_string(),
            ));
        }

        let cmd = command.clone();
        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = find_product(txn, &cmd.product_sku).await?;
                    let from_wh = find_warehouse(txn, cmd.from_warehouse_id).await?;
                    let to_wh = find_warehouse(txn, cmd.to_warehouse_id).await?;

                    // Take the row locks in warehouse-id order so two opposing
                    // transfers cannot deadlock on each other.
                    let (first_wh, second_wh) = if from_wh.id < to_wh.id {
                        (&from_wh, &to_wh)
                    } else {
                        (&to_wh, &from_wh)
                    };
                    let first = ledger_row_for_update(txn, &product.sku, first_wh.id).await?;
                    let second = ledger_row_for_update(txn, &product.sku, second_wh.id).await?;
                    let (from_item, to_item) = if first.warehouse_id == from_wh.id {
                        (first, second)
                    } else {
                        (second, first)
                    };

                    let old_from = from_item.quantity;
                    let old_to = to_item.quantity;
                    if old_from < cmd.quantity {
                        return Err(ServiceError::InsufficientStock(format!(
                            "warehouse {} holds {} of {}, requested {}",
                            from_wh.code, old_from, product.sku, cmd.quantity
                        )));
                    }

                    let now = Utc::now();
                    let mut debit: inventory_item::ActiveModel = from_item.into();
                    debit.quantity = Set(old_from - cmd.quantity);
                    debit.updated_at = Set(now);
                    debit.update(txn).await?;

                    let new_to = old_to.checked_add(cmd.quantity).ok_or_else(|| {
                        ServiceError::InvalidQuantity("quantity overflow".to_string())
                    })?;
                    let mut credit: inventory_item::ActiveModel = to_item.into();
                    credit.quantity = Set(new_to);
                    credit.updated_at = Set(now);
                    credit.update(txn).await?;

                    record_movement(
                        txn,
                        &product.sku,
                        from_wh.id,
                        old_from,
                        old_from - cmd.quantity,
                        MovementType::TransferOut,
                        Some(&format!("Transfer to {}", to_wh.code)),
                        Some(cmd.reference.clone()),
                        cmd.performed_by.as_deref(),
                    )
                    .await?;
                    record_movement(
                        txn,
                        &product.sku,
                        to_wh.id,
                        old_to,
                        new_to,
                        MovementType::TransferIn,
                        Some(&format!("Transfer from {}", from_wh.code)),
                        Some(cmd.reference.clone()),
                        cmd.performed_by.as_deref(),
                    )
                    .await?;

                    // Net-zero for the product total, but resync anyway so the
                    // aggregate is always derived the same way.
                    sync_product_stock(txn, &product).await?;

                    Ok(())
                })
            })
            .await
            .map_err(unwrap_transaction_error)?;

        info!(
            sku = %command.product_sku,
            from = command.from_warehouse_id,
            to = command.to_warehouse_id,
            quantity = command.quantity,
            reference = %command.reference,
            "transfer completed"
        );

        self.event_sender
            .send(Event::StockTransferred {
                product_sku: command.product_sku.clone(),
                from_warehouse_id: command.from_warehouse_id,
                to_warehouse_id: command.to_warehouse_id,
                quantity: command.quantity,
                reference: command.reference.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(TransferOutcome {
            status: "SUCCESS".to_string(),
            message: "Stock transferred successfully".to_string(),
            product_sku: command.product_sku,
            quantity: command.quantity,
            from_warehouse_id: command.from_warehouse_id,
            to_warehouse_id: command.to_warehouse_id,
        })
    }

    /// Sum of ledger quantities for the SKU across all warehouses; 0 when the
    /// product has no ledger rows yet.
    pub async fn total_stock(&self, sku: &str) -> Result<i32, ServiceError> {
        ledger_sum(&*self.db, sku).await
    }

    /// Quantity held in a single warehouse, or 0 when no ledger row exists.
    pub async fn stock_in_warehouse(
        &self,
        sku: &str,
        warehouse_id: i64,
    ) -> Result<i32, ServiceError> {
        let item = InventoryItem::find()
            .filter(inventory_item::Column::ProductSku.eq(sku))
            .filter(inventory_item::Column::WarehouseId.eq(warehouse_id))
            .one(&*self.db)
            .await?;
        Ok(item.map(|i| i.quantity).unwrap_or(0))
    }

    /// Full ledger snapshot for export.
    pub async fn list_inventory(&self) -> Result<Vec<InventoryRow>, ServiceError> {
        let rows = InventoryItem::find()
            .find_also_related(Product)
            .order_by_asc(inventory_item::Column::Id)
            .all(&*self.db)
            .await?;
        let warehouses = warehouse_codes(&*self.db).await?;

        rows.into_iter()
            .map(|(item, prod)| {
                let prod = prod.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "ledger row {} references missing product {}",
                        item.id, item.product_sku
                    ))
                })?;
                Ok(InventoryRow {
                    product_sku: item.product_sku,
                    product_name: prod.name,
                    warehouse_code: warehouse_code(&warehouses, item.warehouse_id),
                    quantity: item.quantity,
                    updated_at: item.updated_at,
                })
            })
            .collect()
    }

    /// Movement log, optionally filtered, in construction order.
    pub async fn list_movements(
        &self,
        filter: MovementFilter,
    ) -> Result<Vec<MovementRecord>, ServiceError> {
        let mut query = InventoryMovement::find().find_also_related(Product);
        if let Some(sku) = &filter.product_sku {
            query = query.filter(inventory_movement::Column::ProductSku.eq(sku));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(inventory_movement::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(reference) = &filter.reference_number {
            query = query.filter(inventory_movement::Column::ReferenceNumber.eq(reference));
        }
        let rows = query
            .order_by_asc(inventory_movement::Column::Id)
            .all(&*self.db)
            .await?;
        let warehouses = warehouse_codes(&*self.db).await?;

        Ok(rows
            .into_iter()
            .map(|(m, prod)| MovementRecord {
                id: m.id,
                product_name: prod.map(|p| p.name).unwrap_or_default(),
                warehouse_code: warehouse_code(&warehouses, m.warehouse_id),
                product_sku: m.product_sku,
                movement_type: m.movement_type,
                previous_quantity: m.previous_quantity,
                new_quantity: m.new_quantity,
                difference: m.difference,
                reason: m.reason,
                reference_number: m.reference_number,
                performed_by: m.performed_by,
                created_at: m.created_at,
            })
            .collect())
    }

    /// Movements newer than `now - window_months`, projected for analytics.
    pub async fn movement_summary(
        &self,
        window_months: Option<u32>,
    ) -> Result<Vec<MovementSummary>, ServiceError> {
        let window = window_months.unwrap_or(DEFAULT_SUMMARY_WINDOW_MONTHS);
        let cutoff = Utc::now()
            .checked_sub_months(Months::new(window))
            .ok_or_else(|| {
                ServiceError::InvalidQuantity(format!("invalid summary window: {} months", window))
            })?;

        let rows = InventoryMovement::find()
            .filter(inventory_movement::Column::CreatedAt.gt(cutoff))
            .order_by_asc(inventory_movement::Column::Id)
            .all(&*self.db)
            .await?;
        let warehouses = warehouse_codes(&*self.db).await?;

        Ok(rows
            .into_iter()
            .map(|m| MovementSummary {
                warehouse_code: warehouse_code(&warehouses, m.warehouse_id),
                product_sku: m.product_sku,
                movement_type: m.movement_type,
                difference: m.difference,
                reason: m.reason,
                reference_number: m.reference_number,
                created_at: m.created_at,
            })
            .collect())
    }

    /// Products whose derived aggregate sits below their minimum-stock
    /// threshold. Read-only; the scheduled alerting job is external.
    pub async fn low_stock_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        let products = Product::find().all(&*self.db).await?;
        Ok(products
            .into_iter()
            .filter(|p| p.quantity < p.min_stock)
            .collect())
    }

    /// Recomputes one product's aggregate from the ledger sum and persists it.
    /// Idempotent; usable as an out-of-band reconciliation sweep.
    #[instrument(skip(self))]
    pub async fn resync_product_stock(&self, sku: &str) -> Result<i32, ServiceError> {
        let sku = sku.to_string();
        self.db
            .transaction::<_, i32, ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = find_product(txn, &sku).await?;
                    sync_product_stock(txn, &product).await
                })
            })
            .await
            .map_err(unwrap_transaction_error)
    }
}

fn unwrap_transaction_error(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(e) => ServiceError::from(e),
        TransactionError::Transaction(e) => e,
    }
}

async fn find_product(
    txn: &DatabaseTransaction,
    sku: &str,
) -> Result<product::Model, ServiceError> {
    Product::find_by_id(sku)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::ProductNotFound(sku.to_string()))
}

async fn find_warehouse(
    txn: &DatabaseTransaction,
    warehouse_id: i64,
) -> Result<warehouse::Model, ServiceError> {
    Warehouse::find_by_id(warehouse_id)
        .one(txn)
        .await?
        .ok_or(ServiceError::WarehouseNotFound(warehouse_id))
}

/// Fetches the ledger row for the pair with an exclusive row lock, lazily
/// creating it at quantity 0. Creation goes through `INSERT .. ON CONFLICT DO
/// NOTHING` against the unique pair index, so two concurrent first writers
/// cannot both insert; whichever loses the race re-reads the winner's row.
async fn ledger_row_for_update(
    txn: &DatabaseTransaction,
    sku: &str,
    warehouse_id: i64,
) -> Result<inventory_item::Model, ServiceError> {
    if let Some(item) = locked_ledger_row(txn, sku, warehouse_id).await? {
        return Ok(item);
    }

    let fresh = inventory_item::ActiveModel {
        product_sku: Set(sku.to_string()),
        warehouse_id: Set(warehouse_id),
        quantity: Set(0),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    InventoryItem::insert(fresh)
        .on_conflict(
            OnConflict::columns([
                inventory_item::Column::ProductSku,
                inventory_item::Column::WarehouseId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;

    locked_ledger_row(txn, sku, warehouse_id)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "ledger row missing after upsert for {} in warehouse {}",
                sku, warehouse_id
            ))
        })
}

async fn locked_ledger_row(
    txn: &DatabaseTransaction,
    sku: &str,
    warehouse_id: i64,
) -> Result<Option<inventory_item::Model>, ServiceError> {
    // SELECT .. FOR UPDATE on Postgres; SQLite drops the clause and relies on
    // its single-writer transaction model instead.
    Ok(InventoryItem::find()
        .filter(inventory_item::Column::ProductSku.eq(sku))
        .filter(inventory_item::Column::WarehouseId.eq(warehouse_id))
        .lock_exclusive()
        .one(txn)
        .await?)
}

#[allow(clippy::too_many_arguments)]
async fn record_movement(
    txn: &DatabaseTransaction,
    sku: &str,
    warehouse_id: i64,
    previous: i32,
    new: i32,
    movement_type: MovementType,
    reason: Option<&str>,
    reference_number: Option<String>,
    performed_by: Option<&str>,
) -> Result<(), ServiceError> {
    let movement = inventory_movement::ActiveModel {
        product_sku: Set(sku.to_string()),
        warehouse_id: Set(warehouse_id),
        previous_quantity: Set(previous),
        new_quantity: Set(new),
        difference: Set(new - previous),
        movement_type: Set(movement_type.as_str().to_string()),
        reason: Set(reason.unwrap_or("N/A").to_string()),
        reference_number: Set(reference_number),
        performed_by: Set(performed_by.unwrap_or("SYSTEM").to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    movement.insert(txn).await?;
    Ok(())
}

/// Recomputes the product aggregate as the full ledger sum. A full resync on
/// every mutation costs one aggregate read but cannot drift the way
/// incremental patches can.
async fn sync_product_stock(
    txn: &DatabaseTransaction,
    product: &product::Model,
) -> Result<i32, ServiceError> {
    let total = ledger_sum(txn, &product.sku).await?;

    let mut active: product::ActiveModel = product.clone().into();
    active.quantity = Set(total);
    active.update(txn).await?;
    Ok(total)
}

async fn ledger_sum<C: ConnectionTrait>(conn: &C, sku: &str) -> Result<i32, ServiceError> {
    let sum = InventoryItem::find()
        .select_only()
        .column_as(inventory_item::Column::Quantity.sum(), "total")
        .filter(inventory_item::Column::ProductSku.eq(sku))
        .into_model::<QuantitySum>()
        .one(conn)
        .await?;
    Ok(sum.and_then(|s| s.total).unwrap_or(0) as i32)
}

async fn warehouse_codes<C: ConnectionTrait>(
    conn: &C,
) -> Result<std::collections::HashMap<i64, String>, ServiceError> {
    let warehouses = Warehouse::find().all(conn).await?;
    Ok(warehouses.into_iter().map(|w| (w.id, w.code)).collect())
}

fn warehouse_code(codes: &std::collections::HashMap<i64, String>, id: i64) -> String {
    codes.get(&id).cloned().unwrap_or_else(|| "-".to_string())
}
