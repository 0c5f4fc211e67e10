// `MigrationTrait` declares its methods with an elided `SchemaManager`
// lifetime; spelling it out trips E0195 under `async_trait`, so the
// `rust_2018_idioms` elision lint is allowed here.
#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_products_table::Migration),
            Box::new(m20240101_000002_create_warehouses_table::Migration),
            Box::new(m20240101_000003_create_inventory_items_table::Migration),
            Box::new(m20240101_000004_create_inventory_movements_table::Migration),
        ]
    }
}

mod m20240101_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).string().null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::MinStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::DynamicPricing)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Products::CompetitorPrice)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Sku,
        Name,
        Description,
        Price,
        MinStock,
        Quantity,
        DynamicPricing,
        CompetitorPrice,
        CreatedAt,
    }
}

mod m20240101_000002_create_warehouses_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_warehouses_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warehouses::Code)
                                .string_len(10)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Warehouses::Location).string_len(200).null())
                        .col(
                            ColumnDef::new(Warehouses::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Warehouses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_warehouses_code")
                        .table(Warehouses::Table)
                        .col(Warehouses::Code)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Warehouses {
        Table,
        Id,
        Code,
        Name,
        Location,
        Active,
        CreatedAt,
    }
}

mod m20240101_000003_create_inventory_items_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_products_table::Products;
    use super::m20240101_000002_create_warehouses_table::Warehouses;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_inventory_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::ProductSku)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_items_product")
                                .from(InventoryItems::Table, InventoryItems::ProductSku)
                                .to(Products::Table, Products::Sku),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_items_warehouse")
                                .from(InventoryItems::Table, InventoryItems::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // The unique pair index is what makes the lazy get-or-create an
            // upsert instead of a check-then-insert race.
            manager
                .create_index(
                    Index::create()
                        .name("uq_inventory_items_product_warehouse")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::ProductSku)
                        .col(InventoryItems::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryItems {
        Table,
        Id,
        ProductSku,
        WarehouseId,
        Quantity,
        UpdatedAt,
    }
}

mod m20240101_000004_create_inventory_movements_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_products_table::Products;
    use super::m20240101_000002_create_warehouses_table::Warehouses;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_inventory_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryMovements::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::ProductSku)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::PreviousQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::NewQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::Difference)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::MovementType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryMovements::Reason).string().not_null())
                        .col(
                            ColumnDef::new(InventoryMovements::ReferenceNumber)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::PerformedBy)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_movements_product")
                                .from(InventoryMovements::Table, InventoryMovements::ProductSku)
                                .to(Products::Table, Products::Sku),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_movements_warehouse")
                                .from(InventoryMovements::Table, InventoryMovements::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_inventory_movements_product")
                        .table(InventoryMovements::Table)
                        .col(InventoryMovements::ProductSku)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_inventory_movements_reference")
                        .table(InventoryMovements::Table)
                        .col(InventoryMovements::ReferenceNumber)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryMovements {
        Table,
        Id,
        ProductSku,
        WarehouseId,
        PreviousQuantity,
        NewQuantity,
        Difference,
        MovementType,
        Reason,
        ReferenceNumber,
        PerformedBy,
        CreatedAt,
    }
}
