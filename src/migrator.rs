use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_conversion_rates_table::Migration),
            Box::new(m20240101_000002_create_inventory_records_table::Migration),
            Box::new(m20240101_000003_create_stock_reservations_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_conversion_rates_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_conversion_rates_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ConversionRates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConversionRates::Sku)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversionRates::Level1UnitName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversionRates::Level2UnitName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversionRates::Level3UnitName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversionRates::Level1Rate)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversionRates::Level2Rate)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversionRates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversionRates::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConversionRates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ConversionRates {
        Table,
        Sku,
        Level1UnitName,
        Level2UnitName,
        Level3UnitName,
        Level1Rate,
        Level2Rate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_inventory_records_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_inventory_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryRecords::Sku).string().not_null())
                        .col(
                            ColumnDef::new(InventoryRecords::Warehouse)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryRecords::Location).string().null())
                        .col(ColumnDef::new(InventoryRecords::LotNumber).string().null())
                        .col(
                            ColumnDef::new(InventoryRecords::ManufactureDate)
                                .date()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::Level1Quantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::Level2Quantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::Level3Quantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_records_sku")
                        .table(InventoryRecords::Table)
                        .col(InventoryRecords::Sku)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_records_warehouse")
                        .table(InventoryRecords::Table)
                        .col(InventoryRecords::Warehouse)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryRecords {
        Table,
        Id,
        Sku,
        Warehouse,
        Location,
        LotNumber,
        ManufactureDate,
        Level1Quantity,
        Level2Quantity,
        Level3Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_stock_reservations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_stock_reservations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockReservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockReservations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockReservations::RecordId).uuid().not_null())
                        .col(ColumnDef::new(StockReservations::Sku).string().not_null())
                        .col(
                            ColumnDef::new(StockReservations::Warehouse)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockReservations::Location).string().null())
                        .col(ColumnDef::new(StockReservations::DemandRef).string().null())
                        .col(
                            ColumnDef::new(StockReservations::ReservedLevel1)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::ReservedLevel2)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::ReservedLevel3)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::ReservedBaseTotal)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::RatesMissing)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(StockReservations::Status).string().not_null())
                        .col(
                            ColumnDef::new(StockReservations::ReservedBy)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::ReservedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockReservations::FulfilledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(StockReservations::FulfilledBy).string().null())
                        .col(
                            ColumnDef::new(StockReservations::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(StockReservations::CancelledBy).string().null())
                        .col(
                            ColumnDef::new(StockReservations::CancelReason)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(StockReservations::Notes).string().null())
                        .col(
                            ColumnDef::new(StockReservations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_reservations_record_id")
                        .table(StockReservations::Table)
                        .col(StockReservations::RecordId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_reservations_status")
                        .table(StockReservations::Table)
                        .col(StockReservations::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_reservations_warehouse")
                        .table(StockReservations::Table)
                        .col(StockReservations::Warehouse)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_reservations_reserved_at")
                        .table(StockReservations::Table)
                        .col(StockReservations::ReservedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_reservations_demand_ref")
                        .table(StockReservations::Table)
                        .col(StockReservations::DemandRef)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockReservations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockReservations {
        Table,
        Id,
        RecordId,
        Sku,
        Warehouse,
        Location,
        DemandRef,
        ReservedLevel1,
        ReservedLevel2,
        ReservedLevel3,
        ReservedBaseTotal,
        RatesMissing,
        Status,
        ReservedBy,
        ReservedAt,
        FulfilledAt,
        FulfilledBy,
        CancelledAt,
        CancelledBy,
        CancelReason,
        Notes,
        UpdatedAt,
    }
}
