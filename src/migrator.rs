use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_reference_tables::Migration),
            Box::new(m20240301_000002_create_products_table::Migration),
            Box::new(m20240301_000003_create_inventory_items_table::Migration),
            Box::new(m20240301_000004_create_stock_tables::Migration),
            Box::new(m20240301_000005_create_assignments_table::Migration),
            Box::new(m20240301_000006_create_repairs_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_reference_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_reference_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Branches::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Branches::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Branches::Name).string().not_null())
                        .col(ColumnDef::new(Branches::City).string().null())
                        .col(ColumnDef::new(Branches::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Sectors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sectors::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sectors::Name).string().not_null())
                        .col(ColumnDef::new(Sectors::BranchId).uuid().null())
                        .col(ColumnDef::new(Sectors::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Employees::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Employees::Name).string().not_null())
                        .col(ColumnDef::new(Employees::Email).string().not_null())
                        .col(ColumnDef::new(Employees::SectorId).uuid().null())
                        .col(
                            ColumnDef::new(Employees::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Employees::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Categories::Name).string().not_null())
                        .col(
                            ColumnDef::new(Categories::RequiresEncryptionPassword)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Categories::RequiresServiceAccount)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Categories::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_categories_name")
                        .table(Categories::Table)
                        .col(Categories::Name)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sectors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Branches::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Branches {
        Table,
        Id,
        Name,
        City,
        CreatedAt,
    }

    #[derive(Iden)]
    enum Sectors {
        Table,
        Id,
        Name,
        BranchId,
        CreatedAt,
    }

    #[derive(Iden)]
    enum Employees {
        Table,
        Id,
        Name,
        Email,
        SectorId,
        Active,
        CreatedAt,
    }

    #[derive(Iden)]
    enum Categories {
        Table,
        Id,
        Name,
        RequiresEncryptionPassword,
        RequiresServiceAccount,
        CreatedAt,
    }
}

mod m20240301_000002_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_products_table"
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
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Brand).string().not_null())
                        .col(ColumnDef::new(Products::Model).string().not_null())
                        .col(ColumnDef::new(Products::CategoryId).uuid().not_null())
                        .col(
                            ColumnDef::new(Products::MinimumStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::SerialTracked).boolean().not_null())
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_category_id")
                        .table(Products::Table)
                        .col(Products::CategoryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_active")
                        .table(Products::Table)
                        .col(Products::Active)
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

    #[derive(Iden)]
    enum Products {
        Table,
        Id,
        Brand,
        Model,
        CategoryId,
        MinimumStock,
        SerialTracked,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_inventory_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_inventory_items_table"
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
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::SerialNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::State).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::DecommissionReason)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::DecommissionedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_serial_number")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::SerialNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_product_id")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_state")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::State)
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

    #[derive(Iden)]
    enum InventoryItems {
        Table,
        Id,
        ProductId,
        SerialNumber,
        State,
        DecommissionReason,
        DecommissionedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_stock_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockBalances::ProductId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBalances::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBalances::Version)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBalances::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::Direction)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(StockMovements::BalanceBefore)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::BalanceAfter)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::Sequence)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Reason).string().not_null())
                        .col(ColumnDef::new(StockMovements::Notes).string().null())
                        .col(ColumnDef::new(StockMovements::EmployeeId).uuid().null())
                        .col(ColumnDef::new(StockMovements::SectorId).uuid().null())
                        .col(ColumnDef::new(StockMovements::BranchId).uuid().null())
                        .col(ColumnDef::new(StockMovements::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::OccurredAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_product_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .to_owned(),
                )
                .await?;

            // Replay order: one sequence per product per movement.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_product_sequence")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .col(StockMovements::Sequence)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockBalances::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StockBalances {
        Table,
        ProductId,
        Quantity,
        Version,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum StockMovements {
        Table,
        Id,
        ProductId,
        Direction,
        Quantity,
        BalanceBefore,
        BalanceAfter,
        Sequence,
        Reason,
        Notes,
        EmployeeId,
        SectorId,
        BranchId,
        CreatedBy,
        OccurredAt,
    }
}

mod m20240301_000005_create_assignments_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_assignments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Assignments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Assignments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Assignments::ItemId).uuid().null())
                        .col(ColumnDef::new(Assignments::ProductId).uuid().null())
                        .col(ColumnDef::new(Assignments::Quantity).integer().null())
                        .col(ColumnDef::new(Assignments::EmployeeId).uuid().null())
                        .col(ColumnDef::new(Assignments::SectorId).uuid().null())
                        .col(ColumnDef::new(Assignments::BranchId).uuid().null())
                        .col(ColumnDef::new(Assignments::Status).string().not_null())
                        .col(ColumnDef::new(Assignments::ClosedReason).string().null())
                        .col(
                            ColumnDef::new(Assignments::EncryptionPassword)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Assignments::ServiceAccount).string().null())
                        .col(ColumnDef::new(Assignments::Notes).string().null())
                        .col(
                            ColumnDef::new(Assignments::AssignedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Assignments::ReturnedAt).timestamp().null())
                        .col(ColumnDef::new(Assignments::CreatedBy).uuid().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_assignments_item_id")
                        .table(Assignments::Table)
                        .col(Assignments::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_assignments_status")
                        .table(Assignments::Table)
                        .col(Assignments::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_assignments_employee_id")
                        .table(Assignments::Table)
                        .col(Assignments::EmployeeId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Assignments::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Assignments {
        Table,
        Id,
        ItemId,
        ProductId,
        Quantity,
        EmployeeId,
        SectorId,
        BranchId,
        Status,
        ClosedReason,
        EncryptionPassword,
        ServiceAccount,
        Notes,
        AssignedAt,
        ReturnedAt,
        CreatedBy,
    }
}

mod m20240301_000006_create_repairs_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_repairs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Repairs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Repairs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Repairs::ItemId).uuid().not_null())
                        .col(ColumnDef::new(Repairs::Provider).string().not_null())
                        .col(ColumnDef::new(Repairs::Status).string().not_null())
                        .col(ColumnDef::new(Repairs::Outcome).string().null())
                        .col(ColumnDef::new(Repairs::Notes).string().null())
                        .col(ColumnDef::new(Repairs::OpenedAt).timestamp().not_null())
                        .col(ColumnDef::new(Repairs::ClosedAt).timestamp().null())
                        .col(ColumnDef::new(Repairs::CreatedBy).uuid().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_repairs_item_id")
                        .table(Repairs::Table)
                        .col(Repairs::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_repairs_status")
                        .table(Repairs::Table)
                        .col(Repairs::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Repairs::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Repairs {
        Table,
        Id,
        ItemId,
        Provider,
        Status,
        Outcome,
        Notes,
        OpenedAt,
        ClosedAt,
        CreatedBy,
    }
}
