use assettrack_api::{
    config::AppConfig,
    entities::{branch, category, employee, sector},
    events,
    AppState,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::TempDir;
use uuid::Uuid;

/// Helper harness that stands up the full engine over a throwaway SQLite
/// database. One connection per app so every operation sees the same file
/// and transactions serialize the way a single Postgres row lock would.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = db_dir.path().join("assettrack_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let (state, event_rx) = AppState::initialize(cfg)
            .await
            .expect("failed to initialize test app");

        let event_task = tokio::spawn(events::process_events(event_rx));

        Self {
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Acting user for operations that record one.
    pub fn operator(&self) -> Uuid {
        Uuid::new_v4()
    }

    pub async fn seed_category(
        &self,
        requires_encryption_password: bool,
        requires_service_account: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        category::ActiveModel {
            id: Set(id),
            name: Set(format!("category-{}", id)),
            requires_encryption_password: Set(requires_encryption_password),
            requires_service_account: Set(requires_service_account),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed category");
        id
    }

    pub async fn seed_branch(&self) -> Uuid {
        let id = Uuid::new_v4();
        branch::ActiveModel {
            id: Set(id),
            name: Set(format!("branch-{}", id)),
            city: Set(Some("Springfield".to_string())),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed branch");
        id
    }

    pub async fn seed_sector(&self) -> Uuid {
        let branch_id = self.seed_branch().await;
        let id = Uuid::new_v4();
        sector::ActiveModel {
            id: Set(id),
            name: Set(format!("sector-{}", id)),
            branch_id: Set(Some(branch_id)),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed sector");
        id
    }

    pub async fn seed_employee(&self) -> Uuid {
        let id = Uuid::new_v4();
        employee::ActiveModel {
            id: Set(id),
            name: Set("Alice Smith".to_string()),
            email: Set(format!("alice-{}@example.com", id)),
            sector_id: Set(None),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed employee");
        id
    }

    /// A bulk product under a category with no conditional fields.
    pub async fn seed_bulk_product(&self, minimum_stock: i32) -> Uuid {
        let category_id = self.seed_category(false, false).await;
        self.state
            .services
            .products
            .create_product(assettrack_api::services::products::CreateProductCommand {
                brand: "GenericCo".to_string(),
                model: "USB-C Cable".to_string(),
                category_id,
                minimum_stock,
                serial_tracked: false,
            })
            .await
            .expect("failed to seed bulk product")
    }

    /// A serial-tracked product; conditional fields follow the category flags.
    pub async fn seed_serial_product(
        &self,
        requires_encryption_password: bool,
        requires_service_account: bool,
    ) -> Uuid {
        let category_id = self
            .seed_category(requires_encryption_password, requires_service_account)
            .await;
        self.state
            .services
            .products
            .create_product(assettrack_api::services::products::CreateProductCommand {
                brand: "Lenovo".to_string(),
                model: "ThinkPad T14".to_string(),
                category_id,
                minimum_stock: 0,
                serial_tracked: true,
            })
            .await
            .expect("failed to seed serial product")
    }

    /// Registers one unit and returns its id.
    pub async fn seed_item(&self, product_id: Uuid, serial: &str) -> Uuid {
        self.state
            .services
            .items
            .register_item(assettrack_api::services::inventory_items::RegisterItemCommand {
                product_id,
                serial_number: serial.to_string(),
                created_by: self.operator(),
            })
            .await
            .expect("failed to register item")
    }

    /// Seeds stock through the ledger itself.
    pub async fn seed_stock(&self, product_id: Uuid, quantity: i32) -> i32 {
        self.state
            .services
            .stock
            .record_entry(assettrack_api::services::stock::EntryCommand {
                product_id,
                quantity,
                reason: "initial load".to_string(),
                notes: None,
                created_by: self.operator(),
            })
            .await
            .expect("failed to seed stock")
    }
}
