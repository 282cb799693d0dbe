//! AssetTrack API Library
//!
//! Transactional inventory core for IT asset tracking: the serialized-item
//! lifecycle, assignment and repair orchestration, the bulk stock ledger
//! with its idempotency guard, and the low-stock alerting projection. An
//! external API layer consumes this crate through [`AppState`] /
//! [`services::AppServices`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod idempotency;
pub mod logging;
pub mod migrator;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;

use crate::errors::ServiceError;
use crate::idempotency::{IdempotencyStore, InMemoryIdempotencyStore, RedisIdempotencyStore};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: services::AppServices,
}

impl AppState {
    /// Connects the pool, optionally migrates, builds the configured
    /// idempotency store and wires every service. The returned receiver
    /// feeds [`events::process_events`]; the caller decides where that task
    /// runs.
    pub async fn initialize(
        config: config::AppConfig,
    ) -> Result<(Self, mpsc::Receiver<events::Event>), ServiceError> {
        let pool = db::establish_connection_from_app_config(&config).await?;

        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }

        let db = Arc::new(pool);
        let (event_sender, event_rx) = events::channel();
        let idempotency = build_idempotency_store(&config)?;
        let services = services::AppServices::new(db.clone(), event_sender.clone(), idempotency);

        Ok((
            Self {
                db,
                config,
                event_sender,
                services,
            },
            event_rx,
        ))
    }
}

fn build_idempotency_store(
    config: &config::AppConfig,
) -> Result<Arc<dyn IdempotencyStore>, ServiceError> {
    let ttl = Duration::from_secs(config.idempotency_ttl_secs);

    match config.idempotency_backend.as_str() {
        "redis" => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                ServiceError::InternalError(
                    "redis idempotency backend configured without redis_url".into(),
                )
            })?;
            let client = redis::Client::open(url)
                .map_err(|e| ServiceError::CacheError(format!("invalid redis url: {}", e)))?;
            Ok(Arc::new(RedisIdempotencyStore::new(
                client,
                ttl,
                config.idempotency_namespace.clone(),
            )))
        }
        _ => Ok(Arc::new(InMemoryIdempotencyStore::new(ttl))),
    }
}

pub mod prelude {
    pub use crate::config::*;
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::idempotency::*;
    pub use crate::services::*;
    pub use crate::AppState;
}
