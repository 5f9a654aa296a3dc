//! ==============================================================================
//! storage - the time-series store behind the relay
//! ==============================================================================
//!
//! purpose:
//!     hides where readings are persisted behind one trait, `ReadingStore`.
//!     handlers only ever hold an `Arc<dyn ReadingStore>`.
//!
//! backends:
//!     - influx.rs: InfluxDB v2 through the influxdb2 client (production)
//!     - memory.rs: bounded in-process buffer (no external store, tests)
//!
//! relationships:
//!     - used by: handlers.rs (write on ingest, query_recent on GET /dados)
//!     - built by: main.rs via `from_config`
//!
//! ==============================================================================

pub mod influx;
pub mod memory;

pub use influx::InfluxStore;
pub use memory::MemoryStore;

use crate::config::{RelayConfig, StorageBackend};
use crate::domain::StoredPoint;
use crate::error::StorageError;

use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// append one `leituras,tipo=cor valor=<color>` point, timestamped by the store
    async fn write(&self, color: &str) -> Result<(), StorageError>;

    /// the most recent `limit` color points of the trailing `window_minutes`,
    /// oldest first
    async fn query_recent(
        &self,
        window_minutes: u32,
        limit: usize,
    ) -> Result<Vec<StoredPoint>, StorageError>;

    /// flush and release resources on shutdown
    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// short backend name for status output
    fn backend(&self) -> &'static str;
}

/// Build the configured backend
pub fn from_config(config: &RelayConfig) -> Result<Arc<dyn ReadingStore>, StorageError> {
    match config.storage.backend {
        StorageBackend::Influx => Ok(Arc::new(InfluxStore::new(&config.influx)?)),
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new(config.storage.memory_capacity))),
    }
}
