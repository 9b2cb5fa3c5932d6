//! Ticket persistence
//!
//! The core talks to storage only through [`TicketStore`]. Two
//! implementations exist:
//!
//! - [`MemoryTicketStore`]: always available, used by tests and the
//!   `memory` backend.
//! - `RocksTicketStore`: behind the `persistent-store` feature, one RocksDB
//!   instance with column families for tickets, resolutions and comments.
//!
//! # Usage
//!
//! ```ignore
//! use triage::state::{MemoryTicketStore, TicketPatch, TicketQuery, TicketStore};
//!
//! let store = MemoryTicketStore::new().shared();
//! store.set(&ticket).await?;
//! let active = store.query(&TicketQuery::active()).await?;
//! ```

pub mod memory;
#[cfg(feature = "persistent-store")]
pub mod rocks;
#[cfg(feature = "persistent-store")]
pub mod schema;
pub mod store;

#[cfg(feature = "persistent-store")]
use anyhow::Context;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};

pub use memory::MemoryTicketStore;
#[cfg(feature = "persistent-store")]
pub use rocks::RocksTicketStore;
pub use store::{
    RejectedTicket, SharedTicketStore, StoreError, StoreResult, TicketPatch, TicketQuery,
    TicketScan, TicketStore,
};

/// Open the backend selected by configuration.
pub fn open_store(config: &StoreConfig) -> anyhow::Result<SharedTicketStore> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory ticket store");
            Ok(MemoryTicketStore::new().shared())
        }
        #[cfg(feature = "persistent-store")]
        StoreBackend::Rocksdb => {
            let store = RocksTicketStore::open(&config.path).with_context(|| {
                format!("Failed to open ticket store at {}", config.path.display())
            })?;
            info!(path = %config.path.display(), "Opened RocksDB ticket store");
            Ok(store.shared())
        }
        #[cfg(not(feature = "persistent-store"))]
        StoreBackend::Rocksdb => anyhow::bail!(
            "store backend 'rocksdb' requires building with the persistent-store feature"
        ),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_store() {
        let store = open_store(&StoreConfig::default()).unwrap();
        assert!(store.query(&TicketQuery::all()).await.unwrap().is_empty());
    }

    #[cfg(not(feature = "persistent-store"))]
    #[test]
    fn test_rocksdb_without_feature_is_rejected() {
        let config = StoreConfig {
            backend: StoreBackend::Rocksdb,
            ..StoreConfig::default()
        };
        let err = open_store(&config).err().unwrap();
        assert!(err.to_string().contains("persistent-store"));
    }
}
