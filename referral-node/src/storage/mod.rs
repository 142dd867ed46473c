// Storage module for the referral node
//
// This module provides the referral store capability behind a single async
// trait, with two interchangeable backends:
//
// * `MemoryReferralStore`: process-local maps, cannot fail, nothing survives
//   a restart. Intended for tests and local development.
// * `SqliteReferralStore`: durable SQLite-backed store with an atomic
//   conditional put for the binding write.
//
// The backend is chosen once per process from explicit configuration; there
// is no per-request switching and no ambient environment probing. Stores are
// injected instances with an explicit lifecycle, so tests can build isolated
// stores per case.

use crate::error::Result;
use crate::types::ReferralSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// In-memory referral store implementation
pub mod memory_storage;
/// SQLite-backed durable referral store
pub mod sqlite_storage;

pub use memory_storage::MemoryReferralStore;
pub use sqlite_storage::SqliteReferralStore;

/// Core interface for referral storage backends.
///
/// The store owns both the binding relation (`referred key -> referring
/// code`) and its reverse index (`referring code -> referred keys`). No other
/// component mutates them; services only read and request writes through this
/// contract.
#[async_trait]
pub trait ReferralStore: Send + Sync {
    /// Look up the referral binding for a public key.
    ///
    /// Returns `None` when the key has never been referred.
    async fn get_binding(&self, public_key: &str) -> Result<Option<String>>;

    /// Write `public_key -> ref_code` only if no binding exists yet, and
    /// record the key under the code in the reverse index in the same commit.
    ///
    /// This MUST be atomic at the storage layer: under concurrent claims for
    /// the same key exactly one caller observes `true` and every other caller
    /// observes `false`. An existing binding is never overwritten, and a
    /// `true` return means both the binding and its index entry landed; a
    /// reader can never see one without the other.
    async fn set_binding_if_absent(&self, public_key: &str, ref_code: &str) -> Result<bool>;

    /// Record `public_key` under `ref_code` in the reverse index.
    ///
    /// Idempotent: inserting an already-present key is a no-op, not an error.
    /// The binding write maintains the index itself; this exists for index
    /// reconstruction.
    async fn add_to_reverse_index(&self, ref_code: &str, public_key: &str) -> Result<()>;

    /// Enumerate all bindings and per-code referred counts.
    async fn list_all(&self) -> Result<ReferralSnapshot>;

    /// Diagnostic label for this backend, reported in claim receipts.
    fn backend_name(&self) -> &'static str;
}

/// Storage backend selection, chosen once by the caller at construction time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "backend")]
pub enum StorageBackend {
    /// Durable SQLite-backed store
    Sqlite {
        /// Path to the SQLite database file
        database_path: String,
    },
    /// Ephemeral in-memory store
    Memory,
}

/// Factory for creating referral store implementations.
///
/// Handles backend selection and initialization so the rest of the node only
/// ever sees an `Arc<dyn ReferralStore>`.
pub struct StorageFactory;

impl StorageFactory {
    /// Build a store for the configured backend.
    ///
    /// The SQLite variant initializes its schema eagerly so that a broken
    /// database path fails at startup rather than on the first claim.
    pub fn create(backend: &StorageBackend) -> Result<Arc<dyn ReferralStore>> {
        match backend {
            StorageBackend::Sqlite { database_path } => {
                let storage = SqliteReferralStore::new(database_path)?;
                Ok(Arc::new(storage))
            }
            StorageBackend::Memory => Ok(Arc::new(MemoryReferralStore::new())),
        }
    }
}
