//! Durable per-user document storage
//!
//! `DocumentStore` is the backend seam (a JSON file per user, or memory in
//! tests). `StateManager` owns the in-memory copy of the single document,
//! notifies subscribers on every change and offers two write modes:
//! `save_now` for checkpoint-critical writes and `save_soon` for
//! coalesced UI-driven edits.

mod file;
mod manager;
mod memory;

pub use file::FileDocumentStore;
pub use manager::{Connection, StateManager};
pub use memory::MemoryDocumentStore;

use crate::error::StoreError;
use crate::model::Document;
use async_trait::async_trait;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Latest document for `user`, `None` if none was ever written
    async fn load(&self, user: &str) -> Result<Option<Document>, StoreError>;

    /// Durable write; returns once the backend acknowledged it
    async fn save(&self, user: &str, document: &Document) -> Result<(), StoreError>;
}
