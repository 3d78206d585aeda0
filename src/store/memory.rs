use super::DocumentStore;
use crate::error::StoreError;
use crate::model::Document;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-process store that keeps every acknowledged write
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Document>>,
    writes: Mutex<Vec<Document>>,
    failing: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(user: &str, document: Document) -> Self {
        let store = Self::default();
        if let Ok(mut documents) = store.documents.lock() {
            documents.insert(user.to_string(), document);
        }
        store
    }

    /// Latest durable copy for `user`
    pub fn stored(&self, user: &str) -> Option<Document> {
        self.documents
            .lock()
            .ok()
            .and_then(|documents| documents.get(user).cloned())
    }

    /// Every acknowledged write, oldest first
    pub fn writes(&self) -> Vec<Document> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or_default()
    }

    /// Make subsequent saves fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn load(&self, user: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.stored(user))
    }

    async fn save(&self, user: &str, document: &Document) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        let mut documents = self
            .documents
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        documents.insert(user.to_string(), document.clone());
        self.writes
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .push(document.clone());
        Ok(())
    }
}
