use super::DocumentStore;
use crate::error::StoreError;
use crate::model::Document;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How the document was found when connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// A document already existed and was loaded
    Existing,
    /// No document existed; an empty one was created and saved
    Created,
}

enum SaveRequest {
    Soon,
    Flush(oneshot::Sender<Result<(), String>>),
}

/// Serialized durable writes of the latest document snapshot
#[derive(Clone)]
struct Writer {
    user: String,
    store: Arc<dyn DocumentStore>,
    latest: watch::Receiver<Document>,
    lock: Arc<Mutex<()>>,
}

impl Writer {
    async fn write(&self) -> Result<(), StoreError> {
        // Snapshot under the lock so an older copy never lands after a newer one
        let _guard = self.lock.lock().await;
        let snapshot = self.latest.borrow().clone();
        self.store.save(&self.user, &snapshot).await?;
        debug!("Saved document revision {}", snapshot.revision);
        Ok(())
    }
}

/// Owner of the single in-memory document of one user
#[derive(Clone)]
pub struct StateManager {
    state: Arc<watch::Sender<Document>>,
    writer: Writer,
    saver: mpsc::UnboundedSender<SaveRequest>,
}

impl StateManager {
    /// Load the user's document, creating and saving an empty one if absent
    pub async fn connect(
        store: Arc<dyn DocumentStore>,
        user: &str,
        debounce: Duration,
    ) -> Result<(Self, Connection), StoreError> {
        let (document, connection) = match store.load(user).await? {
            Some(document) => (document, Connection::Existing),
            None => (Document::default(), Connection::Created),
        };

        let (state, latest) = watch::channel(document);
        let writer = Writer {
            user: user.to_string(),
            store,
            latest,
            lock: Arc::new(Mutex::new(())),
        };

        let (saver, requests) = mpsc::unbounded_channel();
        tokio::spawn(debounce_loop(requests, writer.clone(), debounce));

        let manager = Self {
            state: Arc::new(state),
            writer,
            saver,
        };

        if connection == Connection::Created {
            info!("No document for '{}', creating one", user);
            manager.save_now().await?;
        }

        Ok((manager, connection))
    }

    pub fn user(&self) -> &str {
        &self.writer.user
    }

    /// Copy of the current document
    pub fn get(&self) -> Document {
        self.state.borrow().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Mutate the in-memory document and notify subscribers; nothing is persisted
    pub fn set<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let mut result = None;
        self.state.send_modify(|document| {
            result = Some(f(document));
            document.touch();
        });
        // send_modify runs the closure exactly once
        result.unwrap_or_else(|| unreachable!())
    }

    /// Replace the whole document, e.g. with a copy changed elsewhere
    pub fn replace(&self, document: Document) {
        self.state.send_replace(document);
    }

    pub fn subscribe(&self) -> watch::Receiver<Document> {
        self.state.subscribe()
    }

    /// Durable write of the current document, bypassing the debounce
    pub async fn save_now(&self) -> Result<(), StoreError> {
        self.writer.write().await
    }

    /// Schedule a coalesced background write
    pub fn save_soon(&self) {
        if self.saver.send(SaveRequest::Soon).is_err() {
            warn!("Background writer stopped; change kept in memory only");
        }
    }

    /// `set` followed by a durable write
    pub async fn commit_now<R>(
        &self,
        f: impl FnOnce(&mut Document) -> R,
    ) -> Result<R, StoreError> {
        let result = self.set(f);
        self.save_now().await?;
        Ok(result)
    }

    /// `set` followed by a debounced write
    pub fn commit_soon<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = self.set(f);
        self.save_soon();
        result
    }

    /// Wait until any pending background write has landed
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.saver
            .send(SaveRequest::Flush(tx))
            .map_err(|_| StoreError::WriterClosed)?;
        rx.await
            .map_err(|_| StoreError::WriterClosed)?
            .map_err(StoreError::Unavailable)
    }
}

/// Trailing-edge debounce: each `Soon` restarts the timer, a `Flush` writes at once
async fn debounce_loop(
    mut requests: mpsc::UnboundedReceiver<SaveRequest>,
    writer: Writer,
    delay: Duration,
) {
    while let Some(request) = requests.recv().await {
        let mut waiters = Vec::new();
        let mut coalesced = 0usize;

        match request {
            SaveRequest::Flush(tx) => waiters.push(tx),
            SaveRequest::Soon => loop {
                tokio::select! {
                    _ = sleep(delay) => break,
                    next = requests.recv() => match next {
                        Some(SaveRequest::Soon) => coalesced += 1,
                        Some(SaveRequest::Flush(tx)) => {
                            waiters.push(tx);
                            break;
                        }
                        None => break,
                    },
                }
            },
        }

        if coalesced > 0 {
            debug!("Coalesced {} background saves", coalesced + 1);
        }

        let result = writer.write().await;
        if let Err(ref e) = result {
            warn!("Background save failed: {}", e);
        }
        for tx in waiters {
            let _ = tx.send(result.as_ref().map(|_| ()).map_err(|e| e.to_string()));
        }
    }
}
