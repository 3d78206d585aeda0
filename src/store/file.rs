use super::DocumentStore;
use crate::error::StoreError;
use crate::model::Document;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// One pretty-printed JSON document per user inside a directory
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, user: &str) -> PathBuf {
        let file_stem: String = user
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_stem))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn load(&self, user: &str) -> Result<Option<Document>, StoreError> {
        let path = self.path_for(user);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Read { path, source: e }),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let document: Document = serde_json::from_str(&content)?;
        debug!("Loaded document revision {} from {}", document.revision, path.display());
        Ok(Some(document))
    }

    async fn save(&self, user: &str, document: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(document)?;
        let dir = self.dir.clone();
        let path = self.path_for(user);

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &json))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

/// Write through a synced temp file and rename over the target
fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let write_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
