//! Single-file durable engine for quilldb

use super::engine::{CollectionInfo, CommitBatch, DocumentKey, StoreEngine, StoredDocument};
use super::memory::EngineState;
use crate::core::{DbError, Result, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

const STORE_FORMAT_VERSION: u16 = 1;

// ============================================================================
// Store File Layout
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    format_version: u16,
    schema_version: Option<SchemaVersion>,
    documents: Vec<StoredDocument>,
}

impl StoreFile {
    fn from_state(state: &EngineState) -> Self {
        Self {
            format_version: STORE_FORMAT_VERSION,
            schema_version: state.schema_version,
            documents: state.documents.values().cloned().collect(),
        }
    }

    fn into_state(self) -> EngineState {
        EngineState {
            schema_version: self.schema_version,
            documents: self
                .documents
                .into_iter()
                .map(|doc| (doc.key(), doc))
                .collect(),
        }
    }
}

// ============================================================================
// File Engine
// ============================================================================

/// Keeps the whole store in memory and rewrites one MessagePack file per commit.
///
/// The file is replaced atomically (temp file + rename), so a crash leaves either
/// the previous commit or the new one on disk.
#[derive(Debug)]
pub struct FileEngine {
    path: PathBuf,
    state: EngineState,
}

impl FileEngine {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                DbError::IoError(format!(
                    "Failed to create store directory '{}': {}",
                    parent.display(),
                    err
                ))
            })?;
        }

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => EngineState::default(),
            Ok(bytes) => {
                let file: StoreFile = rmp_serde::from_slice(&bytes).map_err(|err| {
                    DbError::Persistence(format!(
                        "Failed to decode store file '{}': {}",
                        path.display(),
                        err
                    ))
                })?;
                if file.format_version != STORE_FORMAT_VERSION {
                    return Err(DbError::Persistence(format!(
                        "Unsupported store file format {} in '{}'",
                        file.format_version,
                        path.display()
                    )));
                }
                file.into_state()
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => EngineState::default(),
            Err(err) => {
                return Err(DbError::IoError(format!(
                    "Failed to read store file '{}': {}",
                    path.display(),
                    err
                )));
            }
        };

        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, state: &EngineState) -> Result<()> {
        let bytes = rmp_serde::to_vec_named(&StoreFile::from_state(state))
            .map_err(|e| DbError::Persistence(format!("Failed to serialize store: {}", e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| DbError::IoError(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(&bytes)
            .map_err(|e| DbError::IoError(format!("Failed to write store: {}", e)))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| DbError::IoError(format!("Failed to sync store: {}", e)))?;
        temp.persist(&self.path).map_err(|e| {
            DbError::IoError(format!(
                "Failed to replace store file '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

impl StoreEngine for FileEngine {
    fn schema_version(&self) -> Result<Option<SchemaVersion>> {
        Ok(self.state.schema_version)
    }

    fn get(&self, key: &DocumentKey) -> Result<Option<StoredDocument>> {
        Ok(self.state.get(key))
    }

    fn scan(&self, collection: &str, schema_version: SchemaVersion) -> Result<Vec<StoredDocument>> {
        Ok(self.state.scan(collection, schema_version))
    }

    fn collections(&self) -> Result<Vec<CollectionInfo>> {
        Ok(self.state.collections())
    }

    fn commit(&mut self, batch: CommitBatch) -> Result<()> {
        let mut next = self.state.clone();
        next.apply(batch);
        self.write(&next)?;
        self.state = next;
        Ok(())
    }
}
