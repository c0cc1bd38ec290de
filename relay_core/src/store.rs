//! Uploaded file storage
//!
//! Stored ids take the form `<uniqueToken>-<originalName>`, where the token
//! never contains a hyphen, so the display name is everything after the
//! first `-`.

use crate::error::{RelayError, Result};
use crate::transfer::utils::{
    create_secure_file, display_name, is_plain_file_id, sanitize_file_name,
};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Cursor, ErrorKind};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Receipt for a stored upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUpload {
    pub file_id: String,
    pub name: String,
    pub size: u64,
}

/// Open handle on a stored file
pub struct StoredFile {
    pub id: String,
    /// Size at the time the file was opened
    pub size: u64,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredFile")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Storage for uploaded files, keyed by stored id
pub trait FileStore: Send + Sync + 'static {
    /// Persist `data` under a fresh id derived from `original_name`
    fn save<'a>(
        &'a self,
        original_name: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, Result<StoredUpload>>;

    /// Open a stored file for sequential reading
    fn open<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, Result<StoredFile>>;

    /// Delete a stored file
    fn remove<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Build a stored id from a client supplied file name
pub fn generate_file_id(original_name: &str) -> String {
    // Sanitize again so an over-long name is truncated as a whole
    sanitize_file_name(&format!(
        "{}-{}",
        Uuid::new_v4().simple(),
        sanitize_file_name(original_name)
    ))
}

fn check_file_id(file_id: &str) -> Result<()> {
    if is_plain_file_id(file_id) {
        Ok(())
    } else {
        Err(RelayError::InvalidFileId(file_id.to_string()))
    }
}

fn not_found(file_id: &str, err: std::io::Error) -> RelayError {
    if err.kind() == ErrorKind::NotFound {
        RelayError::FileNotFound(file_id.to_string())
    } else {
        RelayError::Io(err)
    }
}

/// Files kept in a directory on disk
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path_for(&self, file_id: &str) -> Result<PathBuf> {
        check_file_id(file_id)?;
        Ok(self.root.join(file_id))
    }
}

impl FileStore for DiskStore {
    fn save<'a>(
        &'a self,
        original_name: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, Result<StoredUpload>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.root).await?;

            let file_id = generate_file_id(original_name);
            let path = self.path_for(&file_id)?;
            let mut file = create_secure_file(&path).await?;
            file.write_all(&data).await?;
            file.flush().await?;

            tracing::info!("Stored upload {} ({} bytes)", file_id, data.len());
            Ok(StoredUpload {
                name: display_name(&file_id).to_string(),
                size: data.len() as u64,
                file_id,
            })
        })
    }

    fn open<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, Result<StoredFile>> {
        Box::pin(async move {
            let path = self.path_for(file_id)?;
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| not_found(file_id, e))?;
            let metadata = file.metadata().await?;
            if !metadata.is_file() {
                return Err(RelayError::FileNotFound(file_id.to_string()));
            }

            Ok(StoredFile {
                id: file_id.to_string(),
                size: metadata.len(),
                reader: Box::new(file),
            })
        })
    }

    fn remove<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = self.path_for(file_id)?;
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| not_found(file_id, e))
        })
    }
}

/// In-memory store, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a file under an exact id
    pub async fn insert(&self, file_id: impl Into<String>, data: impl Into<Bytes>) {
        self.files.write().await.insert(file_id.into(), data.into());
    }

    pub async fn contains(&self, file_id: &str) -> bool {
        self.files.read().await.contains_key(file_id)
    }
}

impl FileStore for MemoryStore {
    fn save<'a>(
        &'a self,
        original_name: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, Result<StoredUpload>> {
        Box::pin(async move {
            let file_id = generate_file_id(original_name);
            let size = data.len() as u64;
            self.files.write().await.insert(file_id.clone(), data);
            Ok(StoredUpload {
                name: display_name(&file_id).to_string(),
                size,
                file_id,
            })
        })
    }

    fn open<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, Result<StoredFile>> {
        Box::pin(async move {
            let data = self
                .files
                .read()
                .await
                .get(file_id)
                .cloned()
                .ok_or_else(|| RelayError::FileNotFound(file_id.to_string()))?;

            Ok(StoredFile {
                id: file_id.to_string(),
                size: data.len() as u64,
                reader: Box::new(Cursor::new(data)),
            })
        })
    }

    fn remove<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.files
                .write()
                .await
                .remove(file_id)
                .map(|_| ())
                .ok_or_else(|| RelayError::FileNotFound(file_id.to_string()))
        })
    }
}
