// Owned binary resources served to the UI.
//
// Every resource handed out by the registry is owned by exactly one handle;
// dropping the handle revokes the resource.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempPath;

#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Arc<[u8]>,
    pub mime: String,
}

#[derive(Debug, Default)]
struct RegistryInner {
    blobs: Mutex<HashMap<u64, Blob>>,
    next_id: AtomicU64,
}

/// Shared store of displayable resources, addressed as `/blob/{id}`.
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    inner: Arc<RegistryInner>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, bytes: impl Into<Arc<[u8]>>, mime: &str) -> BlobHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let blob = Blob {
            bytes: bytes.into(),
            mime: mime.to_string(),
        };
        self.inner
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, blob);
        tracing::debug!("Created blob {} ({})", id, mime);
        BlobHandle {
            id,
            registry: self.clone(),
        }
    }

    pub fn get(&self, id: u64) -> Option<Blob> {
        self.inner
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn revoke(&self, id: u64) {
        let removed = self
            .inner
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            tracing::debug!("Released blob {}", id);
        }
    }
}

/// Owning handle for a registry resource. Not `Clone`: one owner, one release.
#[derive(Debug)]
pub struct BlobHandle {
    id: u64,
    registry: BlobRegistry,
}

impl BlobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> String {
        format!("/blob/{}", self.id)
    }
}

impl Drop for BlobHandle {
    fn drop(&mut self) {
        self.registry.revoke(self.id);
    }
}

/// A user-uploaded video kept in a temporary file until superseded.
#[derive(Debug)]
pub struct UploadedVideo {
    path: TempPath,
}

impl UploadedVideo {
    /// Create an empty temporary file carrying the original extension. The
    /// file is removed when the returned value is dropped, even if the
    /// caller never finishes writing it.
    pub fn create(file_name: &str) -> std::io::Result<(File, Self)> {
        let suffix = Path::new(file_name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let (file, path) = tempfile::Builder::new()
            .prefix("tray-review-")
            .suffix(&suffix)
            .tempfile()?
            .into_parts();
        Ok((file, Self { path }))
    }

    /// Write `bytes` to a fresh temporary file in one go.
    pub fn store(bytes: &[u8], file_name: &str) -> std::io::Result<Self> {
        let (mut file, upload) = Self::create(file_name)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UploadedVideo {
    fn drop(&mut self) {
        tracing::debug!("Releasing uploaded video {:?}", self.path.to_path_buf());
    }
}
