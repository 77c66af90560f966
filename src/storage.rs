use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// StoredFile
///
/// What the store hands back after a successful write: the generated name the
/// bytes live under, and their checksum.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_name: String,
    pub checksum: String,
}

// 1. AttachmentStore Contract
/// AttachmentStore
///
/// Abstract contract for the raw-bytes side of attachments. Swappable between
/// the real directory-backed store (`FsAttachmentStore`) and the in-memory
/// `MockAttachmentStore` used in tests.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Writes `bytes` under a freshly generated file name. `original_name`
    /// only contributes its extension.
    async fn store(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<StoredFile>;

    /// Reads the full contents of a previously stored file.
    async fn read(&self, file_name: &str) -> std::io::Result<Vec<u8>>;

    /// Removes a stored file.
    async fn remove(&self, file_name: &str) -> std::io::Result<()>;
}

/// StorageState
///
/// The concrete type used to share the attachment store across the application state.
pub type StorageState = Arc<dyn AttachmentStore>;

/// Hex-encoded SHA-256 of `bytes`.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// generate_file_name
///
/// Server-assigned name: a UUID plus the (sanitized) extension of the
/// client-declared name, e.g. `3f2a....pdf`.
pub fn generate_file_name(original_name: &str) -> String {
    let extension = Path::new(&sanitize_name(original_name))
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

/// sanitize_name
///
/// Strips directory navigation from a client-supplied name, keeping only the
/// final path segment.
fn sanitize_name(name: &str) -> String {
    name.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Rejects stored names that could escape the storage directory.
fn ensure_plain_name(file_name: &str) -> std::io::Result<()> {
    if file_name.is_empty()
        || file_name.contains(['/', '\\'])
        || file_name == "."
        || file_name == ".."
    {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("invalid stored file name: {file_name:?}"),
        ));
    }
    Ok(())
}

// 2. The Real Implementation (directory on disk)
/// FsAttachmentStore
///
/// Keeps every attachment as a flat file directly under `root`.
#[derive(Clone, Debug)]
pub struct FsAttachmentStore {
    root: PathBuf,
}

impl FsAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the storage directory if it does not exist yet.
    pub async fn ensure_root_exists(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    fn path_for(&self, file_name: &str) -> std::io::Result<PathBuf> {
        ensure_plain_name(file_name)?;
        Ok(self.root.join(file_name))
    }
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<StoredFile> {
        let file_name = generate_file_name(original_name);
        let path = self.path_for(&file_name)?;

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "attachment written");

        Ok(StoredFile {
            file_name,
            checksum: checksum(bytes),
        })
    }

    async fn read(&self, file_name: &str) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path_for(file_name)?).await
    }

    async fn remove(&self, file_name: &str) -> std::io::Result<()> {
        tokio::fs::remove_file(self.path_for(file_name)?).await
    }
}

// 3. The Mock Implementation (For Tests)
/// MockAttachmentStore
///
/// In-memory `AttachmentStore` for service and handler tests, so the
/// attachment flow can be exercised without touching the filesystem.
#[derive(Default)]
pub struct MockAttachmentStore {
    /// When true, writes fail with a simulated I/O error.
    pub should_fail: bool,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Seeds a file directly, bypassing name generation.
    pub fn insert(&self, file_name: &str, bytes: &[u8]) {
        self.lock().insert(file_name.to_string(), bytes.to_vec());
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.lock().contains_key(file_name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned map is still a usable map for test purposes.
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AttachmentStore for MockAttachmentStore {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<StoredFile> {
        if self.should_fail {
            return Err(Error::other("Mock Storage Error: Simulation requested"));
        }
        let file_name = generate_file_name(original_name);
        self.insert(&file_name, bytes);
        Ok(StoredFile {
            file_name,
            checksum: checksum(bytes),
        })
    }

    async fn read(&self, file_name: &str) -> std::io::Result<Vec<u8>> {
        self.lock()
            .get(file_name)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{file_name} not found")))
    }

    async fn remove(&self, file_name: &str) -> std::io::Result<()> {
        self.lock()
            .remove(file_name)
            .map(|_| ())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{file_name} not found")))
    }
}
