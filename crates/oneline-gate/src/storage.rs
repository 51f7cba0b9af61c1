//! Local key/value storage for client state.
//!
//! Modelled on browser local storage: string keys, string values, no schema.
//! [`FileStorage`] keeps every key in one JSON object on disk;
//! [`MemoryStorage`] keeps them in a map for tests and throwaway sessions.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("no local data directory found")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, StorageError>;

pub trait LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, key: &str, value: &str) -> Self {
        self.items.insert(key.to_string(), value.to_string());
        self
    }

    /// Number of `set_item`/`remove_item` calls seen so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.writes += 1;
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.writes += 1;
        self.items.remove(key);
        Ok(())
    }
}

/// All keys in a single JSON object file, rewritten atomically on change.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_local_dir>/oneline/storage.json`.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir().ok_or(StorageError::NoDataDir)?;
        Ok(data_dir.join("oneline").join("storage.json"))
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Like `read_all`, but a corrupt file is replaced rather than blocking writes.
    fn read_for_update(&self) -> Result<BTreeMap<String, String>> {
        match self.read_all() {
            Err(StorageError::Corrupt(e)) => {
                warn!(path = %self.path.display(), error = %e, "discarding corrupt storage file");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_vec_pretty(items)?;
        write_replacing(&self.path, &content)?;
        Ok(())
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let mut items = self.read_for_update()?;
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items)
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        let mut items = self.read_for_update()?;
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`.
///
/// The file holds user API keys, so it is created owner-only on unix.
fn write_replacing(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "storage".to_string());
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    {
        let mut opts = OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    #[cfg(unix)]
    {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
