//! Durable key-value state backend
//!
//! Session snapshots and tenant profiles are persisted through the
//! [`StateStore`] trait so the rest of the subsystem stays agnostic of the
//! backend. Two implementations are provided:
//! - [`FileStateStore`]: in-memory map with periodic persistence to a JSON
//!   file, written atomically (temp file + rename)
//! - [`MemoryStateStore`]: no durability, for tests and ephemeral embedding

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value backend for snapshots and profiles
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Get a value
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store a value, overwriting any existing one
    async fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a value; absent keys are a no-op
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// List keys matching a prefix
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Flush state to durable storage
    async fn persist(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Write `data` to `path` via a temp file and atomic rename
///
/// The temp file is removed if anything fails before the rename.
fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp_path = PathBuf::from(temp);

    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// In-memory state store with periodic persistence to a JSON file
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    persist_interval: Duration,
}

impl FileStateStore {
    /// Open a file state store, loading existing state if present
    pub async fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = Arc::new(RwLock::new(HashMap::new()));

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let loaded: HashMap<String, Vec<u8>> = serde_json::from_str(&content)
                .map_err(|e| StorageError::Serialization(format!("Failed to load state: {}", e)))?;
            *state.write().await = loaded;
        }

        Ok(Self {
            path,
            state,
            persist_interval: Duration::from_secs(60),
        })
    }

    /// Open with a custom persist interval
    pub async fn with_persist_interval<P: AsRef<Path>>(
        path: P,
        persist_interval: Duration,
    ) -> StorageResult<Self> {
        let mut store = Self::open(path).await?;
        store.persist_interval = persist_interval;
        Ok(store)
    }

    /// Start the background persistence task
    pub fn start_auto_persist(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self);
        let interval_duration = self.persist_interval;

        tokio::spawn(async move {
            let mut ticker = interval(interval_duration);
            ticker.tick().await; // first tick is immediate
            loop {
                ticker.tick().await;
                if let Err(e) = store.persist().await {
                    tracing::error!("Failed to persist state: {}", e);
                }
            }
        })
    }
}

#[async_trait::async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let state = self.state.read().await;
        Ok(state.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let state = self.state.read().await;
        Ok(state.contains_key(key))
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn persist(&self) -> StorageResult<()> {
        let serialized = {
            let state = self.state.read().await;
            serde_json::to_vec_pretty(&*state).map_err(|e| {
                StorageError::Serialization(format!("Failed to serialize state: {}", e))
            })?
        };

        write_atomic(&self.path, &serialized)
    }
}

/// State store with no durability
#[derive(Default)]
pub struct MemoryStateStore {
    state: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.state.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.state.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.state.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.state.read().await.contains_key(key))
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .state
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
