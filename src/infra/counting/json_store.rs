use crate::core::counting::{CountingStore, GuildCountingRecord, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// JSON-based counting store. All guilds live in a single file as a map:
/// { "guilds": { guild_id: { "config": ..., "leaderboard": ... } } }
#[derive(Debug, Serialize, Deserialize, Default)]
struct JsonStoreData {
    #[serde(default)]
    pub guilds: HashMap<u64, GuildCountingRecord>,
}

pub struct JsonCountingStore {
    path: PathBuf,
    cache: RwLock<JsonStoreData>,
    /// Only one writer touches the file at a time. The guard is owned by the
    /// blocking write, so it is held until the file is renamed even if the
    /// caller stops waiting.
    write_lock: Arc<Mutex<()>>,
}

impl JsonCountingStore {
    /// Open the store, reading the file if it exists. A missing file is an
    /// empty store; an unreadable one is an error so counts are never silently wiped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let file = std::fs::File::open(&path)?;
            serde_json::from_reader(std::io::BufReader::new(file))?
        } else {
            JsonStoreData::default()
        };

        Ok(Self {
            path,
            cache: RwLock::new(data),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let writer = Arc::clone(&self.write_lock).lock_owned().await;
        let bytes = {
            let cache = self.cache.read().await;
            serde_json::to_vec_pretty(&*cache)?
        };

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let _writer = writer;
            write_atomically(&path, &bytes)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("counting write task failed: {e}")))?
    }
}

/// Write next to the target and rename over it so an interrupted write
/// leaves the previous file intact.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[async_trait]
impl CountingStore for JsonCountingStore {
    async fn load_guilds(&self) -> Result<Vec<GuildCountingRecord>, StoreError> {
        let cache = self.cache.read().await;
        Ok(cache.guilds.values().cloned().collect())
    }

    async fn save_guild(&self, record: &GuildCountingRecord) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        cache.guilds.insert(record.guild_id(), record.clone());
        drop(cache); // Release lock before persisting
        self.persist().await
    }
}
