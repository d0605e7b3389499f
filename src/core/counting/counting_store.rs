use super::counting_models::GuildCountingRecord;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence port for counting data, one document per guild.
///
/// The service keeps its own cache and only reads from the store at
/// startup, so implementations just need to load everything and save one guild.
#[async_trait]
pub trait CountingStore: Send + Sync {
    async fn load_guilds(&self) -> Result<Vec<GuildCountingRecord>, StoreError>;
    async fn save_guild(&self, record: &GuildCountingRecord) -> Result<(), StoreError>;
}

/// Lets the composition root pick a store at runtime.
#[async_trait]
impl<T: CountingStore + ?Sized> CountingStore for Box<T> {
    async fn load_guilds(&self) -> Result<Vec<GuildCountingRecord>, StoreError> {
        (**self).load_guilds().await
    }

    async fn save_guild(&self, record: &GuildCountingRecord) -> Result<(), StoreError> {
        (**self).save_guild(record).await
    }
}
