// In-memory implementation of CountingStore.
//
// Nothing survives a restart. Useful when running the bot without a data
// directory (COUNTING_STORE=memory) and for exercising the service.

use crate::core::counting::{CountingStore, GuildCountingRecord, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;

/// Maps guild_id -> latest saved document.
#[derive(Default)]
pub struct InMemoryCountingStore {
    data: DashMap<u64, GuildCountingRecord>,
}

impl InMemoryCountingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CountingStore for InMemoryCountingStore {
    async fn load_guilds(&self) -> Result<Vec<GuildCountingRecord>, StoreError> {
        Ok(self.data.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn save_guild(&self, record: &GuildCountingRecord) -> Result<(), StoreError> {
        self.data.insert(record.guild_id(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::counting::{ChannelOptions, CountingService, CountingSettings, SubmissionEvent};

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryCountingStore::new();
        assert!(store.load_guilds().await.unwrap().is_empty());

        let mut record = GuildCountingRecord::new(3);
        store.save_guild(&record).await.unwrap();
        record.config.penalty_minutes = 9;
        store.save_guild(&record).await.unwrap();

        let guilds = store.load_guilds().await.unwrap();
        assert_eq!(guilds.len(), 1);
        assert_eq!(guilds[0].config.penalty_minutes, 9);
    }

    #[tokio::test]
    async fn service_runs_on_in_memory_store() {
        let service =
            CountingService::load(InMemoryCountingStore::new(), CountingSettings::default())
                .await
                .unwrap();
        service
            .enable_channel(1, 2, ChannelOptions::default())
            .await
            .unwrap();

        let report = service
            .handle_submission(&SubmissionEvent {
                guild_id: 1,
                channel_id: 2,
                author_id: 3,
                raw_text: "1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(report.leaderboard_count, Some(1));
        assert_eq!(service.pending_writes(), 0);
    }
}
