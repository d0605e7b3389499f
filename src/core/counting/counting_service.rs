// Counting session controller - the only thing that mutates counting state.
//
// Submissions and admin actions for one channel run one at a time behind a
// per-channel lock, and the guild document is written before the lock is
// released. That way the next submission always validates against a state
// that has already been persisted (or queued for retry).
//
// NO Discord dependencies here - the Discord layer turns the returned
// reports into reactions, messages and timeouts.

use super::counting_models::{
    ChannelCounterState, ChannelOptions, CustomEmoji, EmojiSlot, GuildCountingConfig,
    GuildCountingRecord, LeaderboardEntry, Outcome, SubmissionEvent, SubmissionReport,
    MAX_PENALTY_MINUTES,
};
use super::counting_store::{CountingStore, StoreError};
use super::milestones::{check_milestone, check_special_number};
use super::sequence_validator::validate;
use super::violations::{apply_rejection, violation_notice};
use dashmap::{DashMap, DashSet};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Upper bound for leaderboard pages.
pub const MAX_LEADERBOARD_LIMIT: usize = 50;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum CountingError {
    #[error("Counting is not enabled in that channel")]
    ChannelNotConfigured,

    #[error("Invalid guild or channel ID")]
    InvalidId,

    #[error("A penalty of {0} minutes is longer than Discord allows (28 days)")]
    PenaltyTooLong(u64),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
pub struct CountingSettings {
    /// How long a single store write may take before it is queued for retry.
    pub persist_timeout: Duration,
}

impl Default for CountingSettings {
    fn default() -> Self {
        Self {
            persist_timeout: Duration::from_secs(2),
        }
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct CountingService<S: CountingStore> {
    store: S,
    settings: CountingSettings,
    /// Authoritative in-memory copy of every guild document.
    guilds: DashMap<u64, GuildCountingRecord>,
    /// (guild_id, channel_id) -> lock serializing that channel.
    channel_locks: DashMap<(u64, u64), Arc<Mutex<()>>>,
    /// guild_id -> lock serializing writes of that guild's document.
    write_locks: DashMap<u64, Arc<Mutex<()>>>,
    /// Guilds whose latest state has not reached the store yet.
    pending_writes: DashSet<u64>,
}

impl<S: CountingStore> CountingService<S> {
    /// Build the service and prime the cache from the store.
    pub async fn load(store: S, settings: CountingSettings) -> Result<Self, CountingError> {
        let guilds = DashMap::new();
        for record in store.load_guilds().await? {
            guilds.insert(record.guild_id(), record);
        }

        tracing::info!(guilds = guilds.len(), "Loaded counting state");

        Ok(Self {
            store,
            settings,
            guilds,
            channel_locks: DashMap::new(),
            write_locks: DashMap::new(),
            pending_writes: DashSet::new(),
        })
    }

    fn validate_ids(guild_id: u64, channel_id: u64) -> Result<(), CountingError> {
        if guild_id == 0 || channel_id == 0 {
            Err(CountingError::InvalidId)
        } else {
            Ok(())
        }
    }

    fn channel_lock(&self, guild_id: u64, channel_id: u64) -> Arc<Mutex<()>> {
        Arc::clone(&self.channel_locks.entry((guild_id, channel_id)).or_default())
    }

    fn is_monitored(&self, guild_id: u64, channel_id: u64) -> bool {
        self.guilds
            .get(&guild_id)
            .is_some_and(|record| record.config.channels.contains_key(&channel_id))
    }

    /// Validate a message from a counting channel and apply the outcome.
    ///
    /// Returns `None` when the channel is not a counting channel. Every
    /// state change is persisted (or queued for retry) before this returns.
    pub async fn handle_submission(
        &self,
        submission: &SubmissionEvent,
    ) -> Option<SubmissionReport> {
        let (guild_id, channel_id) = (submission.guild_id, submission.channel_id);
        if !self.is_monitored(guild_id, channel_id) {
            return None;
        }

        let lock = self.channel_lock(guild_id, channel_id);
        let _serial = lock.lock().await;

        let (report, changed) = {
            let mut entry = self.guilds.get_mut(&guild_id)?;
            let record = &mut *entry;
            // The channel may have been disabled while we waited for the lock.
            let before = record.config.channels.get(&channel_id)?.clone();

            match validate(&before, submission) {
                Outcome::Ignored => (
                    SubmissionReport {
                        outcome: Outcome::Ignored,
                        state: before,
                        violation: None,
                        milestone: None,
                        special: None,
                        leaderboard_count: None,
                    },
                    false,
                ),
                Outcome::Accepted { value } => {
                    let channel = record.config.channels.get_mut(&channel_id)?;
                    channel.last_accepted_value = value;
                    channel.last_acceptor_id = Some(submission.author_id);
                    let milestone = check_milestone(value, &channel.milestones);
                    let state = channel.clone();

                    let special = check_special_number(value, &record.config.special_numbers);
                    let count = record.leaderboard.record_acceptance(submission.author_id);

                    (
                        SubmissionReport {
                            outcome: Outcome::Accepted { value },
                            state,
                            violation: None,
                            milestone,
                            special,
                            leaderboard_count: Some(count),
                        },
                        true,
                    )
                }
                Outcome::Rejected(reason) => {
                    let after = apply_rejection(&before, reason);
                    let notice = violation_notice(&record.config, &before, submission, reason);
                    let changed = after != before;
                    record.config.channels.insert(channel_id, after.clone());

                    (
                        SubmissionReport {
                            outcome: Outcome::Rejected(reason),
                            state: after,
                            violation: Some(notice),
                            milestone: None,
                            special: None,
                            leaderboard_count: None,
                        },
                        changed,
                    )
                }
            }
        };

        if changed {
            self.persist_guild(guild_id).await;
        }

        if let Some(notice) = &report.violation {
            tracing::info!(
                guild_id,
                channel_id,
                user_id = notice.user_id,
                reason = %notice.reason,
                count_reset = notice.count_reset,
                "Counting violation"
            );
        }
        if let Some(milestone) = &report.milestone {
            tracing::info!(
                guild_id,
                channel_id,
                value = milestone.value,
                "Counting milestone reached"
            );
        }

        Some(report)
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Write the latest cached document for a guild. On failure the guild is
    /// queued for `flush_pending`; the in-memory state stays as it is.
    async fn persist_guild(&self, guild_id: u64) -> bool {
        let lock = Arc::clone(&self.write_locks.entry(guild_id).or_default());
        let _guard = lock.lock().await;

        // Snapshot under the write lock so a later write always carries every earlier change.
        let Some(record) = self.guilds.get(&guild_id).map(|r| r.value().clone()) else {
            return true;
        };

        match tokio::time::timeout(self.settings.persist_timeout, self.store.save_guild(&record))
            .await
        {
            Ok(Ok(())) => {
                self.pending_writes.remove(&guild_id);
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    guild_id,
                    error = %e,
                    "Failed to persist counting state, will retry"
                );
                self.pending_writes.insert(guild_id);
                false
            }
            Err(_) => {
                tracing::warn!(
                    guild_id,
                    timeout_ms = self.settings.persist_timeout.as_millis() as u64,
                    "Persisting counting state timed out, will retry"
                );
                self.pending_writes.insert(guild_id);
                false
            }
        }
    }

    /// Retry every queued write. Returns how many guilds are still pending.
    pub async fn flush_pending(&self) -> usize {
        let pending: Vec<u64> = self.pending_writes.iter().map(|id| *id.key()).collect();
        for guild_id in pending {
            if self.persist_guild(guild_id).await {
                tracing::info!(guild_id, "Retried counting write succeeded");
            }
        }
        self.pending_writes.len()
    }

    pub fn pending_writes(&self) -> usize {
        self.pending_writes.len()
    }

    // ------------------------------------------------------------------------
    // Admin operations
    // ------------------------------------------------------------------------

    /// Start counting in a channel. Re-enabling an active channel starts it over.
    pub async fn enable_channel(
        &self,
        guild_id: u64,
        channel_id: u64,
        options: ChannelOptions,
    ) -> Result<ChannelCounterState, CountingError> {
        Self::validate_ids(guild_id, channel_id)?;

        let lock = self.channel_lock(guild_id, channel_id);
        let _serial = lock.lock().await;

        let state = {
            let mut record = self
                .guilds
                .entry(guild_id)
                .or_insert_with(|| GuildCountingRecord::new(guild_id));

            let mut state =
                ChannelCounterState::new(options.start, record.config.milestones.clone());
            state.recovery_enabled = options.recovery_enabled;
            state.allow_non_numeric_chat = options.allow_non_numeric_chat;
            state.allow_expressions = options.allow_expressions;
            state.hard_mode = options.hard_mode;

            record.config.channels.insert(channel_id, state.clone());
            state
        };

        self.persist_guild(guild_id).await;
        tracing::info!(guild_id, channel_id, start = options.start, "Counting enabled");
        Ok(state)
    }

    /// Stop counting in a channel. The leaderboard is kept.
    pub async fn disable_channel(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<(), CountingError> {
        Self::validate_ids(guild_id, channel_id)?;

        let lock = self.channel_lock(guild_id, channel_id);
        let _serial = lock.lock().await;

        let removed = self
            .guilds
            .get_mut(&guild_id)
            .and_then(|mut record| record.config.channels.remove(&channel_id));
        if removed.is_none() {
            return Err(CountingError::ChannelNotConfigured);
        }

        self.persist_guild(guild_id).await;
        tracing::info!(guild_id, channel_id, "Counting disabled");
        Ok(())
    }

    /// Force the count to `value` and forget who posted last.
    pub async fn reset_channel(
        &self,
        guild_id: u64,
        channel_id: u64,
        value: u64,
    ) -> Result<ChannelCounterState, CountingError> {
        self.update_channel(guild_id, channel_id, |state| {
            state.last_accepted_value = value;
            state.last_acceptor_id = None;
        })
        .await
    }

    pub async fn set_recovery(
        &self,
        guild_id: u64,
        channel_id: u64,
        enabled: bool,
    ) -> Result<ChannelCounterState, CountingError> {
        self.update_channel(guild_id, channel_id, |state| state.recovery_enabled = enabled)
            .await
    }

    pub async fn set_allow_chat(
        &self,
        guild_id: u64,
        channel_id: u64,
        allowed: bool,
    ) -> Result<ChannelCounterState, CountingError> {
        self.update_channel(guild_id, channel_id, |state| {
            state.allow_non_numeric_chat = allowed
        })
        .await
    }

    pub async fn set_expressions(
        &self,
        guild_id: u64,
        channel_id: u64,
        allowed: bool,
    ) -> Result<ChannelCounterState, CountingError> {
        self.update_channel(guild_id, channel_id, |state| state.allow_expressions = allowed)
            .await
    }

    pub async fn set_hard_mode(
        &self,
        guild_id: u64,
        channel_id: u64,
        hard: bool,
    ) -> Result<ChannelCounterState, CountingError> {
        self.update_channel(guild_id, channel_id, |state| state.hard_mode = hard)
            .await
    }

    /// Replace milestones for one channel, or for the guild default and every
    /// active channel when `channel_id` is `None`.
    pub async fn set_milestones(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
        values: impl IntoIterator<Item = u64>,
    ) -> Result<BTreeSet<u64>, CountingError> {
        let milestones: BTreeSet<u64> = values.into_iter().filter(|v| *v > 0).collect();

        match channel_id {
            Some(channel_id) => {
                let set = milestones.clone();
                self.update_channel(guild_id, channel_id, move |state| state.milestones = set)
                    .await?;
            }
            None => {
                let set = milestones.clone();
                self.update_guild(guild_id, move |config| {
                    for state in config.channels.values_mut() {
                        state.milestones = set.clone();
                    }
                    config.milestones = set;
                })
                .await?;
            }
        }

        Ok(milestones)
    }

    /// Timeout length for offenders; 0 turns the penalty off.
    pub async fn set_penalty_minutes(
        &self,
        guild_id: u64,
        minutes: u64,
    ) -> Result<(), CountingError> {
        if minutes > MAX_PENALTY_MINUTES {
            return Err(CountingError::PenaltyTooLong(minutes));
        }
        self.update_guild(guild_id, |config| config.penalty_minutes = minutes)
            .await
    }

    pub async fn set_emoji(
        &self,
        guild_id: u64,
        slot: EmojiSlot,
        emoji: Option<CustomEmoji>,
    ) -> Result<(), CountingError> {
        self.update_guild(guild_id, move |config| match slot {
            EmojiSlot::Success => config.success_emoji = emoji,
            EmojiSlot::Error => config.error_emoji = emoji,
            EmojiSlot::Milestone => config.milestone_emoji = emoji,
        })
        .await
    }

    /// Mark `value` as a special number, optionally with its own emoji.
    pub async fn set_special_number(
        &self,
        guild_id: u64,
        value: u64,
        emoji: Option<CustomEmoji>,
    ) -> Result<(), CountingError> {
        self.update_guild(guild_id, move |config| {
            config.special_numbers.insert(value, emoji);
        })
        .await
    }

    /// Returns whether the number was special before.
    pub async fn remove_special_number(
        &self,
        guild_id: u64,
        value: u64,
    ) -> Result<bool, CountingError> {
        self.update_guild(guild_id, |config| config.special_numbers.remove(&value).is_some())
            .await
    }

    pub async fn set_log_channel(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
    ) -> Result<(), CountingError> {
        self.update_guild(guild_id, |config| config.log_channel_id = channel_id)
            .await
    }

    async fn update_channel<F>(
        &self,
        guild_id: u64,
        channel_id: u64,
        update: F,
    ) -> Result<ChannelCounterState, CountingError>
    where
        F: FnOnce(&mut ChannelCounterState),
    {
        Self::validate_ids(guild_id, channel_id)?;

        let lock = self.channel_lock(guild_id, channel_id);
        let _serial = lock.lock().await;

        let state = {
            let mut record = self
                .guilds
                .get_mut(&guild_id)
                .ok_or(CountingError::ChannelNotConfigured)?;
            let state = record
                .config
                .channels
                .get_mut(&channel_id)
                .ok_or(CountingError::ChannelNotConfigured)?;
            update(state);
            state.clone()
        };

        self.persist_guild(guild_id).await;
        Ok(state)
    }

    /// Guild-wide settings exist even before the first channel is enabled.
    async fn update_guild<F, T>(&self, guild_id: u64, update: F) -> Result<T, CountingError>
    where
        F: FnOnce(&mut GuildCountingConfig) -> T,
    {
        if guild_id == 0 {
            return Err(CountingError::InvalidId);
        }

        let result = {
            let mut record = self
                .guilds
                .entry(guild_id)
                .or_insert_with(|| GuildCountingRecord::new(guild_id));
            update(&mut record.config)
        };

        self.persist_guild(guild_id).await;
        Ok(result)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn channel_state(&self, guild_id: u64, channel_id: u64) -> Option<ChannelCounterState> {
        self.guilds
            .get(&guild_id)
            .and_then(|record| record.config.channels.get(&channel_id).cloned())
    }

    pub fn guild_config(&self, guild_id: u64) -> Option<GuildCountingConfig> {
        self.guilds.get(&guild_id).map(|record| record.config.clone())
    }

    /// Top counters of a guild; `limit` is clamped to 1..=50.
    pub fn leaderboard(&self, guild_id: u64, limit: usize) -> Vec<LeaderboardEntry> {
        let limit = limit.clamp(1, MAX_LEADERBOARD_LIMIT);
        self.guilds
            .get(&guild_id)
            .map(|record| record.leaderboard.top(limit))
            .unwrap_or_default()
    }

    pub fn user_count(&self, guild_id: u64, user_id: u64) -> u64 {
        self.guilds
            .get(&guild_id)
            .map(|record| record.leaderboard.count(user_id))
            .unwrap_or(0)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::counting::{RejectReason, ViolationNotice};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const GUILD: u64 = 10;
    const CHANNEL: u64 = 20;
    const U1: u64 = 1;
    const U2: u64 = 2;

    /// In-memory store for testing, with switches for failure and slowness.
    #[derive(Default)]
    struct MockCountingStore {
        records: DashMap<u64, GuildCountingRecord>,
        failing: AtomicBool,
        slow: AtomicBool,
    }

    #[async_trait]
    impl CountingStore for MockCountingStore {
        async fn load_guilds(&self) -> Result<Vec<GuildCountingRecord>, StoreError> {
            Ok(self.records.iter().map(|r| r.value().clone()).collect())
        }

        async fn save_guild(&self, record: &GuildCountingRecord) -> Result<(), StoreError> {
            if self.slow.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("disk on fire".to_string()));
            }
            self.records.insert(record.guild_id(), record.clone());
            Ok(())
        }
    }

    impl MockCountingStore {
        fn stored_state(&self, guild_id: u64, channel_id: u64) -> Option<ChannelCounterState> {
            self.records
                .get(&guild_id)
                .and_then(|r| r.config.channels.get(&channel_id).cloned())
        }
    }

    async fn service_with(store: MockCountingStore) -> CountingService<MockCountingStore> {
        CountingService::load(
            store,
            CountingSettings {
                persist_timeout: Duration::from_millis(50),
            },
        )
        .await
        .unwrap()
    }

    async fn counting_service() -> CountingService<MockCountingStore> {
        let service = service_with(MockCountingStore::default()).await;
        service
            .enable_channel(GUILD, CHANNEL, ChannelOptions::default())
            .await
            .unwrap();
        service
    }

    fn submission(author_id: u64, text: &str) -> SubmissionEvent {
        SubmissionEvent {
            guild_id: GUILD,
            channel_id: CHANNEL,
            author_id,
            raw_text: text.to_string(),
        }
    }

    async fn submit(
        service: &CountingService<MockCountingStore>,
        author_id: u64,
        text: &str,
    ) -> SubmissionReport {
        service
            .handle_submission(&submission(author_id, text))
            .await
            .expect("channel should be monitored")
    }

    #[tokio::test]
    async fn accepted_number_advances_count_and_leaderboard() {
        let service = counting_service().await;

        let report = submit(&service, U1, "1").await;

        assert_eq!(report.outcome, Outcome::Accepted { value: 1 });
        assert_eq!(report.state.last_accepted_value, 1);
        assert_eq!(report.state.last_acceptor_id, Some(U1));
        assert_eq!(report.leaderboard_count, Some(1));
        assert_eq!(service.user_count(GUILD, U1), 1);
        assert_eq!(service.store.stored_state(GUILD, CHANNEL), Some(report.state));
    }

    #[tokio::test]
    async fn same_user_twice_resets_to_zero() {
        let service = counting_service().await;
        submit(&service, U1, "1").await;

        let report = submit(&service, U1, "2").await;

        assert_eq!(report.outcome, Outcome::Rejected(RejectReason::SameUserTwice));
        assert_eq!(report.state.last_accepted_value, 0);
        assert_eq!(report.state.last_acceptor_id, None);
        assert_eq!(service.user_count(GUILD, U1), 1);
    }

    #[tokio::test]
    async fn wrong_number_resets_and_is_persisted_before_returning() {
        let service = counting_service().await;
        service.reset_channel(GUILD, CHANNEL, 5).await.unwrap();
        submit(&service, U2, "6").await;

        let report = submit(&service, U1, "8").await;

        assert_eq!(report.outcome, Outcome::Rejected(RejectReason::WrongNumber));
        let notice: &ViolationNotice = report.violation.as_ref().unwrap();
        assert_eq!(notice.expected, 7);
        assert!(notice.count_reset);
        assert_eq!(notice.penalty, Some(Duration::from_secs(60)));
        let stored = service.store.stored_state(GUILD, CHANNEL).unwrap();
        assert_eq!(stored.last_accepted_value, 0);
        assert_eq!(stored.last_acceptor_id, None);
    }

    #[tokio::test]
    async fn milestone_and_special_number_fire_together() {
        let service = counting_service().await;
        service.reset_channel(GUILD, CHANNEL, 99).await.unwrap();

        let report = submit(&service, U1, "100").await;

        assert_eq!(report.outcome, Outcome::Accepted { value: 100 });
        assert_eq!(report.milestone.map(|m| m.value), Some(100));
        assert_eq!(report.special.map(|s| s.value), Some(100));
    }

    #[tokio::test]
    async fn chat_is_ignored_without_touching_state() {
        let service = counting_service().await;
        service.set_allow_chat(GUILD, CHANNEL, true).await.unwrap();
        submit(&service, U2, "1").await;

        let report = submit(&service, U1, "hello").await;

        assert_eq!(report.outcome, Outcome::Ignored);
        assert_eq!(report.state.last_accepted_value, 1);
        assert_eq!(service.user_count(GUILD, U1), 0);
        assert!(report.violation.is_none());
    }

    #[tokio::test]
    async fn recovery_mode_keeps_the_count() {
        let service = counting_service().await;
        service.set_recovery(GUILD, CHANNEL, true).await.unwrap();
        submit(&service, U1, "1").await;

        let report = submit(&service, U2, "5").await;

        assert_eq!(report.outcome, Outcome::Rejected(RejectReason::WrongNumber));
        assert_eq!(report.state.last_accepted_value, 1);
        let notice = report.violation.unwrap();
        assert!(!notice.count_reset);
        assert_eq!(notice.expected, 2);

        let report = submit(&service, U2, "2").await;
        assert_eq!(report.outcome, Outcome::Accepted { value: 2 });
    }

    #[tokio::test]
    async fn unmonitored_channels_are_skipped() {
        let service = counting_service().await;
        let other = SubmissionEvent {
            channel_id: 999,
            ..submission(U1, "1")
        };
        assert!(service.handle_submission(&other).await.is_none());

        service.disable_channel(GUILD, CHANNEL).await.unwrap();
        assert!(service.handle_submission(&submission(U1, "1")).await.is_none());
        assert!(matches!(
            service.disable_channel(GUILD, CHANNEL).await,
            Err(CountingError::ChannelNotConfigured)
        ));
    }

    #[tokio::test]
    async fn enable_uses_start_value_and_guild_milestones() {
        let service = service_with(MockCountingStore::default()).await;
        service
            .set_milestones(GUILD, None, vec![10, 20])
            .await
            .unwrap();

        let state = service
            .enable_channel(
                GUILD,
                CHANNEL,
                ChannelOptions {
                    start: 9,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(state.expected_next(), 10);
        assert_eq!(state.milestones, BTreeSet::from([10, 20]));
        let report = submit(&service, U1, "10").await;
        assert_eq!(report.milestone.map(|m| m.value), Some(10));
    }

    #[tokio::test]
    async fn guild_milestones_propagate_but_channel_ones_stay_local() {
        let service = counting_service().await;
        service
            .enable_channel(GUILD, 21, ChannelOptions::default())
            .await
            .unwrap();

        service.set_milestones(GUILD, None, vec![5]).await.unwrap();
        assert_eq!(
            service.channel_state(GUILD, 21).unwrap().milestones,
            BTreeSet::from([5])
        );

        service
            .set_milestones(GUILD, Some(CHANNEL), vec![7, 0])
            .await
            .unwrap();
        assert_eq!(
            service.channel_state(GUILD, CHANNEL).unwrap().milestones,
            BTreeSet::from([7])
        );
        assert_eq!(
            service.channel_state(GUILD, 21).unwrap().milestones,
            BTreeSet::from([5])
        );
    }

    #[tokio::test]
    async fn penalty_bounds_are_enforced() {
        let service = service_with(MockCountingStore::default()).await;

        service.set_penalty_minutes(GUILD, 0).await.unwrap();
        assert_eq!(service.guild_config(GUILD).unwrap().penalty(), None);

        assert!(matches!(
            service.set_penalty_minutes(GUILD, MAX_PENALTY_MINUTES + 1).await,
            Err(CountingError::PenaltyTooLong(_))
        ));
    }

    #[tokio::test]
    async fn store_failure_keeps_memory_state_and_retries() {
        let service = counting_service().await;
        service.store.failing.store(true, Ordering::SeqCst);

        let report = submit(&service, U1, "1").await;
        assert_eq!(report.outcome, Outcome::Accepted { value: 1 });
        assert_eq!(service.pending_writes(), 1);
        assert_eq!(
            service.channel_state(GUILD, CHANNEL).unwrap().last_accepted_value,
            1
        );
        assert_eq!(
            service.store.stored_state(GUILD, CHANNEL).unwrap().last_accepted_value,
            0
        );

        // Counting keeps working while the store is down.
        let report = submit(&service, U2, "2").await;
        assert_eq!(report.outcome, Outcome::Accepted { value: 2 });
        assert_eq!(service.flush_pending().await, 1);

        service.store.failing.store(false, Ordering::SeqCst);
        assert_eq!(service.flush_pending().await, 0);
        let stored = service.store.stored_state(GUILD, CHANNEL).unwrap();
        assert_eq!(stored.last_accepted_value, 2);
        assert_eq!(stored.last_acceptor_id, Some(U2));
    }

    #[tokio::test]
    async fn slow_store_times_out_into_retry_queue() {
        let service = counting_service().await;
        service.store.slow.store(true, Ordering::SeqCst);

        let report = submit(&service, U1, "1").await;

        assert_eq!(report.outcome, Outcome::Accepted { value: 1 });
        assert_eq!(service.pending_writes(), 1);
    }

    #[tokio::test]
    async fn loads_existing_guilds_from_store() {
        let store = MockCountingStore::default();
        let mut record = GuildCountingRecord::new(GUILD);
        let mut state = ChannelCounterState::new(41, BTreeSet::new());
        state.last_acceptor_id = Some(U2);
        record.config.channels.insert(CHANNEL, state);
        record.leaderboard.record_acceptance(U2);
        store.records.insert(GUILD, record);

        let service = service_with(store).await;

        assert_eq!(service.user_count(GUILD, U2), 1);
        let report = submit(&service, U1, "42").await;
        assert_eq!(report.outcome, Outcome::Accepted { value: 42 });
    }

    #[tokio::test]
    async fn leaderboard_limit_is_clamped() {
        let service = counting_service().await;
        submit(&service, U1, "1").await;
        submit(&service, U2, "2").await;
        submit(&service, U1, "3").await;

        let top = service.leaderboard(GUILD, 0);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0], LeaderboardEntry { user_id: U1, count: 2 });
        assert_eq!(service.leaderboard(GUILD, 500).len(), 2);
        assert!(service.leaderboard(404, 10).is_empty());
    }

    #[tokio::test]
    async fn admin_operations_reject_unknown_or_invalid_channels() {
        let service = counting_service().await;
        assert!(matches!(
            service.reset_channel(GUILD, 404, 3).await,
            Err(CountingError::ChannelNotConfigured)
        ));
        assert!(matches!(
            service.enable_channel(0, CHANNEL, ChannelOptions::default()).await,
            Err(CountingError::InvalidId)
        ));
    }

    #[tokio::test]
    async fn special_numbers_can_be_added_and_removed() {
        let service = counting_service().await;
        let star = CustomEmoji::parse("<:star:5>").unwrap();
        service
            .set_special_number(GUILD, 3, Some(star.clone()))
            .await
            .unwrap();
        submit(&service, U1, "1").await;
        submit(&service, U2, "2").await;

        let report = submit(&service, U1, "3").await;
        assert_eq!(report.special.and_then(|s| s.emoji), Some(star));

        assert!(service.remove_special_number(GUILD, 3).await.unwrap());
        assert!(!service.remove_special_number(GUILD, 3).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_accept_exactly_one() {
        let service = Arc::new(counting_service().await);
        service.set_recovery(GUILD, CHANNEL, true).await.unwrap();

        let mut handles = Vec::new();
        for author in 1..=20u64 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .handle_submission(&submission(author, "1"))
                    .await
                    .map(|report| report.outcome)
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if let Some(Outcome::Accepted { .. }) = handle.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        let total: u64 = service.leaderboard(GUILD, 50).iter().map(|e| e.count).sum();
        assert_eq!(total, 1);
    }
}
