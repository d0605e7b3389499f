// Counting domain models - the persisted guild/channel state plus the
// ephemeral events the service hands back to the Discord layer.
//
// Pure data with no Discord dependencies. Every persisted field has an
// explicit serde default so partially written documents still load.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

/// Milestones a freshly enabled guild starts with.
pub const DEFAULT_MILESTONES: [u64; 5] = [100, 500, 1000, 5000, 10000];

/// Special numbers a freshly enabled guild starts with (no emoji attached).
pub const DEFAULT_SPECIAL_NUMBERS: [u64; 7] = [67, 100, 500, 666, 999, 1000, 10000];

/// Default timeout handed to offenders, in minutes.
pub const DEFAULT_PENALTY_MINUTES: u64 = 1;

/// Discord refuses timeouts longer than 28 days.
pub const MAX_PENALTY_MINUTES: u64 = 28 * 24 * 60;

// ============================================================================
// PERSISTED STATE
// ============================================================================

/// A guild custom emoji, as written in chat: `<:name:id>` or `<a:name:id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEmoji {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub animated: bool,
}

impl CustomEmoji {
    /// Parse the chat form of a custom emoji. Unicode emoji are not accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        let inner = raw.trim().strip_prefix('<')?.strip_suffix('>')?;
        let mut parts = inner.split(':');

        let animated = match parts.next()? {
            "" => false,
            "a" => true,
            _ => return None,
        };
        let name = parts.next()?;
        let id = parts.next()?.parse::<u64>().ok()?;

        if parts.next().is_some() || name.is_empty() || id == 0 {
            return None;
        }

        Some(Self {
            id,
            name: name.to_string(),
            animated,
        })
    }
}

impl std::fmt::Display for CustomEmoji {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.animated {
            write!(f, "<a:{}:{}>", self.name, self.id)
        } else {
            write!(f, "<:{}:{}>", self.name, self.id)
        }
    }
}

/// Counting state for a single monitored channel.
///
/// The next accepted submission must come from someone other than
/// `last_acceptor_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounterState {
    #[serde(default)]
    pub last_accepted_value: u64,
    #[serde(default)]
    pub last_acceptor_id: Option<u64>,
    /// Keep the count on a mistake and prompt the correct number instead of resetting.
    #[serde(default)]
    pub recovery_enabled: bool,
    /// Non-numeric messages are left alone instead of being treated as mistakes.
    #[serde(default)]
    pub allow_non_numeric_chat: bool,
    /// Accept arithmetic like `50+50` as a submission.
    #[serde(default)]
    pub allow_expressions: bool,
    /// Strict channel: chat and expressions are refused whatever the other flags say.
    #[serde(default)]
    pub hard_mode: bool,
    #[serde(default = "default_milestones")]
    pub milestones: BTreeSet<u64>,
}

impl ChannelCounterState {
    pub fn new(start: u64, milestones: BTreeSet<u64>) -> Self {
        Self {
            last_accepted_value: start,
            last_acceptor_id: None,
            recovery_enabled: false,
            allow_non_numeric_chat: false,
            allow_expressions: false,
            hard_mode: false,
            milestones,
        }
    }

    /// The value the next submission has to match.
    pub fn expected_next(&self) -> u64 {
        self.last_accepted_value.saturating_add(1)
    }

    pub fn chat_allowed(&self) -> bool {
        self.allow_non_numeric_chat && !self.hard_mode
    }

    pub fn expressions_allowed(&self) -> bool {
        self.allow_expressions && !self.hard_mode
    }
}

/// Per-guild counting configuration: the monitored channels plus guild-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildCountingConfig {
    pub guild_id: u64,
    #[serde(default)]
    pub channels: HashMap<u64, ChannelCounterState>,
    /// Copied into each channel when it is enabled.
    #[serde(default = "default_milestones")]
    pub milestones: BTreeSet<u64>,
    /// Timeout for offenders; 0 disables the penalty.
    #[serde(default = "default_penalty_minutes")]
    pub penalty_minutes: u64,
    #[serde(default)]
    pub success_emoji: Option<CustomEmoji>,
    #[serde(default)]
    pub error_emoji: Option<CustomEmoji>,
    #[serde(default)]
    pub milestone_emoji: Option<CustomEmoji>,
    #[serde(default = "default_special_numbers")]
    pub special_numbers: BTreeMap<u64, Option<CustomEmoji>>,
    #[serde(default)]
    pub log_channel_id: Option<u64>,
}

impl GuildCountingConfig {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            channels: HashMap::new(),
            milestones: default_milestones(),
            penalty_minutes: DEFAULT_PENALTY_MINUTES,
            success_emoji: None,
            error_emoji: None,
            milestone_emoji: None,
            special_numbers: default_special_numbers(),
            log_channel_id: None,
        }
    }

    pub fn penalty(&self) -> Option<Duration> {
        (self.penalty_minutes > 0).then(|| Duration::from_secs(self.penalty_minutes * 60))
    }

    pub fn emoji(&self, slot: EmojiSlot) -> Option<&CustomEmoji> {
        match slot {
            EmojiSlot::Success => self.success_emoji.as_ref(),
            EmojiSlot::Error => self.error_emoji.as_ref(),
            EmojiSlot::Milestone => self.milestone_emoji.as_ref(),
        }
    }
}

/// Accepted-submission tally per user in one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    #[serde(default)]
    pub counts: HashMap<u64, u64>,
}

impl Leaderboard {
    /// Add one accepted submission for `user_id` and return the new total.
    pub fn record_acceptance(&mut self, user_id: u64) -> u64 {
        let count = self.counts.entry(user_id).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn count(&self, user_id: u64) -> u64 {
        self.counts.get(&user_id).copied().unwrap_or(0)
    }

    /// Highest counts first; ties keep a stable order by user id.
    pub fn top(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .counts
            .iter()
            .map(|(user_id, count)| LeaderboardEntry {
                user_id: *user_id,
                count: *count,
            })
            .collect();

        entries.sort_by(|a, b| b.count.cmp(&a.count).then(a.user_id.cmp(&b.user_id)));
        entries.truncate(limit);
        entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: u64,
    pub count: u64,
}

/// One persisted document per guild. Config and leaderboard travel together
/// so an accepted submission is a single write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildCountingRecord {
    pub config: GuildCountingConfig,
    #[serde(default)]
    pub leaderboard: Leaderboard,
}

impl GuildCountingRecord {
    pub fn new(guild_id: u64) -> Self {
        Self {
            config: GuildCountingConfig::new(guild_id),
            leaderboard: Leaderboard::default(),
        }
    }

    pub fn guild_id(&self) -> u64 {
        self.config.guild_id
    }
}

fn default_milestones() -> BTreeSet<u64> {
    DEFAULT_MILESTONES.into_iter().collect()
}

fn default_special_numbers() -> BTreeMap<u64, Option<CustomEmoji>> {
    DEFAULT_SPECIAL_NUMBERS.into_iter().map(|n| (n, None)).collect()
}

fn default_penalty_minutes() -> u64 {
    DEFAULT_PENALTY_MINUTES
}

// ============================================================================
// EPHEMERAL EVENTS
// ============================================================================

/// Which guild-wide emoji an admin is configuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmojiSlot {
    Success,
    Error,
    Milestone,
}

/// A message posted in a monitored channel.
#[derive(Debug, Clone)]
pub struct SubmissionEvent {
    pub guild_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub raw_text: String,
}

/// Why a submission broke the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Not a number, in a channel that does not allow chat.
    InvalidFormat,
    /// The previous accepted number came from the same user.
    SameUserTwice,
    /// A number, but not the next one.
    WrongNumber,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InvalidFormat => write!(f, "Invalid Format"),
            RejectReason::SameUserTwice => write!(f, "Same User Twice"),
            RejectReason::WrongNumber => write!(f, "Wrong Number"),
        }
    }
}

/// Result of validating one submission against the channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted { value: u64 },
    Rejected(RejectReason),
    /// Chat in a channel that allows it; nothing changes.
    Ignored,
}

/// Handed to the moderation/notification side after a rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationNotice {
    pub guild_id: u64,
    pub channel_id: u64,
    pub user_id: u64,
    pub reason: RejectReason,
    pub submitted_text: String,
    /// What the channel was waiting for when the mistake happened.
    pub expected: u64,
    /// False when recovery mode kept the count.
    pub count_reset: bool,
    /// How long to silence the offender, if at all.
    pub penalty: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilestoneEvent {
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialNumberEvent {
    pub value: u64,
    pub emoji: Option<CustomEmoji>,
}

/// Everything the Discord layer needs to react to one processed submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    pub outcome: Outcome,
    /// Channel state after the outcome was applied.
    pub state: ChannelCounterState,
    pub violation: Option<ViolationNotice>,
    pub milestone: Option<MilestoneEvent>,
    pub special: Option<SpecialNumberEvent>,
    /// The author's new leaderboard total, for accepted submissions.
    pub leaderboard_count: Option<u64>,
}

/// Options for `enable_channel`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelOptions {
    pub start: u64,
    pub recovery_enabled: bool,
    pub allow_non_numeric_chat: bool,
    pub allow_expressions: bool,
    pub hard_mode: bool,
}
