// Text and embeds for the counting game. Formatting only, no I/O.

use crate::core::counting::{
    ChannelCounterState, CustomEmoji, GuildCountingConfig, LeaderboardEntry, RejectReason,
    ViolationNotice,
};
use poise::serenity_prelude as serenity;
use rand::seq::SliceRandom;

pub const SUCCESS_FALLBACK: &str = "✅";
pub const ERROR_FALLBACK: &str = "❌";
pub const MILESTONE_FALLBACK: &str = "🎉";
pub const SPECIAL_FALLBACK: &str = "✨";

/// Reaction for an accepted number: the guild's custom emoji or a unicode fallback.
pub fn reaction_for(emoji: Option<&CustomEmoji>, fallback: &str) -> serenity::ReactionType {
    match emoji {
        Some(emoji) => serenity::ReactionType::Custom {
            animated: emoji.animated,
            id: serenity::EmojiId::new(emoji.id),
            name: Some(emoji.name.clone()),
        },
        None => serenity::ReactionType::Unicode(fallback.to_string()),
    }
}

pub fn emoji_text(emoji: Option<&CustomEmoji>, fallback: &str) -> String {
    emoji
        .map(ToString::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

fn reason_text(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::InvalidFormat => "Only numbers count here",
        RejectReason::SameUserTwice => "You can't count twice in a row",
        RejectReason::WrongNumber => "Wrong number",
    }
}

/// Channel message after a mistake, worded for reset or recovery policy.
pub fn violation_message(notice: &ViolationNotice, error_emoji: Option<&CustomEmoji>) -> String {
    let emoji = emoji_text(error_emoji, ERROR_FALLBACK);
    if notice.count_reset {
        format!(
            "{} <@{}> broke the count at **{}**! {}. \
             Starting again from **0**, the next number is **1**.",
            emoji,
            notice.user_id,
            notice.expected,
            reason_text(notice.reason)
        )
    } else {
        format!(
            "{} <@{}> {}. The next number is still **{}**.",
            emoji,
            notice.user_id,
            reason_text(notice.reason),
            notice.expected
        )
    }
}

pub fn milestone_message(value: u64, user_id: u64, emoji: Option<&CustomEmoji>) -> String {
    format!(
        "{} Milestone **{}** reached by <@{}>! {}",
        emoji_text(emoji, MILESTONE_FALLBACK),
        value,
        user_id,
        random_flavor_line()
    )
}

pub fn special_number_message(value: u64, user_id: u64, emoji: Option<&CustomEmoji>) -> String {
    format!(
        "{} Special number **{}** reached by <@{}>!",
        emoji_text(emoji, SPECIAL_FALLBACK),
        value,
        user_id
    )
}

/// First message posted in a freshly enabled channel.
pub fn kickoff_message(state: &ChannelCounterState) -> String {
    format!(
        "🔢 Counting starts here! The next number is **{}**.",
        state.expected_next()
    )
}

/// Report for the guild's counting log channel.
pub fn violation_log_embed(notice: &ViolationNotice) -> serenity::CreateEmbed {
    let content = if notice.submitted_text.is_empty() {
        "—".to_string()
    } else {
        notice.submitted_text.chars().take(1000).collect()
    };

    serenity::CreateEmbed::new()
        .title("Counting Error")
        .color(serenity::Colour::RED)
        .field("User", format!("<@{}>", notice.user_id), true)
        .field("Channel", format!("<#{}>", notice.channel_id), true)
        .field("Reason", notice.reason.to_string(), true)
        .field("Message", content, false)
        .field("Expected", notice.expected.to_string(), true)
        .field(
            "Count",
            if notice.count_reset { "Reset to 0" } else { "Kept (recovery)" },
            true,
        )
        .timestamp(serenity::Timestamp::now())
}

pub fn channel_info_embed(
    channel_id: u64,
    state: &ChannelCounterState,
    config: &GuildCountingConfig,
) -> serenity::CreateEmbed {
    let last_counter = state
        .last_acceptor_id
        .map(|id| format!("<@{}>", id))
        .unwrap_or_else(|| "Nobody yet".to_string());
    let penalty = match config.penalty_minutes {
        0 => "Off".to_string(),
        1 => "1 minute".to_string(),
        n => format!("{} minutes", n),
    };

    serenity::CreateEmbed::new()
        .title("📊 Counting Info")
        .color(serenity::Colour::BLURPLE)
        .field("Channel", format!("<#{}>", channel_id), false)
        .field("Last number", state.last_accepted_value.to_string(), true)
        .field("Next number", state.expected_next().to_string(), true)
        .field("Last counter", last_counter, true)
        .field("Mode", if state.hard_mode { "Hard" } else { "Normal" }, true)
        .field("Recovery", on_off(state.recovery_enabled), true)
        .field("Chat allowed", on_off(state.allow_non_numeric_chat), true)
        .field("Expressions", on_off(state.allow_expressions), true)
        .field("Penalty", penalty, true)
        .field("Milestones", format_numbers(state.milestones.iter().copied()), false)
}

pub fn leaderboard_embed(entries: &[LeaderboardEntry]) -> serenity::CreateEmbed {
    let body = entries
        .iter()
        .enumerate()
        .map(|(rank, entry)| {
            let medal = match rank {
                0 => "🥇".to_string(),
                1 => "🥈".to_string(),
                2 => "🥉".to_string(),
                n => format!("#{}", n + 1),
            };
            let noun = if entry.count == 1 { "number" } else { "numbers" };
            format!("{} <@{}> — {} {}", medal, entry.user_id, entry.count, noun)
        })
        .collect::<Vec<_>>()
        .join("\n");

    serenity::CreateEmbed::new()
        .title("🏆 Counting Leaderboard")
        .color(serenity::Colour::GOLD)
        .description(body)
}

pub fn format_numbers(values: impl Iterator<Item = u64>) -> String {
    let joined = values.map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "None".to_string()
    } else {
        joined
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "On"
    } else {
        "Off"
    }
}

fn random_flavor_line() -> &'static str {
    const FLAVOR_LINES: [&str; 4] = [
        "Keep it going!",
        "The whole server did that.",
        "On to the next one.",
        "Nobody mess it up now.",
    ];

    FLAVOR_LINES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FLAVOR_LINES[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(count_reset: bool) -> ViolationNotice {
        ViolationNotice {
            guild_id: 1,
            channel_id: 2,
            user_id: 3,
            reason: RejectReason::WrongNumber,
            submitted_text: "8".to_string(),
            expected: 7,
            count_reset,
            penalty: None,
        }
    }

    #[test]
    fn violation_message_matches_policy() {
        let reset = violation_message(&notice(true), None);
        assert!(reset.starts_with(ERROR_FALLBACK));
        assert!(reset.contains("Starting again from **0**"));

        let kept = violation_message(&notice(false), None);
        assert!(kept.contains("still **7**"));
    }

    #[test]
    fn custom_emoji_replaces_fallback() {
        let emoji = CustomEmoji::parse("<a:Sbagliato:1441165123568930896>").unwrap();
        let text = violation_message(&notice(true), Some(&emoji));
        assert!(text.starts_with("<a:Sbagliato:1441165123568930896>"));

        assert!(matches!(
            reaction_for(Some(&emoji), SUCCESS_FALLBACK),
            serenity::ReactionType::Custom { animated: true, .. }
        ));
        assert!(matches!(
            reaction_for(None, SUCCESS_FALLBACK),
            serenity::ReactionType::Unicode(ref s) if s == SUCCESS_FALLBACK
        ));
    }

    #[test]
    fn numbers_are_listed_or_none() {
        assert_eq!(format_numbers([100u64, 500].into_iter()), "100, 500");
        assert_eq!(format_numbers(std::iter::empty()), "None");
    }
}
