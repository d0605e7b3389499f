// Discord-specific counting handling - translates submission reports into Discord actions.
//
// The service has already validated and persisted the outcome by the time
// we get here, so nothing below can change the count. Every Discord call is
// best effort and only logged on failure.

use super::counting_messages::{
    milestone_message, reaction_for, special_number_message, violation_log_embed,
    violation_message, SUCCESS_FALLBACK,
};
use super::penalties::apply_penalty;
use crate::core::counting::{
    EmojiSlot, GuildCountingConfig, Outcome, SubmissionEvent, SubmissionReport, ViolationNotice,
};
use crate::discord::Data;
use poise::serenity_prelude as serenity;

/// Run a guild message through the counting game. Messages outside
/// counting channels, from bots or in DMs are ignored.
pub async fn handle_counting_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) {
    if msg.author.bot {
        return;
    }

    let Some(guild_id) = msg.guild_id else {
        return;
    };

    let submission = SubmissionEvent {
        guild_id: guild_id.get(),
        channel_id: msg.channel_id.get(),
        author_id: msg.author.id.get(),
        raw_text: msg.content.clone(),
    };

    let Some(report) = data.counting.handle_submission(&submission).await else {
        return;
    };

    let config = data
        .counting
        .guild_config(submission.guild_id)
        .unwrap_or_else(|| GuildCountingConfig::new(submission.guild_id));

    match report.outcome {
        Outcome::Ignored => {}
        Outcome::Accepted { value } => {
            announce_acceptance(ctx, msg, &report, value, &config).await
        }
        Outcome::Rejected(_) => {
            if let Some(notice) = &report.violation {
                handle_violation(ctx, msg, notice, &config).await;
            }
        }
    }
}

async fn announce_acceptance(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    report: &SubmissionReport,
    value: u64,
    config: &GuildCountingConfig,
) {
    let reaction = reaction_for(config.emoji(EmojiSlot::Success), SUCCESS_FALLBACK);
    if let Err(e) = msg.react(&ctx.http, reaction).await {
        tracing::warn!("Failed to react to counting message: {}", e);
    }

    let user_id = msg.author.id.get();

    if report.milestone.is_some() {
        let text = milestone_message(value, user_id, config.emoji(EmojiSlot::Milestone));
        if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
            tracing::warn!("Failed to announce counting milestone: {}", e);
        }
    }

    if let Some(special) = &report.special {
        let text = special_number_message(value, user_id, special.emoji.as_ref());
        if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
            tracing::warn!("Failed to announce special number: {}", e);
        }
    }
}

async fn handle_violation(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    notice: &ViolationNotice,
    config: &GuildCountingConfig,
) {
    if let Err(e) = msg.delete(&ctx.http).await {
        tracing::warn!("Failed to delete counting mistake: {}", e);
    }

    let text = violation_message(notice, config.emoji(EmojiSlot::Error));
    if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
        tracing::warn!("Failed to send counting violation notice: {}", e);
    }

    apply_penalty(ctx, notice).await;

    if let Some(log_channel_id) = config.log_channel_id {
        let embed = violation_log_embed(notice);
        if let Err(e) = serenity::ChannelId::new(log_channel_id)
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
            .await
        {
            tracing::warn!(log_channel_id, "Failed to log counting violation: {}", e);
        }
    }
}
