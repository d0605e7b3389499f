// Slash commands for the counting game.
//
// Same pattern as every other command module:
// 1. Pull IDs and options out of the Discord types
// 2. Call the counting service
// 3. Format a reply from the result
//
// Nothing here decides game rules.

use crate::core::counting::{
    ChannelOptions, CountingError, CountingService, CountingStore, CustomEmoji, EmojiSlot,
    MAX_LEADERBOARD_LIMIT,
};
use crate::discord::counting::counting_messages::{
    channel_info_embed, emoji_text, format_numbers, kickoff_message, leaderboard_embed,
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Type alias for our bot's context.
/// This is what every command receives as its first parameter.
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands.
pub struct Data {
    pub counting: Arc<CountingService<Box<dyn CountingStore>>>,
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum CountingMode {
    #[name = "Normal"]
    Normal,
    #[name = "Hard (numbers only, no chat)"]
    Hard,
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum EmojiKind {
    #[name = "Success reaction"]
    Success,
    #[name = "Error message"]
    Error,
    #[name = "Milestone message"]
    Milestone,
}

impl From<EmojiKind> for EmojiSlot {
    fn from(value: EmojiKind) -> Self {
        match value {
            EmojiKind::Success => EmojiSlot::Success,
            EmojiKind::Error => EmojiSlot::Error,
            EmojiKind::Milestone => EmojiSlot::Milestone,
        }
    }
}

impl EmojiKind {
    fn label(self) -> &'static str {
        match self {
            EmojiKind::Success => "Success",
            EmojiKind::Error => "Error",
            EmojiKind::Milestone => "Milestone",
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum SpecialAction {
    Add,
    Remove,
}

/// Counting game setup and stats.
#[poise::command(
    slash_command,
    guild_only,
    subcommands(
        "set",
        "unset",
        "info",
        "reset",
        "mode",
        "recovery",
        "chat",
        "expressions",
        "milestones",
        "penalty",
        "emoji",
        "special",
        "log",
        "leaderboard",
        "stats"
    )
)]
pub async fn counting(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Turn a channel into a counting channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Channel to count in (defaults to this one)"]
    channel: Option<serenity::Channel>,
    #[description = "Last number already counted (default: 0)"] start: Option<u64>,
    #[description = "Normal or hard mode (default: Normal)"] mode: Option<CountingMode>,
    #[description = "Keep the count after a mistake (default: off)"] recovery: Option<bool>,
    #[description = "Allow chatting between numbers (default: off)"] chat: Option<bool>,
    #[description = "Accept math like 2*5 (default: off)"] expressions: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = target_channel(&ctx, channel.as_ref());

    let options = ChannelOptions {
        start: start.unwrap_or(0),
        recovery_enabled: recovery.unwrap_or(false),
        allow_non_numeric_chat: chat.unwrap_or(false),
        allow_expressions: expressions.unwrap_or(false),
        hard_mode: matches!(mode, Some(CountingMode::Hard)),
    };

    let state = match ctx
        .data()
        .counting
        .enable_channel(guild_id, channel_id, options)
        .await
    {
        Ok(state) => state,
        Err(e) => return reply_error(ctx, e).await,
    };

    if let Err(e) = serenity::ChannelId::new(channel_id)
        .say(ctx.http(), kickoff_message(&state))
        .await
    {
        tracing::warn!(channel_id, "Failed to post counting kickoff: {}", e);
    }

    reply(
        ctx,
        format!(
            "✅ Counting enabled in <#{}>. Next number: **{}**.",
            channel_id,
            state.expected_next()
        ),
    )
    .await
}

/// Stop counting in a channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn unset(
    ctx: Context<'_>,
    #[description = "Counting channel (defaults to this one)"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = target_channel(&ctx, channel.as_ref());

    match ctx.data().counting.disable_channel(guild_id, channel_id).await {
        Ok(()) => reply(ctx, format!("🛑 Counting disabled in <#{}>.", channel_id)).await,
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Show the state and rules of a counting channel.
#[poise::command(slash_command, guild_only)]
pub async fn info(
    ctx: Context<'_>,
    #[description = "Counting channel (defaults to this one)"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = target_channel(&ctx, channel.as_ref());
    let counting = &ctx.data().counting;

    let (Some(state), Some(config)) = (
        counting.channel_state(guild_id, channel_id),
        counting.guild_config(guild_id),
    ) else {
        return reply_error(ctx, CountingError::ChannelNotConfigured).await;
    };

    let embed = channel_info_embed(channel_id, &state, &config).field(
        "Special numbers",
        format_numbers(config.special_numbers.keys().copied()),
        false,
    );
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Set the count to a value (0 starts over).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn reset(
    ctx: Context<'_>,
    #[description = "New current number (default: 0)"] value: Option<u64>,
    #[description = "Counting channel (defaults to this one)"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = target_channel(&ctx, channel.as_ref());

    match ctx
        .data()
        .counting
        .reset_channel(guild_id, channel_id, value.unwrap_or(0))
        .await
    {
        Ok(state) => {
            reply(
                ctx,
                format!(
                    "🔁 Count in <#{}> set to **{}**. Next number: **{}**.",
                    channel_id,
                    state.last_accepted_value,
                    state.expected_next()
                ),
            )
            .await
        }
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Switch a channel between normal and hard mode.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn mode(
    ctx: Context<'_>,
    #[description = "Counting mode"] mode: CountingMode,
    #[description = "Counting channel (defaults to this one)"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = target_channel(&ctx, channel.as_ref());
    let hard = matches!(mode, CountingMode::Hard);

    match ctx
        .data()
        .counting
        .set_hard_mode(guild_id, channel_id, hard)
        .await
    {
        Ok(_) => {
            let label = if hard { "hard" } else { "normal" };
            reply(ctx, format!("⚙️ <#{}> is now in **{}** mode.", channel_id, label)).await
        }
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Keep the count after mistakes instead of resetting to 0.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn recovery(
    ctx: Context<'_>,
    #[description = "Enable recovery"] enabled: bool,
    #[description = "Counting channel (defaults to this one)"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = target_channel(&ctx, channel.as_ref());

    match ctx
        .data()
        .counting
        .set_recovery(guild_id, channel_id, enabled)
        .await
    {
        Ok(_) => reply(ctx, toggle_text("Recovery", enabled, channel_id)).await,
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Allow or forbid regular chat between numbers.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn chat(
    ctx: Context<'_>,
    #[description = "Allow chat messages"] allowed: bool,
    #[description = "Counting channel (defaults to this one)"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = target_channel(&ctx, channel.as_ref());

    match ctx
        .data()
        .counting
        .set_allow_chat(guild_id, channel_id, allowed)
        .await
    {
        Ok(state) => {
            let mut text = toggle_text("Chat", allowed, channel_id);
            if allowed && state.hard_mode {
                text.push_str(" Hard mode still rejects chat until it is turned off.");
            }
            reply(ctx, text).await
        }
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Accept arithmetic like `3*4` as a number.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn expressions(
    ctx: Context<'_>,
    #[description = "Allow math expressions"] allowed: bool,
    #[description = "Counting channel (defaults to this one)"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = target_channel(&ctx, channel.as_ref());

    match ctx
        .data()
        .counting
        .set_expressions(guild_id, channel_id, allowed)
        .await
    {
        Ok(state) => {
            let mut text = toggle_text("Expressions", allowed, channel_id);
            if allowed && state.hard_mode {
                text.push_str(" Hard mode still only accepts plain numbers.");
            }
            reply(ctx, text).await
        }
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Set milestone numbers, e.g. `100, 500, 1000` (or `none`).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn milestones(
    ctx: Context<'_>,
    #[description = "Comma or space separated numbers, or `none`"] values: String,
    #[description = "Only this channel (default: server default and all channels)"]
    channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    let parsed = match parse_number_list(&values) {
        Ok(parsed) => parsed,
        Err(message) => return reply(ctx, format!("❌ {}", message)).await,
    };

    let channel_id = channel.map(|c| c.id().get());
    match ctx
        .data()
        .counting
        .set_milestones(guild_id, channel_id, parsed)
        .await
    {
        Ok(set) => {
            let scope = channel_id
                .map(|id| format!("<#{}>", id))
                .unwrap_or_else(|| "this server".to_string());
            reply(
                ctx,
                format!(
                    "🎯 Milestones for {}: {}",
                    scope,
                    format_numbers(set.into_iter())
                ),
            )
            .await
        }
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Set the timeout given for counting mistakes (0 disables it).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn penalty(
    ctx: Context<'_>,
    #[description = "Timeout length in minutes"]
    #[max = 40320]
    minutes: u64,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    match ctx
        .data()
        .counting
        .set_penalty_minutes(guild_id, minutes)
        .await
    {
        Ok(()) if minutes == 0 => reply(ctx, "⏱️ Counting timeouts disabled.".to_string()).await,
        Ok(()) => {
            reply(
                ctx,
                format!("⏱️ Counting mistakes now cost a {} minute timeout.", minutes),
            )
            .await
        }
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Use a custom server emoji for counting reactions and messages.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn emoji(
    ctx: Context<'_>,
    #[description = "Which emoji to change"] kind: EmojiKind,
    #[description = "Custom emoji like <:name:id> (leave empty for the default)"]
    emoji: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    let parsed = match emoji.as_deref().map(str::trim) {
        None => None,
        Some(raw) => match CustomEmoji::parse(raw) {
            Some(parsed) => Some(parsed),
            None => return reply(ctx, invalid_emoji_text(raw)).await,
        },
    };

    let shown = emoji_text(parsed.as_ref(), "the default");
    match ctx
        .data()
        .counting
        .set_emoji(guild_id, kind.into(), parsed)
        .await
    {
        Ok(()) => reply(ctx, format!("✅ {} emoji set to {}.", kind.label(), shown)).await,
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Add or remove a special number that gets its own announcement.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn special(
    ctx: Context<'_>,
    #[description = "Add or remove"] action: SpecialAction,
    #[description = "The number"] value: u64,
    #[description = "Custom emoji like <:name:id> for the announcement"] emoji: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let counting = &ctx.data().counting;

    match action {
        SpecialAction::Add => {
            let parsed = match emoji.as_deref().map(str::trim) {
                None => None,
                Some(raw) => match CustomEmoji::parse(raw) {
                    Some(parsed) => Some(parsed),
                    None => return reply(ctx, invalid_emoji_text(raw)).await,
                },
            };
            match counting.set_special_number(guild_id, value, parsed).await {
                Ok(()) => reply(ctx, format!("✨ **{}** is now a special number.", value)).await,
                Err(e) => reply_error(ctx, e).await,
            }
        }
        SpecialAction::Remove => match counting.remove_special_number(guild_id, value).await {
            Ok(true) => reply(ctx, format!("🗑️ **{}** is no longer special.", value)).await,
            Ok(false) => reply(ctx, format!("**{}** was not a special number.", value)).await,
            Err(e) => reply_error(ctx, e).await,
        },
    }
}

/// Send counting mistakes to a log channel (leave empty to stop).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn log(
    ctx: Context<'_>,
    #[description = "Channel for counting error reports"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = channel.map(|c| c.id().get());

    match ctx
        .data()
        .counting
        .set_log_channel(guild_id, channel_id)
        .await
    {
        Ok(()) => match channel_id {
            Some(id) => reply(ctx, format!("📝 Counting errors will be logged in <#{}>.", id)).await,
            None => reply(ctx, "📝 Counting error logging disabled.".to_string()).await,
        },
        Err(e) => reply_error(ctx, e).await,
    }
}

/// Top counters in this server.
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "How many users to show (default: 10)"]
    #[min = 1]
    #[max = 50]
    limit: Option<u64>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let limit = limit
        .map(|l| l as usize)
        .unwrap_or(10)
        .clamp(1, MAX_LEADERBOARD_LIMIT);

    let entries = ctx.data().counting.leaderboard(guild_id, limit);
    if entries.is_empty() {
        ctx.say("Nobody has counted yet!").await?;
        return Ok(());
    }

    ctx.send(poise::CreateReply::default().embed(leaderboard_embed(&entries)))
        .await?;
    Ok(())
}

/// How many numbers a user has counted.
#[poise::command(slash_command, guild_only)]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let user = user.as_ref().unwrap_or_else(|| ctx.author());

    let count = ctx.data().counting.user_count(guild_id, user.id.get());
    let noun = if count == 1 { "number" } else { "numbers" };
    ctx.say(format!("🔢 <@{}> has counted **{}** {}.", user.id, count, noun))
        .await?;
    Ok(())
}

fn target_channel(ctx: &Context<'_>, channel: Option<&serenity::Channel>) -> u64 {
    channel
        .map(|c| c.id())
        .unwrap_or_else(|| ctx.channel_id())
        .get()
}

async fn reply(ctx: Context<'_>, text: String) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().content(text).ephemeral(true))
        .await?;
    Ok(())
}

async fn reply_error(ctx: Context<'_>, error: CountingError) -> Result<(), Error> {
    let text = match &error {
        CountingError::ChannelNotConfigured => {
            "❌ Counting is not enabled there. Use `/counting set` first.".to_string()
        }
        CountingError::Storage(_) => {
            tracing::error!("Counting storage error: {}", error);
            "❌ Couldn't reach counting storage, try again later.".to_string()
        }
        other => format!("❌ {}", other),
    };
    reply(ctx, text).await
}

fn toggle_text(setting: &str, enabled: bool, channel_id: u64) -> String {
    let state = if enabled { "enabled" } else { "disabled" };
    format!("✅ {} {} in <#{}>.", setting, state, channel_id)
}

fn invalid_emoji_text(raw: &str) -> String {
    format!(
        "❌ `{}` is not a custom emoji. Paste one from this server, like `<:name:id>`.",
        raw
    )
}

/// Parse a list like `100, 500 1000`. `none` (or an empty string) means no numbers.
fn parse_number_list(raw: &str) -> Result<Vec<u64>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }

    trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| format!("`{}` is not a whole number.", part))
        })
        .collect()
}
