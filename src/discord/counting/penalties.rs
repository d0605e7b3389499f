// Moderation side of counting violations: the Discord timeout.

use crate::core::counting::ViolationNotice;
use poise::serenity_prelude as serenity;

/// Time the offender out for the notice's penalty. Best effort: failures
/// (missing permissions, member above the bot) are logged and swallowed.
pub async fn apply_penalty(ctx: &serenity::Context, notice: &ViolationNotice) {
    let Some(duration) = notice.penalty else {
        return;
    };

    let timeout_until = match serenity::Timestamp::from_unix_timestamp(
        chrono::Utc::now().timestamp() + duration.as_secs() as i64,
    ) {
        Ok(ts) => ts,
        Err(e) => {
            tracing::error!("Failed to create timeout timestamp: {}", e);
            return;
        }
    };

    let reason = format!("Counting error: {}", notice.reason);
    let guild_id = serenity::GuildId::new(notice.guild_id);

    if let Err(e) = guild_id
        .edit_member(
            &ctx.http,
            serenity::UserId::new(notice.user_id),
            serenity::EditMember::new()
                .disable_communication_until_datetime(timeout_until)
                .audit_log_reason(&reason),
        )
        .await
    {
        tracing::warn!(
            guild_id = notice.guild_id,
            user_id = notice.user_id,
            "Failed to time out counting offender: {}",
            e
        );
    } else {
        tracing::info!(
            guild_id = notice.guild_id,
            user_id = notice.user_id,
            minutes = duration.as_secs() / 60,
            "Counting offender timed out"
        );
    }
}
