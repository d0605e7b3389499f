// Bot presence. Discord-layer glue only.

use poise::serenity_prelude as serenity;

/// Show what the bot is doing in the member list.
pub fn set_watching(ctx: &serenity::Context) {
    let activity = serenity::ActivityData::watching("the count");
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

/// Called once the bot is ready so the default presence is set in one place.
pub fn on_ready(ctx: &serenity::Context) {
    set_watching(ctx);
}
