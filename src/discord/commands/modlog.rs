// Moderator action log commands. Replies are ephemeral; the record itself
// goes to the guild's log channel.

use crate::core::modlog::{ModAction, ModLogEntry, ModLogError};
use crate::core::permissions::GuardedCommand;
use crate::discord::gateway::SerenityGateway;
use crate::discord::{auth, embeds, Context, Error};
use poise::serenity_prelude as serenity;
use tracing::error;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ActionChoice {
    #[name = "Verbal Warning"]
    VerbalWarn,
    #[name = "Bot Warning"]
    BotWarn,
    Timeout,
    Isolate,
    Kick,
    #[name = "Permanent Ban"]
    Ban,
    Other,
}

impl From<ActionChoice> for ModAction {
    fn from(value: ActionChoice) -> Self {
        match value {
            ActionChoice::VerbalWarn => ModAction::VerbalWarn,
            ActionChoice::BotWarn => ModAction::BotWarn,
            ActionChoice::Timeout => ModAction::Timeout,
            ActionChoice::Isolate => ModAction::Isolate,
            ActionChoice::Kick => ModAction::Kick,
            ActionChoice::Ban => ModAction::Ban,
            ActionChoice::Other => ModAction::Other,
        }
    }
}

/// Log a moderator action taken on a member.
#[poise::command(slash_command, guild_only)]
pub async fn log(
    ctx: Context<'_>,
    #[description = "The user you took action on"] user: serenity::User,
    #[description = "The action you took"] action: ActionChoice,
    #[description = "Why you took it"] reason: Option<String>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    if !auth::check(ctx, GuardedCommand::Log).await? {
        return Ok(());
    }

    record(ctx, user.id.get(), action.into(), reason).await
}

/// Log a moderator action on a user by ID (for users no longer in the server).
#[poise::command(slash_command, guild_only)]
pub async fn elog(
    ctx: Context<'_>,
    #[description = "The ID of the user you took action on"] user_id: String,
    #[description = "The action you took"] action: ActionChoice,
    #[description = "Why you took it"] reason: Option<String>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    if !auth::check(ctx, GuardedCommand::ExternalLog).await? {
        return Ok(());
    }

    let Some(target_id) = parse_user_id(&user_id) else {
        let embed = embeds::denied("Invalid user ID", format!("`{}` is not a user ID.", user_id));
        ctx.send(embeds::reply(embed)).await?;
        return Ok(());
    };

    if let Err(e) = ctx.http().get_user(serenity::UserId::new(target_id)).await {
        let embed = embeds::denied("Unknown user", format!("Couldn't find user `{}`: {}", target_id, e));
        ctx.send(embeds::reply(embed)).await?;
        return Ok(());
    }

    record(ctx, target_id, action.into(), reason).await
}

async fn record(
    ctx: Context<'_>,
    target_id: u64,
    action: ModAction,
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();
    let entry = ModLogEntry {
        guild_id,
        moderator_id: ctx.author().id.get(),
        target_id,
        action,
        reason,
    };

    let gateway = SerenityGateway::new(ctx.serenity_context().http.clone());
    let embed = match ctx.data().modlog.record(&gateway, &entry).await {
        Ok(_) => embeds::info(
            "Logged action",
            format!("Logged action for <@{}>: {}", target_id, action.label()),
        ),
        Err(err @ ModLogError::NotConfigured) => embeds::denied("Not configured", err.to_string()),
        Err(err) => {
            error!(guild_id, user_id = target_id, "Failed to log moderator action: {}", err);
            ctx.data().escalate(format!(
                "Mod log failed in guild {} for user {}: {}",
                guild_id, target_id, err
            ));
            embeds::error(embeds::GENERIC_FAILURE)
        }
    };

    ctx.send(embeds::reply(embed)).await?;
    Ok(())
}

/// Accepts a raw snowflake or a `<@id>` / `<@!id>` mention.
fn parse_user_id(input: &str) -> Option<u64> {
    let trimmed = input
        .trim()
        .trim_start_matches("<@")
        .trim_start_matches('!')
        .trim_end_matches('>');
    trimmed.parse::<u64>().ok().filter(|id| *id != 0)
}
