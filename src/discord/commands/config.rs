// Guild configuration commands: overrides, isolation role and log channel.
//
// Every subcommand is guarded by Administrator (override name `config`).

use crate::core::isolation::{highest_rank, outranks, MemberGateway};
use crate::core::permissions::{GuardedCommand, OverrideScope, PermissionError};
use crate::discord::gateway::SerenityGateway;
use crate::discord::{auth, embeds, Context, Error};
use poise::serenity_prelude as serenity;
use tracing::info;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ScopeChoice {
    #[name = "isolate"]
    Isolate,
    #[name = "config"]
    Config,
    #[name = "log"]
    Log,
}

impl From<ScopeChoice> for OverrideScope {
    fn from(value: ScopeChoice) -> Self {
        match value {
            ScopeChoice::Isolate => OverrideScope::Isolation,
            ScopeChoice::Config => OverrideScope::Config,
            ScopeChoice::Log => OverrideScope::ModLog,
        }
    }
}

/// Server configuration for shieldbot.
#[poise::command(
    slash_command,
    guild_only,
    subcommands(
        "viewperms",
        "addperm",
        "removeperm",
        "setisolationrole",
        "setlogchannel"
    )
)]
pub async fn config(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// List which roles can use which commands.
#[poise::command(slash_command, guild_only)]
pub async fn viewperms(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    if !auth::check(ctx, GuardedCommand::Config).await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();
    let overrides = ctx.data().permissions.get_overrides(guild_id).await?;

    let mut embed = embeds::info("Command permissions", "Roles allowed on top of the native permission for each command.");
    if overrides.is_empty() {
        embed = embed.description("No Guild permissions set.");
    }
    for (command, roles) in overrides.iter() {
        let mentions: Vec<String> = roles.iter().map(|id| embeds::role_mention(*id)).collect();
        // Rows for commands that no longer exist are still shown so they can be removed.
        let label = match OverrideScope::from_key(command) {
            Some(scope) => format!("/{}", scope.key()),
            None => format!("{} (unknown command)", command),
        };
        embed = embed.field(label, mentions.join(", "), false);
    }

    ctx.send(embeds::reply(embed)).await?;
    Ok(())
}

/// Let a role use a command.
#[poise::command(slash_command, guild_only)]
pub async fn addperm(
    ctx: Context<'_>,
    #[description = "Command to grant"] command: ScopeChoice,
    #[description = "Role to grant it to"] role: serenity::Role,
) -> Result<(), Error> {
    ctx.defer().await?;
    if !auth::check(ctx, GuardedCommand::Config).await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();
    let scope = OverrideScope::from(command);
    ctx.data()
        .permissions
        .set_override(guild_id, scope.key(), role.id.get())
        .await?;

    let embed = embeds::info(
        "Permission added",
        format!(
            "{} can now use `/{}`.",
            embeds::role_mention(role.id.get()),
            scope.key()
        ),
    );
    ctx.send(embeds::reply(embed)).await?;
    Ok(())
}

/// Stop a role from using a command.
#[poise::command(slash_command, guild_only)]
pub async fn removeperm(
    ctx: Context<'_>,
    #[description = "Command to revoke"] command: ScopeChoice,
    #[description = "Role to revoke it from"] role: serenity::Role,
) -> Result<(), Error> {
    ctx.defer().await?;
    if !auth::check(ctx, GuardedCommand::Config).await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();
    let scope = OverrideScope::from(command);

    let embed = match ctx
        .data()
        .permissions
        .revoke_override(guild_id, scope.key(), role.id.get())
        .await
    {
        Ok(()) => embeds::info(
            "Permission removed",
            format!(
                "{} can no longer use `/{}`.",
                embeds::role_mention(role.id.get()),
                scope.key()
            ),
        ),
        Err(err @ PermissionError::OverrideNotFound(_))
        | Err(err @ PermissionError::RoleNotGranted { .. }) => {
            embeds::denied("Nothing to remove", err.to_string())
        }
        Err(err) => return Err(err.into()),
    };

    ctx.send(embeds::reply(embed)).await?;
    Ok(())
}

/// Set the role given to isolated members.
#[poise::command(slash_command, guild_only)]
pub async fn setisolationrole(
    ctx: Context<'_>,
    #[description = "Role given to isolated members"] role: serenity::Role,
) -> Result<(), Error> {
    ctx.defer().await?;
    if !auth::check(ctx, GuardedCommand::Config).await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();
    let role_id = role.id.get();

    if role_id == guild_id {
        let embed = embeds::denied("Invalid role", "The @everyone role can't be the isolation role.");
        ctx.send(embeds::reply(embed)).await?;
        return Ok(());
    }

    // The bot can only grant roles below its own highest role.
    let gateway = SerenityGateway::new(ctx.serenity_context().http.clone());
    let bot_id = ctx.framework().bot_id.get();
    let guild_roles = gateway.guild_roles(guild_id).await?;
    let bot_roles = gateway
        .member(guild_id, bot_id)
        .await?
        .map(|m| m.roles)
        .unwrap_or_default();
    if !outranks(highest_rank(&bot_roles, &guild_roles), Some(role.position)) {
        let embed = embeds::denied(
            "Role too high",
            format!(
                "{} is at or above my highest role, so I couldn't assign it. Move my role above it first.",
                embeds::role_mention(role_id)
            ),
        );
        ctx.send(embeds::reply(embed)).await?;
        return Ok(());
    }

    ctx.data()
        .permissions
        .set_isolation_role(guild_id, role_id)
        .await?;
    info!(guild_id, role_id, "Isolation role set");

    let embed = embeds::info(
        "Isolation role set",
        format!("Isolated members will be given {}.", embeds::role_mention(role_id)),
    );
    ctx.send(embeds::reply(embed)).await?;
    Ok(())
}

/// Set the channel `/log` posts to.
#[poise::command(slash_command, guild_only)]
pub async fn setlogchannel(
    ctx: Context<'_>,
    #[description = "Channel for moderator action logs"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    ctx.defer().await?;
    if !auth::check(ctx, GuardedCommand::Config).await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?.get();
    let channel_id = channel.id.get();
    ctx.data()
        .permissions
        .set_log_channel(guild_id, channel_id)
        .await?;
    info!(guild_id, channel_id, "Log channel set");

    let embed = embeds::info(
        "Log channel set",
        format!("Moderator actions will be logged in <#{}>.", channel_id),
    );
    ctx.send(embeds::reply(embed)).await?;
    Ok(())
}
