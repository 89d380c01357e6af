// Resolve the invoking member and run the authorization engine.

use crate::core::permissions::{AuthDecision, Capabilities, GuardedCommand, Invoker};
use crate::discord::{embeds, Context, Error};
use poise::serenity_prelude as serenity;
use tracing::debug;

/// Build an `Invoker` from the interaction member and the guild's roles.
pub async fn invoker(ctx: Context<'_>, guild_id: serenity::GuildId) -> Result<Invoker, Error> {
    let member = ctx
        .author_member()
        .await
        .ok_or("Could not resolve your server membership")?;
    let guild_roles = guild_id.roles(ctx.http()).await?;

    // Permissions granted by @everyone plus each of the member's roles.
    let role_permissions = member
        .roles
        .iter()
        .chain(std::iter::once(&guild_id.everyone_role()))
        .filter_map(|id| guild_roles.get(id))
        .fold(serenity::Permissions::empty(), |acc, role| acc | role.permissions);

    // Interactions carry the resolved channel permissions; fall back to roles.
    let native = member.permissions.unwrap_or(role_permissions);

    Ok(Invoker {
        user_id: member.user.id.get(),
        roles: member.roles.iter().map(|id| id.get()).collect(),
        capabilities: Capabilities {
            manage_roles: native.manage_roles(),
            manage_messages: native.manage_messages(),
            administrator: role_permissions.administrator(),
        },
    })
}

/// Returns `true` when the command may proceed. On denial the reply has
/// already been sent.
pub async fn check(ctx: Context<'_>, command: GuardedCommand) -> Result<bool, Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let invoker = invoker(ctx, guild_id).await?;

    let decision = ctx
        .data()
        .permissions
        .authorize(guild_id.get(), &invoker, command)
        .await?;

    match decision {
        AuthDecision::Allow(reason) => {
            debug!(
                guild_id = guild_id.get(),
                user_id = invoker.user_id,
                command = command.name(),
                ?reason,
                "Command authorized"
            );
            Ok(true)
        }
        AuthDecision::Deny { missing } => {
            let embed = embeds::denied(
                "Ayo, you can't do that!",
                format!(
                    "You need the **{}** permission (or a role an admin has granted `{}`) to use `/{}`.",
                    missing,
                    command.scope().key(),
                    command.name()
                ),
            );
            ctx.send(embeds::reply(embed)).await?;
            Ok(false)
        }
    }
}
