// Discord commands for the isolation workflow.
//
// Same pattern as every command file:
// 1. Check the caller is allowed
// 2. Call the core service with plain IDs
// 3. Render the outcome as a single embed

use crate::core::isolation::{ErrorKind, IsolationError, IsolationRequest};
use crate::core::permissions::GuardedCommand;
use crate::discord::gateway::SerenityGateway;
use crate::discord::{auth, embeds, Context, Error};
use poise::serenity_prelude as serenity;
use tracing::error;

/// Remove a member's roles and give them the isolation role.
#[poise::command(slash_command, guild_only)]
pub async fn isolate(
    ctx: Context<'_>,
    #[description = "The user to isolate"] user: serenity::User,
) -> Result<(), Error> {
    ctx.defer().await?;
    if !auth::check(ctx, GuardedCommand::Isolate).await? {
        return Ok(());
    }

    let request = build_request(ctx, &user)?;
    let gateway = SerenityGateway::new(ctx.serenity_context().http.clone());

    let embed = match ctx.data().isolation.isolate(&gateway, &request).await {
        Ok(report) => embeds::isolation_report(
            "User isolated",
            format!("<@{}> has been isolated.", user.id),
            &report,
        ),
        Err(err) => failure_embed(ctx, "isolate", &request, &err),
    };

    ctx.send(embeds::reply(embed)).await?;
    Ok(())
}

/// Give an isolated member their saved roles back.
#[poise::command(slash_command, guild_only)]
pub async fn restore(
    ctx: Context<'_>,
    #[description = "The user to restore"] user: serenity::User,
) -> Result<(), Error> {
    ctx.defer().await?;
    if !auth::check(ctx, GuardedCommand::Restore).await? {
        return Ok(());
    }

    let request = build_request(ctx, &user)?;
    let gateway = SerenityGateway::new(ctx.serenity_context().http.clone());

    let embed = match ctx.data().isolation.restore(&gateway, &request).await {
        Ok(report) => embeds::isolation_report(
            "User restored",
            format!("<@{}> has been restored.", user.id),
            &report,
        ),
        Err(err) => failure_embed(ctx, "restore", &request, &err),
    };

    ctx.send(embeds::reply(embed)).await?;
    Ok(())
}

fn build_request(ctx: Context<'_>, user: &serenity::User) -> Result<IsolationRequest, Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    Ok(IsolationRequest {
        guild_id: guild_id.get(),
        issuer_id: ctx.author().id.get(),
        target_id: user.id.get(),
        bot_id: ctx.framework().bot_id.get(),
    })
}

/// Faults are logged and escalated; everything else is just shown.
fn failure_embed(
    ctx: Context<'_>,
    operation: &str,
    request: &IsolationRequest,
    err: &IsolationError,
) -> serenity::CreateEmbed {
    if err.kind() == ErrorKind::Fault {
        error!(
            guild_id = request.guild_id,
            user_id = request.target_id,
            "Failed to {} user: {}",
            operation,
            err
        );
        ctx.data().escalate(format!(
            "`/{}` failed in guild {} for user {} (issued by {}): {}",
            operation, request.guild_id, request.target_id, request.issuer_id, err
        ));
    }
    embeds::isolation_error(err)
}
