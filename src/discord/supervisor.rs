// Per-unit-of-work supervision.
//
// A failing or panicking event task or command is logged, escalated to the
// operator channel and dropped. The rest of the bot keeps running; nothing
// here restarts the process.

use crate::discord::{embeds, Data, Error};
use std::future::Future;
use tracing::error;

/// Run `work` on its own task and report any error or panic.
pub fn spawn_supervised<F>(data: Data, label: &'static str, work: F)
where
    F: Future<Output = Result<(), Error>> + Send + 'static,
{
    let handle = tokio::spawn(work);
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(task = label, "Event handler failed: {}", e);
                data.escalate(format!("Error while handling {}: {}", label, e));
            }
            Err(join_err) if join_err.is_panic() => {
                error!(task = label, "Event handler panicked");
                data.escalate(format!("Handler for {} panicked and was dropped.", label));
            }
            Err(join_err) => {
                error!(task = label, "Event handler was cancelled: {}", join_err);
            }
        }
    });
}

/// Framework error hook: generic reply to the user plus operator escalation
/// for command faults; everything else goes to poise's default handler.
pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start the bot: {}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let command = ctx.command().qualified_name.clone();
            error!(command = %command, "Command failed: {}", error);
            ctx.data().escalate(format!(
                "`/{}` failed in guild {:?} (user {}): {}",
                command,
                ctx.guild_id().map(|id| id.get()),
                ctx.author().id,
                error
            ));
            send_generic_failure(ctx).await;
        }
        poise::FrameworkError::CommandPanic { payload, ctx, .. } => {
            let command = ctx.command().qualified_name.clone();
            let payload = payload.unwrap_or_else(|| "unknown panic".to_string());
            error!(command = %command, "Command panicked: {}", payload);
            ctx.data().escalate(format!(
                "`/{}` panicked and was dropped: {}",
                command, payload
            ));
            send_generic_failure(ctx).await;
        }
        poise::FrameworkError::EventHandler { error, .. } => {
            error!("Event handler failed: {}", error);
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

async fn send_generic_failure(ctx: crate::discord::Context<'_>) {
    let reply = embeds::reply(embeds::error(embeds::GENERIC_FAILURE)).ephemeral(true);
    if let Err(e) = ctx.send(reply).await {
        error!("Failed to send error reply: {}", e);
    }
}
