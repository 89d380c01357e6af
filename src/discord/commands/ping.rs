use crate::discord::{embeds, Context, Error};

/// Check that the bot is alive and show gateway latency.
#[poise::command(slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let latency = ctx.ping().await;
    let description = if latency.is_zero() {
        "Pong! Latency hasn't been measured yet.".to_string()
    } else {
        format!("Pong! Gateway latency: {}ms", latency.as_millis())
    };

    ctx.send(embeds::reply(embeds::info("Ping", description)))
        .await?;
    Ok(())
}
