// Discord commands module.
// Each feature gets its own command file.

use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

pub mod config;
pub mod help;
pub mod isolation;
pub mod modlog;
pub mod ping;

/// Every slash command the bot exposes.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        ping::ping(),
        help::help(),
        isolation::isolate(),
        isolation::restore(),
        config::config(),
        modlog::log(),
        modlog::elog(),
    ]
}

/// Register commands globally, or only in `dev_guild_id` for instant updates
/// while developing.
pub async fn register(
    http: impl AsRef<serenity::Http>,
    commands: &[poise::Command<Data, Error>],
    dev_guild_id: Option<u64>,
) -> Result<(), serenity::Error> {
    match dev_guild_id {
        Some(guild_id) => {
            poise::builtins::register_in_guild(http, commands, serenity::GuildId::new(guild_id))
                .await
        }
        None => poise::builtins::register_globally(http, commands).await,
    }
}
