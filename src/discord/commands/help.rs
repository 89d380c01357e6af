use crate::discord::{embeds, Context, Error};

// (group, commands) in the order they are shown.
const GROUPS: &[(&str, &str)] = &[
    ("General", "`/ping` - check the bot is alive\n`/help` - this message"),
    (
        "Isolation",
        "`/isolate <user>` - remove a member's roles and give them the isolation role\n\
         `/restore <user>` - give an isolated member their roles back",
    ),
    (
        "Mod log",
        "`/log <user> <action> [reason]` - record an action in the log channel\n\
         `/elog <user id> <action> [reason]` - same, for users no longer in the server",
    ),
    (
        "Configuration (admin)",
        "`/config viewperms` - list command overrides\n\
         `/config addperm <command> <role>` - let a role use a command\n\
         `/config removeperm <command> <role>` - take that back\n\
         `/config setisolationrole <role>` - role given to isolated members\n\
         `/config setlogchannel <channel>` - where `/log` posts",
    ),
];

/// Show what the bot can do.
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let mut embed = embeds::info(
        "shieldbot commands",
        "Moderator tools for isolating members and keeping a mod log.",
    );
    for (group, commands) in GROUPS {
        embed = embed.field(*group, *commands, false);
    }

    ctx.send(embeds::reply(embed)).await?;
    Ok(())
}
