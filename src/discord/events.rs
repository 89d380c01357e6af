// Non-command event handling: rejoins, DM relay and the operator `refresh`.

use crate::discord::commands;
use crate::core::isolation::IsolationReport;
use crate::discord::embeds::{role_change_line, role_mention, truncate};
use crate::discord::gateway::SerenityGateway;
use crate::discord::{supervisor, Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

/// Dispatch a gateway event. Work that talks to Discord runs in its own
/// supervised task so a panic there can't take the shard down.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if new_member.user.bot {
                return Ok(());
            }
            let ctx = ctx.clone();
            let member = new_member.clone();
            supervisor::spawn_supervised(data.clone(), "member join", {
                let data = data.clone();
                async move { handle_member_join(&ctx, &data, &member).await }
            });
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            debug!(guild_id = guild_id.get(), user_id = user.id.get(), "Member left");
        }
        serenity::FullEvent::Message { new_message } => {
            if new_message.author.bot {
                return Ok(());
            }
            if new_message.guild_id.is_none() {
                relay_direct_message(data, new_message);
            } else if is_refresh_request(data, new_message) {
                let ctx = ctx.clone();
                let message = new_message.clone();
                let commands = commands::all();
                let dev_guild_id = data.dev_guild_id;
                info!("Command refresh requested from the operator channel");
                supervisor::spawn_supervised(data.clone(), "refresh", async move {
                    refresh_commands(&ctx, &message, &commands, dev_guild_id).await
                });
            }
        }
        _ => {}
    }

    Ok(())
}

/// Re-isolate a member who left while isolated and came back.
async fn handle_member_join(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) -> Result<(), Error> {
    let guild_id = member.guild_id.get();
    let user_id = member.user.id.get();
    let roles: Vec<u64> = member.roles.iter().map(|id| id.get()).collect();
    let gateway = SerenityGateway::new(ctx.http.clone());

    let report = match data
        .isolation
        .reapply_on_join(&gateway, guild_id, user_id, &roles)
        .await?
    {
        Some(report) => report,
        None => return Ok(()),
    };

    info!(guild_id, user_id, "Isolated member rejoined; isolation reapplied");
    if let Some(message) = rejoin_escalation(&report) {
        warn!(guild_id, user_id, "Some roles could not be removed on rejoin");
        data.escalate(message);
    }
    Ok(())
}

/// Operator message for a rejoin that left roles behind, if any did.
fn rejoin_escalation(report: &IsolationReport) -> Option<String> {
    let failures: Vec<String> = report.failures().map(role_change_line).collect();
    if failures.is_empty() {
        return None;
    }
    Some(format!(
        "Re-isolating <@{}> in guild {} left roles behind (isolation role {}):\n{}",
        report.user_id,
        report.guild_id,
        role_mention(report.isolation_role),
        failures.join("\n")
    ))
}

fn relay_direct_message(data: &Data, message: &serenity::Message) {
    let mut text = format!(
        "DM from {} (`{}`): {}",
        message.author.name, message.author.id, message.content
    );
    for attachment in &message.attachments {
        text.push_str(&format!("\n{}", attachment.url));
    }
    info!(user_id = message.author.id.get(), "Relaying direct message");
    data.escalate(truncate(&text, 2000));
}

fn is_refresh_request(data: &Data, message: &serenity::Message) -> bool {
    let Some(operator) = &data.operator else {
        return false;
    };
    message.channel_id.get() == operator.channel_id() && is_refresh_text(&message.content)
}

fn is_refresh_text(content: &str) -> bool {
    content.trim().eq_ignore_ascii_case("refresh")
}

async fn refresh_commands(
    ctx: &serenity::Context,
    message: &serenity::Message,
    commands: &[poise::Command<Data, Error>],
    dev_guild_id: Option<u64>,
) -> Result<(), Error> {
    let reply = match commands::register(&ctx.http, commands, dev_guild_id).await {
        Ok(()) => {
            info!(count = commands.len(), "Commands re-registered");
            format!("Refreshed {} commands.", commands.len())
        }
        Err(e) => {
            warn!("Failed to re-register commands: {}", e);
            format!("Refresh failed: {}", e)
        }
    };
    message.reply(&ctx.http, reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::isolation::{RoleAction, RoleChange};

    #[test]
    fn test_refresh_text_is_case_insensitive() {
        assert!(is_refresh_text("refresh"));
        assert!(is_refresh_text("  REFRESH \n"));
        assert!(!is_refresh_text("refresh now"));
        assert!(!is_refresh_text(""));
    }

    fn rejoin_report(outcome: Result<(), String>) -> IsolationReport {
        IsolationReport {
            guild_id: 1,
            user_id: 20,
            isolation_role: 50,
            changes: vec![RoleChange {
                role_id: 32,
                action: RoleAction::Removed,
                outcome,
            }],
        }
    }

    #[test]
    fn test_rejoin_escalation_names_member_and_failed_roles() {
        assert_eq!(rejoin_escalation(&rejoin_report(Ok(()))), None);

        let message = rejoin_escalation(&rejoin_report(Err("Missing Permissions".into())))
            .expect("failed removal should be escalated");
        assert_eq!(
            message,
            "Re-isolating <@20> in guild 1 left roles behind (isolation role <@&50>):\n\
             Failed to remove <@&32>: Missing Permissions"
        );
    }
}
