// Embed builders shared by every command.
//
// Colours: info = deep sky blue, denial = orange, error = red.

use crate::core::isolation::{ErrorKind, IsolationError, IsolationReport, RoleAction, RoleChange};
use crate::core::modlog::ModLogEntry;
use poise::serenity_prelude as serenity;

pub const INFO_COLOR: u32 = 0x00BFFF;
pub const DENIED_COLOR: u32 = 0xFFA500;
pub const ERROR_COLOR: u32 = 0xFF0000;

pub const GENERIC_FAILURE: &str =
    "Something went wrong while handling that. The bot operator has been notified.";

pub fn info(title: impl Into<String>, description: impl Into<String>) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .color(INFO_COLOR)
}

pub fn denied(title: impl Into<String>, description: impl Into<String>) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .color(DENIED_COLOR)
}

pub fn error(description: impl Into<String>) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("Error")
        .description(description)
        .color(ERROR_COLOR)
        .timestamp(serenity::Timestamp::now())
}

pub fn reply(embed: serenity::CreateEmbed) -> poise::CreateReply {
    poise::CreateReply::default().embed(embed)
}

pub fn role_mention(role_id: u64) -> String {
    format!("<@&{}>", role_id)
}

/// One line per live role mutation, e.g. "Removed <@&31>".
pub fn role_change_line(change: &RoleChange) -> String {
    let role = role_mention(change.role_id);
    match (&change.outcome, change.action) {
        (Ok(()), RoleAction::Removed) => format!("Removed {}", role),
        (Ok(()), RoleAction::Restored) => format!("Restored {}", role),
        (Ok(()), RoleAction::IsolationLifted) => format!("Removed isolation role {}", role),
        (Err(e), RoleAction::Removed) => format!("Failed to remove {}: {}", role, e),
        (Err(e), RoleAction::Restored) => format!("Failed to restore {}: {}", role, e),
        (Err(e), RoleAction::IsolationLifted) => {
            format!("Failed to remove isolation role {}: {}", role, e)
        }
    }
}

pub fn isolation_report(title: &str, summary: String, report: &IsolationReport) -> serenity::CreateEmbed {
    let mut lines: Vec<String> = report.changes.iter().map(role_change_line).collect();
    if lines.is_empty() {
        lines.push("No roles to change.".to_string());
    }

    let failures = report.failures().count();
    let color = if failures == 0 { INFO_COLOR } else { DENIED_COLOR };

    let mut embed = serenity::CreateEmbed::new()
        .title(title)
        .description(summary)
        .color(color)
        .field("Member", format!("<@{}>", report.user_id), true)
        .field("Isolation role", role_mention(report.isolation_role), true)
        .field("Roles", truncate(&lines.join("\n"), 1024), false)
        .timestamp(serenity::Timestamp::now());

    if failures > 0 {
        embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
            "{} role change(s) failed; check my role position and permissions.",
            failures
        )));
    }
    embed
}

/// Expected refusals render as denials; faults get the generic message.
pub fn isolation_error(err: &IsolationError) -> serenity::CreateEmbed {
    match err.kind() {
        ErrorKind::Configuration => denied("Not configured", err.to_string()),
        ErrorKind::Denial => denied("Ayo, you can't do that!", err.to_string()),
        ErrorKind::Fault => error(GENERIC_FAILURE),
    }
}

pub fn mod_log_entry(entry: &ModLogEntry) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("Moderator Action Log")
        .description(format!(
            "Moderator <@{}> took action on <@{}> `{}`",
            entry.moderator_id, entry.target_id, entry.target_id
        ))
        .color(entry.action.color())
        .field("Action", entry.action.label(), true)
        .field("Reason", truncate(entry.reason_text(), 1024), true)
        .footer(serenity::CreateEmbedFooter::new(
            "Further details and file attachments may be added below",
        ))
        .timestamp(serenity::Timestamp::now())
}

/// Cut `text` to at most `max` characters, marking the cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_change_lines() {
        let removed = RoleChange {
            role_id: 31,
            action: RoleAction::Removed,
            outcome: Ok(()),
        };
        let failed = RoleChange {
            role_id: 32,
            action: RoleAction::Restored,
            outcome: Err("Missing Permissions".to_string()),
        };

        assert_eq!(role_change_line(&removed), "Removed <@&31>");
        assert_eq!(
            role_change_line(&failed),
            "Failed to restore <@&32>: Missing Permissions"
        );
    }

    #[test]
    fn test_truncate_respects_limit() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate(&"x".repeat(2000), 1024);
        assert_eq!(cut.chars().count(), 1024);
        assert!(cut.ends_with("..."));
    }
}
