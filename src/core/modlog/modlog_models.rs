use std::fmt;

pub const MISSING_REASON: &str = "*Reason not provided, and should be included below.*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModAction {
    VerbalWarn,
    BotWarn,
    Timeout,
    Isolate,
    Kick,
    Ban,
    Other,
}

impl ModAction {
    /// Stable identifier shown in the log embed.
    pub fn key(&self) -> &'static str {
        match self {
            ModAction::VerbalWarn => "verbal_warn",
            ModAction::BotWarn => "bot_warn",
            ModAction::Timeout => "timeout",
            ModAction::Isolate => "isolate",
            ModAction::Kick => "kick",
            ModAction::Ban => "ban",
            ModAction::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModAction::VerbalWarn => "Verbal Warning",
            ModAction::BotWarn => "Bot Warning",
            ModAction::Timeout => "Timeout",
            ModAction::Isolate => "Isolate",
            ModAction::Kick => "Kick",
            ModAction::Ban => "Permanent Ban",
            ModAction::Other => "Other",
        }
    }

    /// Embed colour as 0xRRGGBB.
    pub fn color(&self) -> u32 {
        match self {
            ModAction::VerbalWarn | ModAction::BotWarn => 0xFFFF00, // Yellow
            ModAction::Timeout | ModAction::Isolate => 0xFFA500,    // Orange
            ModAction::Kick | ModAction::Ban => 0xFF0000,           // Red
            ModAction::Other => 0x0000FF,                           // Blue
        }
    }
}

impl fmt::Display for ModAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One moderator action, ready to be posted to the guild's log channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModLogEntry {
    pub guild_id: u64,
    pub moderator_id: u64,
    pub target_id: u64,
    pub action: ModAction,
    pub reason: Option<String>,
}

impl ModLogEntry {
    pub fn reason_text(&self) -> &str {
        match self.reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => reason,
            _ => MISSING_REASON,
        }
    }

    /// Plain message content sent alongside the embed so the log is searchable by ID.
    pub fn search_line(&self) -> String {
        format!("User ID: {}", self.target_id)
    }
}
