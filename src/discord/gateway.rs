// Serenity-backed implementations of the core platform ports.

use crate::core::isolation::{GatewayError, MemberGateway, MemberSnapshot, RoleRank};
use crate::core::modlog::{ModLogEntry, ModLogSink};
use crate::discord::embeds;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

const AUDIT_REASON: &str = "shieldbot isolation";

pub struct SerenityGateway {
    http: Arc<serenity::Http>,
}

impl SerenityGateway {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

fn is_not_found(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(http_err) => http_err
            .status_code()
            .is_some_and(|status| status.as_u16() == 404),
        _ => false,
    }
}

fn to_gateway_error(err: serenity::Error) -> GatewayError {
    if is_not_found(&err) {
        GatewayError::NotFound
    } else {
        GatewayError::Api(err.to_string())
    }
}

#[async_trait]
impl MemberGateway for SerenityGateway {
    async fn member(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<MemberSnapshot>, GatewayError> {
        match self
            .http
            .get_member(serenity::GuildId::new(guild_id), serenity::UserId::new(user_id))
            .await
        {
            Ok(member) => Ok(Some(MemberSnapshot {
                user_id,
                roles: member.roles.iter().map(|id| id.get()).collect(),
            })),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(GatewayError::Api(e.to_string())),
        }
    }

    async fn guild_roles(&self, guild_id: u64) -> Result<Vec<RoleRank>, GatewayError> {
        let roles = self
            .http
            .get_guild_roles(serenity::GuildId::new(guild_id))
            .await
            .map_err(to_gateway_error)?;

        Ok(roles
            .iter()
            .map(|role| RoleRank {
                id: role.id.get(),
                rank: role.position,
            })
            .collect())
    }

    async fn add_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), GatewayError> {
        self.http
            .add_member_role(
                serenity::GuildId::new(guild_id),
                serenity::UserId::new(user_id),
                serenity::RoleId::new(role_id),
                Some(AUDIT_REASON),
            )
            .await
            .map_err(to_gateway_error)
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), GatewayError> {
        self.http
            .remove_member_role(
                serenity::GuildId::new(guild_id),
                serenity::UserId::new(user_id),
                serenity::RoleId::new(role_id),
                Some(AUDIT_REASON),
            )
            .await
            .map_err(to_gateway_error)
    }
}

#[async_trait]
impl ModLogSink for SerenityGateway {
    async fn publish(&self, channel_id: u64, entry: &ModLogEntry) -> Result<(), String> {
        // The plain-text ID line keeps log messages searchable.
        let message = serenity::CreateMessage::new()
            .content(entry.search_line())
            .embed(embeds::mod_log_entry(entry));

        serenity::ChannelId::new(channel_id)
            .send_message(&self.http, message)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
