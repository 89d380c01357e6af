// Operator channel: fault escalations, DM relays and startup notices.

use crate::core::notify::{NotifyError, OperatorChannel, OperatorNotifier};
use crate::discord::embeds::truncate;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::error;

// Discord rejects message content longer than this.
const MAX_MESSAGE_LEN: usize = 2000;

pub struct DiscordOperatorChannel {
    http: Arc<serenity::Http>,
    channel_id: serenity::ChannelId,
}

#[async_trait]
impl OperatorChannel for DiscordOperatorChannel {
    async fn post(&self, message: &str) -> Result<(), String> {
        self.channel_id
            .say(&self.http, truncate(message, MAX_MESSAGE_LEN))
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Operator channel plus the retrying notifier that writes to it.
pub struct OperatorLink {
    channel: Arc<DiscordOperatorChannel>,
    notifier: Arc<OperatorNotifier>,
}

impl OperatorLink {
    pub fn new(http: Arc<serenity::Http>, channel_id: u64, notifier: Arc<OperatorNotifier>) -> Self {
        Self {
            channel: Arc::new(DiscordOperatorChannel {
                http,
                channel_id: serenity::ChannelId::new(channel_id),
            }),
            notifier,
        }
    }

    pub fn channel_id(&self) -> u64 {
        self.channel.channel_id.get()
    }

    /// Deliver in the background so the calling handler isn't held up by retries.
    pub fn escalate(&self, message: String) {
        let channel = Arc::clone(&self.channel);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(channel.as_ref(), &message).await {
                error!("Dropped operator notification: {}", e);
            }
        });
    }

    pub async fn send(&self, message: &str) -> Result<(), NotifyError> {
        self.notifier.deliver(self.channel.as_ref(), message).await
    }
}
