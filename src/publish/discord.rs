use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{receipt_from_success, reject_unless_success, transport, PublishReceipt, PublishTarget, PUBLISH_TIMEOUT};
use crate::error::PublishError;
use crate::validate::Post;

/// Posts to a Discord channel webhook as one embed. `?wait=true` makes Discord
/// answer with the created message so its id can be reported.
#[derive(Clone)]
pub struct DiscordWebhookPublisher {
    webhook: String,
    client: Client,
    timeout: Duration,
}

impl DiscordWebhookPublisher {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: PUBLISH_TIMEOUT,
        }
    }

    fn url(&self) -> String {
        if self.webhook.contains('?') {
            format!("{}&wait=true", self.webhook)
        } else {
            format!("{}?wait=true", self.webhook)
        }
    }
}

#[derive(Serialize)]
struct DiscordImage {
    url: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<DiscordImage>,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_post(post: &Post) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                description: post.text.clone(),
                image: post.media_url.clone().map(|url| DiscordImage { url }),
            }],
        }
    }
}

#[derive(Deserialize)]
struct DiscordMessage {
    id: String,
}

#[async_trait::async_trait]
impl PublishTarget for DiscordWebhookPublisher {
    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PublishError> {
        if self.webhook.trim().is_empty() {
            return Err(PublishError::NotConfigured("DISCORD_WEBHOOK_URL".into()));
        }
        let payload = DiscordWebhookPayload::from_post(post);
        let rsp = self
            .client
            .post(self.url())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;
        let rsp = reject_unless_success(rsp).await?;
        let receipt = receipt_from_success("discord", rsp, |m: DiscordMessage| m.id).await;
        tracing::info!(id = %receipt.id, "posted to discord");
        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
