//! Publish targets. A post is handed over exactly once; no target retries.

pub mod discord;
pub mod dryrun;
pub mod mastodon;
pub(crate) mod oauth1;
pub mod x;

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::PublishError;
use crate::validate::Post;

pub use discord::DiscordWebhookPublisher;
pub use dryrun::DryRunPublisher;
pub use mastodon::MastodonPublisher;
pub use x::{XCredentials, XPublisher};

/// Identifier the target assigned to the published post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub id: String,
}

#[async_trait::async_trait]
pub trait PublishTarget: Send + Sync {
    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PublishError>;
    fn name(&self) -> &'static str;
}

pub(crate) const PUBLISH_TIMEOUT: Duration = Duration::from_secs(15);

/// Map a response to `Rejected` unless it is 2xx. Body is cut to 300 chars.
pub(crate) async fn reject_unless_success(rsp: reqwest::Response) -> Result<reqwest::Response, PublishError> {
    let status = rsp.status();
    if status.is_success() {
        return Ok(rsp);
    }
    let body = rsp.text().await.unwrap_or_default();
    Err(PublishError::Rejected(
        status.as_u16(),
        body.chars().take(300).collect(),
    ))
}

/// Receipt id used when a target accepted the post but its reply had no readable id.
pub const UNKNOWN_POST_ID: &str = "unknown";

/// Read the id out of a 2xx reply. The post is already out at this point, so an
/// unreadable body is logged and reported as [`UNKNOWN_POST_ID`], never as a failure.
pub(crate) async fn receipt_from_success<T: DeserializeOwned>(
    publisher: &'static str,
    rsp: reqwest::Response,
    id: impl FnOnce(T) -> String,
) -> PublishReceipt {
    let status = rsp.status().as_u16();
    let body = match rsp.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(publisher, status, error = %e, "published; reply body unreadable");
            String::new()
        }
    };
    receipt_from_body(publisher, status, &body, id)
}

pub(crate) fn receipt_from_body<T: DeserializeOwned>(
    publisher: &'static str,
    status: u16,
    body: &str,
    id: impl FnOnce(T) -> String,
) -> PublishReceipt {
    match serde_json::from_str::<T>(body) {
        Ok(reply) => PublishReceipt { id: id(reply) },
        Err(e) => {
            warn!(publisher, status, error = %e, "published; reply carried no id");
            PublishReceipt {
                id: UNKNOWN_POST_ID.to_string(),
            }
        }
    }
}

pub(crate) fn transport(e: reqwest::Error) -> PublishError {
    PublishError::Transport(e.to_string())
}
