use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{receipt_from_success, reject_unless_success, transport, PublishReceipt, PublishTarget, PUBLISH_TIMEOUT};
use crate::error::PublishError;
use crate::validate::Post;

/// `POST {base}/api/v1/statuses` with a bearer token. Text only; media is not uploaded.
#[derive(Clone)]
pub struct MastodonPublisher {
    base_url: String,
    access_token: String,
    client: Client,
    timeout: Duration,
}

impl MastodonPublisher {
    pub fn new(base_url: &str, access_token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            client: Client::new(),
            timeout: PUBLISH_TIMEOUT,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/v1/statuses", self.base_url)
    }
}

#[derive(Serialize)]
struct StatusReq<'a> {
    status: &'a str,
    visibility: &'a str,
}

#[derive(Deserialize)]
struct StatusResp {
    id: String,
}

#[async_trait::async_trait]
impl PublishTarget for MastodonPublisher {
    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PublishError> {
        if self.base_url.is_empty() {
            return Err(PublishError::NotConfigured("MASTODON_BASE_URL".into()));
        }
        if self.access_token.trim().is_empty() {
            return Err(PublishError::NotConfigured("MASTODON_ACCESS_TOKEN".into()));
        }
        let body = StatusReq {
            status: &post.text,
            visibility: "public",
        };
        let rsp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.access_token)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let rsp = reject_unless_success(rsp).await?;
        let receipt = receipt_from_success("mastodon", rsp, |s: StatusResp| s.id).await;
        tracing::info!(id = %receipt.id, "posted to mastodon");
        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "mastodon"
    }
}
