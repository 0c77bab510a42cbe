use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::oauth1::{self, Credentials};
use super::{receipt_from_success, reject_unless_success, transport, PublishReceipt, PublishTarget, PUBLISH_TIMEOUT};
use crate::error::PublishError;
use crate::validate::Post;

const TWEETS_URL: &str = "https://api.twitter.com/2/tweets";
const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";
const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const IMAGE_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
/// Upload limit for still images.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// User-context keys for the X API.
#[derive(Clone, Default)]
pub struct XCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl XCredentials {
    /// Name of the first missing key's environment variable.
    pub fn missing(&self) -> Option<&'static str> {
        [
            (&self.api_key, "X_API_KEY"),
            (&self.api_secret, "X_API_SECRET"),
            (&self.access_token, "X_ACCESS_TOKEN"),
            (&self.access_token_secret, "X_ACCESS_TOKEN_SECRET"),
        ]
        .into_iter()
        .find(|(v, _)| v.trim().is_empty())
        .map(|(_, name)| name)
    }

    fn oauth(&self) -> Credentials {
        Credentials {
            consumer_key: self.api_key.clone(),
            consumer_secret: self.api_secret.clone(),
            token: self.access_token.clone(),
            token_secret: self.access_token_secret.clone(),
        }
    }
}

impl fmt::Debug for XCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = |v: &String| if v.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("XCredentials")
            .field("api_key", &shown(&self.api_key))
            .field("api_secret", &shown(&self.api_secret))
            .field("access_token", &shown(&self.access_token))
            .field("access_token_secret", &shown(&self.access_token_secret))
            .finish()
    }
}

/// Posts through `POST /2/tweets`. An image is uploaded first via the v1.1 media
/// endpoint; any image problem degrades to a text-only post.
#[derive(Clone)]
pub struct XPublisher {
    creds: XCredentials,
    client: Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct TweetMedia {
    media_ids: Vec<String>,
}

#[derive(Serialize)]
struct TweetReq<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<TweetMedia>,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Deserialize)]
struct TweetResp {
    data: TweetData,
}

#[derive(Deserialize)]
struct MediaResp {
    media_id_string: String,
}

/// Query and fragment dropped; feeds often append resize or tracking parameters.
fn clean_image_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].trim()
}

impl XPublisher {
    pub fn new(creds: XCredentials) -> Self {
        Self {
            creds,
            client: Client::new(),
            timeout: PUBLISH_TIMEOUT,
        }
    }

    fn auth(&self, method: &str, url: &str) -> Result<String, PublishError> {
        oauth1::authorization_header(
            method,
            url,
            &[],
            &self.creds.oauth(),
            &oauth1::nonce(),
            Utc::now().timestamp(),
        )
    }

    fn tweet_body<'a>(post: &'a Post, media_id: Option<String>) -> TweetReq<'a> {
        TweetReq {
            text: &post.text,
            media: media_id.map(|id| TweetMedia { media_ids: vec![id] }),
        }
    }

    /// HEAD must answer 200 before the image is fetched.
    async fn image_reachable(&self, url: &str) -> bool {
        match self.client.head(url).timeout(IMAGE_CHECK_TIMEOUT).send().await {
            Ok(rsp) => rsp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "image HEAD failed");
                false
            }
        }
    }

    async fn upload_image(&self, media_url: &str) -> Result<Option<String>, PublishError> {
        let url = clean_image_url(media_url);
        if url.is_empty() || !self.image_reachable(url).await {
            warn!(image = url, "image not reachable; posting text only");
            return Ok(None);
        }

        let rsp = self
            .client
            .get(url)
            .timeout(IMAGE_FETCH_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?;
        let bytes = rsp.bytes().await.map_err(transport)?;
        if bytes.len() > MAX_IMAGE_BYTES {
            warn!(image = url, bytes = bytes.len(), "image too large; posting text only");
            return Ok(None);
        }

        let form = Form::new().part("media", Part::bytes(bytes.to_vec()).file_name("image"));
        let rsp = self
            .client
            .post(MEDIA_UPLOAD_URL)
            .header(reqwest::header::AUTHORIZATION, self.auth("POST", MEDIA_UPLOAD_URL)?)
            .timeout(IMAGE_FETCH_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let rsp = reject_unless_success(rsp).await?;
        let media: MediaResp = rsp
            .json()
            .await
            .map_err(|e| PublishError::Transport(format!("decode media upload response: {e}")))?;
        debug!(media_id = %media.media_id_string, "image uploaded");
        Ok(Some(media.media_id_string))
    }
}

#[async_trait::async_trait]
impl PublishTarget for XPublisher {
    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PublishError> {
        if let Some(var) = self.creds.missing() {
            return Err(PublishError::NotConfigured(var.into()));
        }

        let media_id = match post.media_url.as_deref() {
            Some(url) => self.upload_image(url).await.unwrap_or_else(|e| {
                warn!(error = %e, "image upload failed; posting text only");
                None
            }),
            None => None,
        };

        let rsp = self
            .client
            .post(TWEETS_URL)
            .header(reqwest::header::AUTHORIZATION, self.auth("POST", TWEETS_URL)?)
            .timeout(self.timeout)
            .json(&Self::tweet_body(post, media_id))
            .send()
            .await
            .map_err(transport)?;
        let rsp = reject_unless_success(rsp).await?;
        let receipt = receipt_from_success("x", rsp, |r: TweetResp| r.data.id).await;
        info!(id = %receipt.id, "posted to x");
        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "x"
    }
}
