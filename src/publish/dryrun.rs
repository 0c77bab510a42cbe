use std::sync::atomic::{AtomicU64, Ordering};

use super::{PublishReceipt, PublishTarget};
use crate::error::PublishError;
use crate::validate::Post;

/// Logs the post instead of sending it. Ids are `dry-run-<n>`, counting from 1.
#[derive(Debug, Default)]
pub struct DryRunPublisher {
    counter: AtomicU64,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PublishTarget for DryRunPublisher {
    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PublishError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            chars = post.char_len(),
            hashtags = ?post.hashtags,
            media = post.media_url.as_deref().unwrap_or("-"),
            text = %post.text,
            "dry run: post not sent"
        );
        Ok(PublishReceipt {
            id: format!("dry-run-{n}"),
        })
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
