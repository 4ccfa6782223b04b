use anyhow::Context;
use async_trait::async_trait;

use super::{Notifier, StatusNotice};

/// Posts notices as JSON to the mail relay, which renders and delivers them.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &StatusNotice) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .context("failed to send notification")?
            .error_for_status()
            .context("notification endpoint returned error")?;

        Ok(())
    }
}
