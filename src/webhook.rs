use std::time::Duration;

use log::{debug, error, warn};
use reqwest::{Client, StatusCode};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::types::WebhookPayload;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct WebhookTarget {
    url: String,
    token: String,
}

/// Best-effort delivery of inbound-message events. Failures are logged and
/// dropped; nothing is retried and the caller never sees the outcome.
#[derive(Clone)]
pub struct WebhookNotifier {
    target: Option<WebhookTarget>,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::with_timeout(config, WEBHOOK_TIMEOUT)
    }

    fn with_timeout(config: &Config, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        let target = config.webhook_url.clone().map(|url| WebhookTarget {
            url,
            token: config.webhook_token.clone().unwrap_or_default(),
        });
        Ok(Self { target, client })
    }

    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }

    /// Schedules delivery and returns at once. Returns `None` when no
    /// webhook URL is configured. The handle is only for callers that want
    /// to observe completion; dropping it does not cancel delivery.
    pub fn notify(&self, payload: WebhookPayload) -> Option<JoinHandle<()>> {
        let Some(target) = self.target.clone() else {
            debug!("Webhook not configured, skipping");
            return None;
        };
        let client = self.client.clone();
        Some(tokio::spawn(async move {
            deliver(&client, &target, &payload).await;
        }))
    }
}

async fn deliver(client: &Client, target: &WebhookTarget, payload: &WebhookPayload) {
    let result = client
        .post(&target.url)
        .bearer_auth(&target.token)
        .json(payload)
        .send()
        .await;

    match result {
        Ok(resp) if resp.status() == StatusCode::OK => {
            debug!("Webhook sent successfully for {}", payload.phone_number);
        }
        Ok(resp) => warn!("Webhook returned {}", resp.status()),
        Err(e) => error!("Webhook error: {}", e),
    }
}
