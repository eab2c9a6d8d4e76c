use log::{info, warn};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::types::WebhookPayload;
use crate::webhook::WebhookNotifier;

/// A message the device received, as reported by the receiving side.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub phone_number: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Forwards one inbound message to the webhook without waiting on delivery.
pub fn on_message_received(notifier: &WebhookNotifier, msg: InboundMessage) {
    let payload = WebhookPayload::inbound(msg.phone_number, msg.message, msg.attachments);
    notifier.notify(payload);
}

/// Reads newline-delimited JSON inbound events until EOF. Bad lines are
/// logged and skipped.
pub async fn pump<R>(reader: R, notifier: WebhookNotifier) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundMessage>(line) {
            Ok(msg) => {
                info!("Inbound message from {}", msg.phone_number);
                on_message_received(&notifier, msg);
                forwarded += 1;
            }
            Err(e) => warn!("Skipping malformed inbound event: {}", e),
        }
    }
    Ok(forwarded)
}
