use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use log::info;

use crate::error::TransmissionError;
use crate::segment;
use crate::transmitter::Transmitter;
use crate::types::SendResult;

/// Hands out send ids: epoch milliseconds, bumped past the previous id when
/// two sends land in the same millisecond.
#[derive(Default)]
pub struct SendIdGenerator {
    last: AtomicI64,
}

impl SendIdGenerator {
    pub fn next(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => prev = actual,
            }
        }
    }
}

pub struct Dispatcher {
    transmitter: Arc<dyn Transmitter>,
    ids: SendIdGenerator,
}

impl Dispatcher {
    pub fn new(transmitter: Arc<dyn Transmitter>) -> Self {
        Self {
            transmitter,
            ids: SendIdGenerator::default(),
        }
    }

    /// One logical send, however many parts it takes on the wire.
    pub async fn send_text(
        &self,
        phone_number: &str,
        message: &str,
    ) -> Result<SendResult, TransmissionError> {
        if segment::needs_multipart(message) {
            let parts = self.transmitter.divide_message(message);
            info!("Sending {}-part text to {}", parts.len(), phone_number);
            self.transmitter.send_multipart(phone_number, parts).await?;
        } else {
            info!("Sending text to {}", phone_number);
            self.transmitter.send_text(phone_number, message).await?;
        }
        Ok(SendResult::sent(self.ids.next()))
    }

    pub async fn send_media(
        &self,
        phone_number: &str,
        message: &str,
        attachments: &[PathBuf],
    ) -> Result<SendResult, TransmissionError> {
        info!(
            "Sending media message to {} with {} attachments",
            phone_number,
            attachments.len()
        );
        self.transmitter
            .send_media(phone_number, message, attachments)
            .await?;
        Ok(SendResult::sent(self.ids.next()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::transmitter::mock::{Call, RecordingTransmitter};

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let ids = SendIdGenerator::default();
        let generated: Vec<i64> = (0..1000).map(|_| ids.next().parse().unwrap()).collect();
        assert!(generated.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ids = Arc::new(SendIdGenerator::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..250).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();
        let all: HashSet<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), 1000);
    }

    #[tokio::test]
    async fn test_short_text_is_single_send() {
        let transmitter = Arc::new(RecordingTransmitter::default());
        let dispatcher = Dispatcher::new(transmitter.clone());

        let result = dispatcher.send_text("5551234", "hello").await.unwrap();
        assert!(!result.id.is_empty());
        assert_eq!(
            transmitter.calls(),
            vec![Call::Text {
                phone_number: "5551234".into(),
                message: "hello".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_long_text_is_one_multipart_send() {
        let transmitter = Arc::new(RecordingTransmitter::default());
        let dispatcher = Dispatcher::new(transmitter.clone());
        let text = "x".repeat(200);

        dispatcher.send_text("5551234", &text).await.unwrap();
        let calls = transmitter.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Call::Multipart { parts, .. } => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts.concat(), text);
            }
            other => panic!("expected multipart send, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emoji_text_over_160_units_is_multipart() {
        let transmitter = Arc::new(RecordingTransmitter::default());
        let dispatcher = Dispatcher::new(transmitter.clone());
        let text = "😀".repeat(100);

        dispatcher.send_text("5551234", &text).await.unwrap();
        let calls = transmitter.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Call::Multipart { parts, .. } => {
                assert_eq!(parts.len(), 4);
                assert_eq!(parts.concat(), text);
            }
            other => panic!("expected multipart send, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_surfaces_detail() {
        let dispatcher = Dispatcher::new(Arc::new(RecordingTransmitter::failing("no service")));
        let err = dispatcher.send_media("5551234", "", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "no service");
    }
}
