use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::io::BufReader;

use fossify_api::config::{ConfigStore, EnvConfigStore};
use fossify_api::receiver;
use fossify_api::server::ApiService;
use fossify_api::transmitter::{CommandTransmitter, DryRunTransmitter, Transmitter};
use fossify_api::webhook::WebhookNotifier;

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run());
    // A blocked stdin read would otherwise hold up runtime shutdown.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run() -> anyhow::Result<()> {
    let store = EnvConfigStore;
    let config = store.load()?;

    let transmitter: Arc<dyn Transmitter> = match &config.transmit_command {
        Some(program) => {
            info!("Sending through {}", program.display());
            Arc::new(CommandTransmitter::new(program))
        }
        None => {
            info!("No FOSSIFY_TRANSMIT_COMMAND set, sends will only be logged");
            Arc::new(DryRunTransmitter)
        }
    };

    let server = ApiService::start(&store, transmitter).await;

    // Inbound events arrive as JSON lines on stdin and go straight to the webhook.
    let notifier = WebhookNotifier::new(&config)?;
    if !notifier.is_configured() {
        info!("Webhook not configured, inbound messages will not be forwarded");
    }
    let inbound = tokio::spawn(async move {
        match receiver::pump(BufReader::new(tokio::io::stdin()), notifier).await {
            Ok(n) => info!("Inbound feed closed after {} messages", n),
            Err(e) => error!("Inbound feed error: {}", e),
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    inbound.abort();
    if let Some(server) = server {
        server.stop().await;
    }

    Ok(())
}
