//! Long-lived change-feed task: connect, process, reconnect.
//!
//! At most one connection is open at a time. Any receive or send error, or a
//! close frame, drops the connection and enters [`reconnect_loop`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::MediuxWsClient;
use crate::processor::{process_messages, SetUpdateHandler};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Spawn the change-feed task. It exits when `cancel` fires.
pub fn spawn_subscription(
    client: MediuxWsClient,
    handler: Arc<dyn SetUpdateHandler>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(url = %client.display_url(), "Starting MediUX subscription task");
        run_subscription_loop(&client, handler.as_ref(), &ReconnectConfig::default(), &cancel)
            .await;
        tracing::info!("MediUX subscription task exited");
    })
}

/// Core loop. Runs until `cancel` is triggered.
pub async fn run_subscription_loop(
    client: &MediuxWsClient,
    handler: &dyn SetUpdateHandler,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) {
    let mut conn = match client.connect().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "Connection failed, entering reconnect loop");
            match reconnect_loop(client, config, cancel).await {
                Some(conn) => conn,
                None => return,
            }
        }
    };

    loop {
        process_messages(&mut conn.ws_stream, handler, cancel).await;

        if cancel.is_cancelled() {
            return;
        }

        tracing::info!("Connection lost, entering reconnect loop");
        conn = match reconnect_loop(client, config, cancel).await {
            Some(conn) => conn,
            None => return,
        };
    }
}
