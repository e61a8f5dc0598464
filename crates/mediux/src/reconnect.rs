//! Reconnection policy for the MediUX change feed.
//!
//! The default policy retries every 5 seconds forever. A multiplier above
//! 1.0 turns it into capped exponential backoff.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{MediuxConnection, MediuxWsClient};

pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor applied to the delay after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            multiplier: 1.0,
        }
    }
}

/// Next delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Sleep, then try to connect, until a connection succeeds.
///
/// Returns `None` once `cancel` is triggered.
pub async fn reconnect_loop(
    client: &MediuxWsClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<MediuxConnection> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting to MediUX");

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
            result = client.connect() => match result {
                Ok(conn) => {
                    tracing::info!(attempt, "Reconnected to MediUX");
                    return Some(conn);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Reconnect attempt {attempt} failed");
                }
            }
        }

        delay = next_delay(delay, config);
    }
}
