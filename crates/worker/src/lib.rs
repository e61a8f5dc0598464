//! Background work for aura.
//!
//! Each module provides a long-running async function meant to be spawned
//! with `tokio::spawn`; all of them stop on a [`CancellationToken`].
//!
//! - [`sweep`]: cron-driven auto-download over every stored item.
//! - [`set_updates`]: forced checks for sets pushed over the WebSocket.
//! - [`download_queue`]: manual download requests dropped as JSON files.
//! - [`warmer`]: loads configured libraries into the library cache.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod download_queue;
pub mod set_updates;
pub mod sweep;
pub mod warmer;

pub use set_updates::SetUpdateConsumer;
pub use sweep::{Sweep, SweepSummary};
