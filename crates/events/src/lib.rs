//! aura notifications and background task pool.
//!
//! - [`TaskPool`]: bounded fire-and-forget queue drained by a fixed number
//!   of workers. Used for notifications and label sync so the pipeline
//!   never waits on them.
//! - [`Notification`]: provider-neutral message.
//! - [`NotificationDispatcher`]: fans a notification out to every enabled
//!   provider.
//! - [`delivery`]: one module per provider (Discord, Pushover, Gotify,
//!   generic webhook).

pub mod delivery;
pub mod dispatcher;
pub mod notification;
pub mod pool;

pub use delivery::{DeliveryError, Notifier};
pub use dispatcher::NotificationDispatcher;
pub use notification::Notification;
pub use pool::TaskPool;
