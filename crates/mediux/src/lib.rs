//! MediUX upstream adapter.
//!
//! GraphQL queries for poster sets, image download with an on-disk cache,
//! and the `show_sets` WebSocket subscription with its reconnect loop.

pub mod api;
pub mod client;
pub mod error;
pub mod images;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod sets;
pub mod source;
pub mod subscription;

pub use api::MediuxApi;
pub use error::MediuxError;
pub use images::{ImageCache, ImageData, ImageQuality};
pub use source::{Mediux, PosterSetSource};
