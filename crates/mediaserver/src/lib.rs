//! Media-server adapter.
//!
//! [`MediaServer`] is the capability set the rest of aura uses; [`PlexServer`]
//! and [`EmbyJellyfinServer`] implement it. [`connect`] picks one from the
//! configuration. [`ArrClient`] mirrors labels into Sonarr/Radarr tags.

pub mod arr;
pub mod emby;
pub mod error;
mod http;
pub mod plex;
pub mod server;

pub use arr::ArrClient;
pub use emby::EmbyJellyfinServer;
pub use error::MediaServerError;
pub use plex::PlexServer;
pub use server::{connect, ApplyImage, ArtworkKind, MediaServer};
