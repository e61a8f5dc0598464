//! Domain types and pure helpers shared by every aura crate.

pub mod config;
pub mod error;
pub mod library_cache;
pub mod media;
pub mod poster;
pub mod subscription;
pub mod time;
pub mod title;
pub mod types;
