//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&SqlitePool` as the first argument.

pub mod subscription_repo;

pub use subscription_repo::SubscriptionRepo;
