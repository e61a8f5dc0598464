//! The sync pipeline: decide what changed for a stored subscription and put
//! the right images on the media server.
//!
//! - [`detection`]: pure rules that schedule files with a reason.
//! - [`engine`]: [`ChangeDetector`], the per-item loop over subscriptions.
//! - [`executor`]: [`Executor`], download-and-apply for one file.
//! - [`labels`]: Plex labels and Sonarr/Radarr tags after an apply.
//! - [`paths`]: local file layout for saved images.

pub mod detection;
pub mod engine;
pub mod error;
pub mod executor;
pub mod labels;
pub mod paths;
pub mod results;

pub use detection::{should_download_file, ScheduledDownload};
pub use engine::ChangeDetector;
pub use error::PipelineError;
pub use executor::Executor;
pub use labels::LabelSync;
pub use results::{ItemResult, OverallResult, SubscriptionOutcome, SubscriptionResult};
