//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set. Otherwise the filter comes from
//! `Logging.Level`. A non-empty `Logging.File` adds a second, ANSI-free
//! output appended to that file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use aura_core::config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is absent.
pub fn default_filter(logging: &LoggingConfig) -> EnvFilter {
    let level = logging.filter_directive();
    EnvFilter::new(format!("{level},tower_http={level},sqlx=warn"))
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(logging: &LoggingConfig) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(logging));

    let file_layer = match logging.file.trim() {
        "" => None,
        path => {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}
