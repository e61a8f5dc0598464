//! The `aura` service: startup wiring, health endpoint and shutdown.

pub mod bootstrap;
pub mod config;
pub mod router;
pub mod routes;
pub mod state;
pub mod telemetry;
