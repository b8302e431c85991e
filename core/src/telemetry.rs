//! Tracing integration.
//!
//! The engine emits `tracing` events around operation execution, rollback,
//! and restarts; this module wires up a subscriber for binaries and examples
//! that have no subscriber of their own. Libraries embedding the engine
//! should install their own subscriber and skip [`init_telemetry`].

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to log output.
    pub service_name: String,
    /// Filter directive, e.g. `"info"` or `"durable_tx_core=debug"`.
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "durable-tx".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Keeps telemetry alive; dropping it is currently a no-op but callers hold
/// it for the lifetime of the process.
pub struct TelemetryGuard;

impl TelemetryGuard {
    pub fn shutdown(self) {}
}

/// Installs a global subscriber with an env filter and a fmt layer.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryGuard {
    let env_filter = EnvFilter::new(&config.log_level);

    Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!(service = %config.service_name, "telemetry initialized");
    TelemetryGuard
}
