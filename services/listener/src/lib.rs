//! poolscale listener
//!
//! Consumes job lifecycle and desired-count events from a runner scale set
//! session and keeps a cluster-side pool of ephemeral runners at the right
//! size.
//!
//! ## Architecture
//!
//! - **Listener**: reads events in order and hands each to the scaler
//! - **Scaler**: turns events into merge patches against the runner set and
//!   its runners, stamping every scale request with a patch sequence number
//! - **Telemetry**: optional HTTP server exposing metrics and a health check
//! - **Supervisor**: runs the listener and telemetry under one cancellation
//!   scope; the first failure stops everything

pub mod config;
pub mod listener;
pub mod logging;
pub mod metrics;
pub mod resources;
pub mod scaler;
pub mod shutdown;
pub mod supervisor;
pub mod telemetry;

pub use config::{Config, ConfigError, LogFormat};
pub use listener::{EventSource, JsonLinesSource, Listener, ListenerService};
pub use metrics::{ListenerMetrics, MetricLabels};
pub use scaler::{
    is_not_found, Decision, RunnerBounds, ScaleHandler, Scaler, ScalerConfig, ScalerError, Sequencer,
};
pub use shutdown::ShutdownToken;
pub use supervisor::{Service, Supervisor};
pub use telemetry::TelemetryServer;
