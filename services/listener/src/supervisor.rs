//! Supervisor for the listener and telemetry services.
//!
//! ```text
//! root (signals)
//! └── group            cancelled when either service fails
//!     ├── listener
//!     └── telemetry    cancelled with a cause when the listener returns
//! ```
//!
//! The run waits for both services and returns the first error.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::shutdown::ShutdownToken;

/// A long-running unit of the process.
#[async_trait]
pub trait Service: Send + 'static {
    /// Name used in logs and failure causes.
    fn name(&self) -> &'static str;

    /// Run until finished, failed, or `shutdown` is cancelled.
    async fn run(self: Box<Self>, shutdown: ShutdownToken) -> Result<()>;
}

/// Runs the listener and, optionally, the telemetry server.
pub struct Supervisor {
    listener: Box<dyn Service>,
    telemetry: Option<Box<dyn Service>>,
}

impl Supervisor {
    pub fn new(listener: impl Service) -> Self {
        Self {
            listener: Box::new(listener),
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: impl Service) -> Self {
        self.telemetry = Some(Box::new(telemetry));
        self
    }

    /// Run both services under `root` until they have both returned.
    pub async fn run(self, root: &ShutdownToken) -> Result<()> {
        let group = root.child();
        let telemetry_scope = group.child();

        let mut tasks: JoinSet<(&'static str, Result<()>)> = JoinSet::new();
        let mut names = HashMap::new();

        let listener = self.listener;
        let listener_name = listener.name();
        let listener_scope = group.clone();
        let listener_done = telemetry_scope.clone();
        let handle = tasks.spawn(async move {
            info!(service = listener_name, "Starting listener");
            let result = listener.run(listener_scope).await;

            let outcome = match &result {
                Ok(()) => "ok".to_string(),
                Err(e) => format!("{e:#}"),
            };
            listener_done.cancel_with_cause(format!("listener exited: {outcome}"));

            (listener_name, result)
        });
        names.insert(handle.id(), listener_name);

        if let Some(telemetry) = self.telemetry {
            let telemetry_name = telemetry.name();
            let handle = tasks.spawn(async move {
                info!(service = telemetry_name, "Starting telemetry server");
                (telemetry_name, telemetry.run(telemetry_scope).await)
            });
            names.insert(handle.id(), telemetry_name);
        }

        let mut first_error: Option<anyhow::Error> = None;

        while let Some(joined) = tasks.join_next().await {
            let (name, result) = match joined {
                Ok(finished) => finished,
                Err(e) => {
                    let name = names.get(&e.id()).copied().unwrap_or("unknown");
                    (name, Err(anyhow!("{name} task aborted: {e}")))
                }
            };

            match result {
                Ok(()) => info!(service = name, "Service exited"),
                Err(e) => {
                    error!(service = name, error = %format!("{e:#}"), "Service failed");
                    if first_error.is_none() {
                        group.cancel_with_cause(format!("{name} failed: {e:#}"));
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
