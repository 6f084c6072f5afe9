//! Event listener: feeds session events to the scaler one at a time.
//!
//! The listener owns the scaler for its whole life. It waits for the next
//! event, runs the matching handler to completion and only then reads the
//! next event, which is what makes the scaler single-writer.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use poolscale_events::ScaleEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::metrics::ListenerMetrics;
use crate::scaler::ScaleHandler;
use crate::shutdown::ShutdownToken;
use crate::supervisor::Service;

/// Ordered stream of session events.
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the session is closed.
    async fn next_event(&mut self) -> Result<Option<ScaleEvent>>;
}

/// Events encoded as one JSON object per line.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for JsonLinesSource<R> {
    async fn next_event(&mut self) -> Result<Option<ScaleEvent>> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .context("reading event stream")?
            else {
                return Ok(None);
            };
            self.line_number += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let event = ScaleEvent::from_json(line)
                .with_context(|| format!("decoding event on line {}", self.line_number))?;
            return Ok(Some(event));
        }
    }
}

#[async_trait]
impl EventSource for mpsc::Receiver<ScaleEvent> {
    async fn next_event(&mut self) -> Result<Option<ScaleEvent>> {
        Ok(self.recv().await)
    }
}

/// Reads events from a source and dispatches them to a [`ScaleHandler`].
pub struct Listener<S> {
    source: S,
    metrics: Option<Arc<ListenerMetrics>>,
}

impl<S: EventSource> Listener<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ListenerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Process events until the stream ends, a handler fails, or `shutdown` is cancelled.
    pub async fn run<H: ScaleHandler>(
        &mut self,
        handler: &mut H,
        shutdown: &ShutdownToken,
    ) -> Result<()> {
        info!("Listening for session events");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    log_cancelled(shutdown);
                    return Ok(());
                }
                next = self.source.next_event() => next?,
            };

            let Some(event) = next else {
                info!("Event stream closed");
                return Ok(());
            };

            let metrics = self.metrics.as_deref();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    log_cancelled(shutdown);
                    return Ok(());
                }
                handled = dispatch(handler, event, metrics) => handled?,
            }
        }
    }
}

fn log_cancelled(shutdown: &ShutdownToken) {
    let cause = shutdown.cause().unwrap_or_else(|| "canceled".to_string());
    info!(cause = %cause, "Listener shutting down");
}

async fn dispatch<H: ScaleHandler>(
    handler: &mut H,
    event: ScaleEvent,
    metrics: Option<&ListenerMetrics>,
) -> Result<()> {
    debug!(event_type = event.event_type(), "Handling event");

    match event {
        ScaleEvent::JobStarted(job) => {
            handler
                .handle_job_started(&job)
                .await
                .with_context(|| format!("handling job started on runner {}", job.runner_name))?;
            if let Some(metrics) = metrics {
                metrics.record_job_started();
            }
        }
        ScaleEvent::JobCompleted(job) => {
            handler
                .handle_job_completed(&job)
                .await
                .with_context(|| format!("handling job completed on runner {}", job.runner_name))?;
            if let Some(metrics) = metrics {
                metrics.record_job_completed();
            }
        }
        ScaleEvent::DesiredCount { count } => {
            let target = handler
                .handle_desired_count(count)
                .await
                .context("handling desired runner count")?;
            if let Some(metrics) = metrics {
                metrics.record_desired_count(count, target);
            }
        }
    }

    Ok(())
}

/// The listener together with the handler it owns, runnable under the supervisor.
pub struct ListenerService<S, H> {
    listener: Listener<S>,
    handler: H,
}

impl<S, H> ListenerService<S, H> {
    pub fn new(listener: Listener<S>, handler: H) -> Self {
        Self { listener, handler }
    }
}

#[async_trait]
impl<S, H> Service for ListenerService<S, H>
where
    S: EventSource + 'static,
    H: ScaleHandler + 'static,
{
    fn name(&self) -> &'static str {
        "listener"
    }

    async fn run(self: Box<Self>, shutdown: ShutdownToken) -> Result<()> {
        let ListenerService {
            mut listener,
            mut handler,
        } = *self;
        listener.run(&mut handler, &shutdown).await
    }
}
