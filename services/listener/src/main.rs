//! poolscale listener binary.
//!
//! Reads session events as JSON lines on stdin and scales the configured
//! ephemeral runner set. Configuration comes from the JSON file named by
//! `LISTENER_CONFIG_PATH`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tracing::{error, info};

use poolscale_listener::config::Config;
use poolscale_listener::shutdown::{self, ShutdownToken};
use poolscale_listener::{
    logging, JsonLinesSource, Listener, ListenerMetrics, ListenerService, Scaler, Supervisor,
    TelemetryServer,
};

fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load listener configuration")?;
    logging::init(&config.log_level, config.log_format);

    info!(
        namespace = %config.ephemeral_runner_set_namespace,
        name = %config.ephemeral_runner_set_name,
        min_runners = config.min_runners,
        max_runners = config.max_runners,
        metrics_addr = %config.metrics_addr,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(run(config));

    // A pending stdin read holds a blocking thread that cannot be interrupted.
    runtime.shutdown_timeout(Duration::from_secs(1));

    match &result {
        Ok(()) => info!("Listener shutdown complete"),
        Err(e) => error!(error = %format!("{e:#}"), "Listener exited with error"),
    }
    result
}

async fn run(config: Config) -> Result<()> {
    let root = ShutdownToken::new();
    let _signals =
        shutdown::install_signal_handler(root.clone()).context("failed to install signal handlers")?;

    // Kubeconfig when present, otherwise the pod's service account.
    let client = kube::Client::try_default()
        .await
        .context("failed to create cluster client")?;
    info!(default_namespace = %client.default_namespace(), "Cluster client ready");

    let scaler = Scaler::new(config.scaler_config(), client);
    let source = JsonLinesSource::new(BufReader::new(tokio::io::stdin()));
    let listener = Listener::new(source);

    let supervisor = match config.metrics_socket_addr()? {
        Some(addr) => {
            let metrics = Arc::new(ListenerMetrics::new(config.metric_labels()));
            metrics.record_static(config.min_runners, config.max_runners);

            let listener = listener.with_metrics(Arc::clone(&metrics));
            Supervisor::new(ListenerService::new(listener, scaler)).with_telemetry(
                TelemetryServer::new(addr, config.metrics_endpoint.as_str(), metrics),
            )
        }
        None => Supervisor::new(ListenerService::new(listener, scaler)),
    };

    supervisor.run(&root).await
}
