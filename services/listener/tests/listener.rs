//! Listener dispatch, driven by in-memory event sources and a recording handler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use poolscale_events::{JobCompleted, JobStarted, ScaleEvent};
use poolscale_listener::scaler::{ScaleHandler, ScalerError};
use poolscale_listener::{
    EventSource, JsonLinesSource, Listener, ListenerMetrics, ListenerService, MetricLabels,
    Service, ShutdownToken,
};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Started(String),
    Completed(String),
    Desired(u32),
}

#[derive(Default)]
struct RecordingHandler {
    calls: Vec<Call>,
    fail_desired: bool,
}

#[async_trait]
impl ScaleHandler for RecordingHandler {
    async fn handle_job_started(&mut self, job: &JobStarted) -> Result<(), ScalerError> {
        self.calls.push(Call::Started(job.runner_name.clone()));
        Ok(())
    }

    async fn handle_job_completed(&mut self, job: &JobCompleted) -> Result<(), ScalerError> {
        self.calls.push(Call::Completed(job.runner_name.clone()));
        Ok(())
    }

    async fn handle_desired_count(&mut self, count: u32) -> Result<i32, ScalerError> {
        self.calls.push(Call::Desired(count));
        if self.fail_desired {
            let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
            return Err(ScalerError::Encode(err));
        }
        Ok(count as i32 + 1)
    }
}

fn started(runner: &str) -> ScaleEvent {
    ScaleEvent::JobStarted(JobStarted {
        runner_name: runner.to_string(),
        ..Default::default()
    })
}

fn completed(runner: &str) -> ScaleEvent {
    ScaleEvent::JobCompleted(JobCompleted {
        runner_name: runner.to_string(),
        ..Default::default()
    })
}

#[tokio::test]
async fn dispatches_events_in_order() {
    let input = concat!(
        r#"{"type":"job_started","runner_name":"r1","job_id":"j1"}"#,
        "\n",
        r#"{"type":"desired_count","count":2}"#,
        "\n\n",
        r#"{"type":"job_completed","runner_name":"r1","result":"succeeded"}"#,
        "\n",
        r#"{"type":"desired_count","count":0}"#,
        "\n",
    );
    let mut listener = Listener::new(JsonLinesSource::new(input.as_bytes()));
    let mut handler = RecordingHandler::default();

    listener
        .run(&mut handler, &ShutdownToken::new())
        .await
        .unwrap();

    assert_eq!(
        handler.calls,
        vec![
            Call::Started("r1".to_string()),
            Call::Desired(2),
            Call::Completed("r1".to_string()),
            Call::Desired(0),
        ]
    );
}

#[tokio::test]
async fn malformed_line_stops_with_line_number() {
    let input = concat!(
        r#"{"type":"desired_count","count":1}"#,
        "\n",
        r#"{"type":"job_queued"}"#,
        "\n",
        r#"{"type":"desired_count","count":2}"#,
        "\n",
    );
    let mut listener = Listener::new(JsonLinesSource::new(input.as_bytes()));
    let mut handler = RecordingHandler::default();

    let err = listener
        .run(&mut handler, &ShutdownToken::new())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("line 2"));
    assert_eq!(handler.calls, vec![Call::Desired(1)]);
}

#[tokio::test]
async fn json_lines_source_skips_blank_lines() {
    let mut source = JsonLinesSource::new("\n   \n{\"type\":\"desired_count\",\"count\":7}\n".as_bytes());

    assert_eq!(
        source.next_event().await.unwrap(),
        Some(ScaleEvent::DesiredCount { count: 7 })
    );
    assert_eq!(source.next_event().await.unwrap(), None);
}

#[tokio::test]
async fn handler_error_ends_run() {
    let (tx, rx) = mpsc::channel(8);
    tx.send(started("r1")).await.unwrap();
    tx.send(ScaleEvent::DesiredCount { count: 3 }).await.unwrap();
    tx.send(completed("r1")).await.unwrap();

    let mut listener = Listener::new(rx);
    let mut handler = RecordingHandler {
        fail_desired: true,
        ..Default::default()
    };

    let err = listener
        .run(&mut handler, &ShutdownToken::new())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("desired runner count"));
    assert_eq!(
        handler.calls,
        vec![Call::Started("r1".to_string()), Call::Desired(3)]
    );
}

#[tokio::test]
async fn closed_channel_ends_run() {
    let (tx, rx) = mpsc::channel(8);
    tx.send(ScaleEvent::DesiredCount { count: 1 }).await.unwrap();
    drop(tx);

    let mut listener = Listener::new(rx);
    let mut handler = RecordingHandler::default();

    listener
        .run(&mut handler, &ShutdownToken::new())
        .await
        .unwrap();
    assert_eq!(handler.calls, vec![Call::Desired(1)]);
}

#[tokio::test]
async fn records_metrics_for_handled_events() {
    let (tx, rx) = mpsc::channel(8);
    tx.send(started("r1")).await.unwrap();
    tx.send(started("r2")).await.unwrap();
    tx.send(completed("r1")).await.unwrap();
    tx.send(ScaleEvent::DesiredCount { count: 4 }).await.unwrap();
    drop(tx);

    let metrics = Arc::new(ListenerMetrics::new(MetricLabels::default()));
    let mut listener = Listener::new(rx).with_metrics(Arc::clone(&metrics));
    let mut handler = RecordingHandler::default();

    listener
        .run(&mut handler, &ShutdownToken::new())
        .await
        .unwrap();

    assert_eq!(metrics.started_jobs_total(), 2);
    assert_eq!(metrics.completed_jobs_total(), 1);
    assert_eq!(metrics.desired_runners(), 5);
}

#[tokio::test]
async fn cancellation_stops_idle_listener() {
    let (tx, rx) = mpsc::channel::<ScaleEvent>(8);
    let shutdown = ShutdownToken::new();

    let service = ListenerService::new(Listener::new(rx), RecordingHandler::default());
    let task = tokio::spawn(Box::new(service).run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel_with_cause("test shutdown");

    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("listener did not stop")
        .unwrap();
    assert!(result.is_ok());
    drop(tx);
}

#[tokio::test]
async fn listener_service_name() {
    let (_tx, rx) = mpsc::channel::<ScaleEvent>(1);
    let service = ListenerService::new(Listener::new(rx), RecordingHandler::default());
    assert_eq!(service.name(), "listener");
}
