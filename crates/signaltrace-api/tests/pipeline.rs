//! End-to-end pipeline test: real HTTP server, HTTP verdict source, session
//! orchestration with fast-path split and incremental merge.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use signaltrace_api::{build_router, ApiConfig, AppState};
use signaltrace_core::{Action, AnalysisSession, HttpVerdictSource, LogEntry, RunStatus};

async fn spawn_server() -> String {
    let config = ApiConfig {
        model_api_key: None,
        fallback_delay: Duration::ZERO,
        ..ApiConfig::default()
    };
    let app = build_router(Arc::new(AppState::new(config)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    format!("http://{addr}")
}

fn entry(id: &str, action: Action, app: &str, threat: &str, bytes_sent: u64) -> LogEntry {
    LogEntry {
        id: id.to_string(),
        timestamp: "2026-08-23T10:00:00.000Z".to_string(),
        source_ip: "10.0.0.1".to_string(),
        dest_url: "https://example.com/".to_string(),
        action,
        threat_category: threat.to_string(),
        bytes_sent,
        bytes_received: 100,
        user_agent: "Mozilla/5.0".to_string(),
        source_user: "user@tenex.com".to_string(),
        app_name: app.to_string(),
    }
}

#[tokio::test]
async fn test_full_pipeline_fast_path_and_stream() {
    let base = spawn_server().await;
    let source = Arc::new(HttpVerdictSource::new(format!("{base}/api/analyze")));

    let batch = vec![
        entry("blocked", Action::Block, "General Browsing", "Malware", 100),
        entry("shadow", Action::Allow, "Tor Browser", "None", 100),
        entry("exfil", Action::Allow, "Dropbox", "None", 20_000_000),
        entry("benign", Action::Allow, "Slack", "None", 100),
    ];

    let session = AnalysisSession::new();
    let handle = session.start(source, &batch).expect("start run");

    // The blocked entry resolves before any network traffic happens.
    let fast = session.verdict("blocked").expect("fast-path verdict");
    assert_eq!(fast.confidence, 0);
    assert!(fast.reason.contains("mitigated"));

    let report = handle.wait().await.expect("run completes");
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.announced, Some(3));
    assert_eq!(report.merged, 3);
    assert!(session.pending().is_empty());

    assert_eq!(session.verdict("shadow").expect("shadow verdict").confidence, 100);
    assert_eq!(session.verdict("exfil").expect("exfil verdict").confidence, 85);
    assert!(!session.verdict("benign").expect("benign verdict").is_anomaly());

    let anomalies = session
        .results()
        .values()
        .filter(|v| v.is_anomaly())
        .count();
    assert_eq!(anomalies, 2);
}

#[tokio::test]
async fn test_pipeline_source_failure_reported() {
    let source = Arc::new(HttpVerdictSource::new(
        "http://127.0.0.1:9/api/analyze".to_string(),
    ));
    let batch = vec![entry("a1", Action::Allow, "Slack", "None", 100)];

    let session = AnalysisSession::new();
    let handle = session.start(source, &batch).expect("start run");
    let report = handle.wait().await.expect("run terminates");

    assert_eq!(report.status, RunStatus::SourceFailed);
    assert!(session.verdict("a1").is_none());
    // Nothing was classified, so the entry is still waiting on a verdict.
    assert!(session.pending().contains("a1"));
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_demo_batch_flows_through_analysis() {
    let base = spawn_server().await;

    let body: Value = reqwest::get(format!("{base}/api/logs/demo"))
        .await
        .expect("fetch demo logs")
        .json()
        .await
        .expect("parse demo logs");
    let logs: Vec<LogEntry> =
        serde_json::from_value(body["data"].clone()).expect("demo logs deserialize");
    assert_eq!(logs.len(), 500);

    // Keep the batch under the fallback cap so every entry gets a verdict.
    let batch: Vec<LogEntry> = logs.into_iter().take(150).collect();
    let source = Arc::new(HttpVerdictSource::new(format!("{base}/api/analyze")));

    let session = AnalysisSession::new();
    let handle = session.start(source, &batch).expect("start run");
    let report = handle.wait().await.expect("run completes");

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(session.results().len(), batch.len());
    assert!(session.pending().is_empty());
}
