//! Synthetic proxy log generation for demos and fallback-mode testing.
//!
//! Produces a day-old batch of mostly benign traffic with a fixed number of
//! planted anomalies, including a guaranteed set of after-hours Dropbox
//! exfiltration entries so every demo batch has something to find.

use chrono::{Duration as ChronoDuration, SecondsFormat, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use signaltrace_core::{Action, LogEntry};
use uuid::Uuid;

/// Batch size of one generated dataset
pub const TOTAL_LOGS: usize = 500;

/// Planted anomalies per dataset
pub const ANOMALY_COUNT: usize = 50;

/// Of the planted anomalies, how many are after-hours Dropbox exfiltration
pub const GUARANTEED_DROPBOX_EXFIL: usize = 8;

const USERS: &[&str] = &[
    "user.7a3f", "user.b92c", "user.d41e", "user.e58a", "svc.admin", "user.f10b", "user.c03d",
];

const APPS: &[&str] = &[
    "Google Drive",
    "Dropbox",
    "Salesforce",
    "Zoom",
    "Slack",
    "GitHub",
    "General Browsing",
];

const THREATS: &[&str] = &[
    "Botnet",
    "Malware",
    "Phishing",
    "Cryptomining",
    "C2 Server",
    "Spyware",
    "Ransomware",
];

const DOMAINS: &[&str] = &[
    "google.com",
    "salesforce.com",
    "github.com",
    "unknown-host.xy",
    "update-win32.com",
    "facebook.com",
];

const BROWSER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

fn random_ip<R: Rng>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.gen_range(10..=192),
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
        rng.gen_range(1..=254)
    )
}

fn timestamp_yesterday<R: Rng>(rng: &mut R, hour: Option<u32>) -> String {
    let base = Utc::now() - ChronoDuration::days(1);
    let stamped = base
        .with_hour(hour.unwrap_or_else(|| rng.gen_range(8..=18)))
        .and_then(|d| d.with_minute(rng.gen_range(0..=59)))
        .and_then(|d| d.with_second(rng.gen_range(0..=59)))
        .unwrap_or(base);
    stamped.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn pick<'a, R: Rng>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or("")
}

fn normal_log<R: Rng>(rng: &mut R) -> LogEntry {
    let app = pick(rng, APPS);
    // Google Drive traffic is always allowed, and kept to business hours.
    let action = if app == "Google Drive" {
        Action::Allow
    } else if rng.gen_bool(0.5) {
        Action::Allow
    } else {
        Action::Block
    };

    let threat = match action {
        Action::Block => match app {
            "Dropbox" => {
                if rng.gen_bool(0.5) {
                    "DLP Violation"
                } else {
                    "Policy Violation"
                }
            }
            "Zoom" | "Slack" => "Policy Violation",
            "General Browsing" => {
                if rng.gen_bool(0.5) {
                    pick(rng, THREATS)
                } else {
                    "Policy Violation"
                }
            }
            _ => "None",
        },
        Action::Allow => {
            if rng.gen_bool(0.02) {
                "Spyware"
            } else {
                "None"
            }
        }
    };

    let hour = (app == "Google Drive").then(|| rng.gen_range(9..=17));

    LogEntry {
        id: String::new(),
        timestamp: timestamp_yesterday(rng, hour),
        source_ip: random_ip(rng),
        dest_url: format!("https://{}/path/to/resource", pick(rng, DOMAINS)),
        action,
        threat_category: threat.to_string(),
        bytes_sent: rng.gen_range(50..=4_000),
        bytes_received: rng.gen_range(200..=20_000),
        user_agent: BROWSER_AGENT.to_string(),
        source_user: format!("{}@tenex.com", pick(rng, USERS)),
        app_name: app.to_string(),
    }
}

fn dropbox_exfil_log<R: Rng>(rng: &mut R) -> LogEntry {
    let agents = [
        "python-requests/2.28.1",
        "curl/7.88.1",
        "Mozilla/5.0 (compatible; MSIE 9.0; Windows NT 6.1; WOW64; Trident/5.0)",
    ];
    let hour = rng.gen_range(1..=4);
    LogEntry {
        id: String::new(),
        timestamp: timestamp_yesterday(rng, Some(hour)),
        source_ip: "10.0.0.55".to_string(),
        dest_url: "http://unknown-host.xy/upload".to_string(),
        action: Action::Allow,
        threat_category: "None".to_string(),
        bytes_sent: rng.gen_range(15_000_000..=50_000_000),
        bytes_received: rng.gen_range(100..=500),
        user_agent: pick(rng, &agents).to_string(),
        source_user: "user.f10b@tenex.com".to_string(),
        app_name: "Dropbox".to_string(),
    }
}

fn mitigated_malware_log<R: Rng>(rng: &mut R) -> LogEntry {
    let agents = ["Mozilla/5.0 (Windows NT 10.0)", "Powershell/7.3.4"];
    LogEntry {
        id: String::new(),
        timestamp: timestamp_yesterday(rng, None),
        source_ip: random_ip(rng),
        dest_url: "http://update-win32.com/payload.exe".to_string(),
        action: Action::Block,
        threat_category: "Malware".to_string(),
        bytes_sent: rng.gen_range(100..=500),
        bytes_received: 0,
        user_agent: pick(rng, &agents).to_string(),
        source_user: "user.c03d@tenex.com".to_string(),
        app_name: "General Browsing".to_string(),
    }
}

fn shadow_it_log<R: Rng>(rng: &mut R) -> LogEntry {
    LogEntry {
        id: String::new(),
        timestamp: timestamp_yesterday(rng, None),
        source_ip: random_ip(rng),
        dest_url: "https://onion.router/hidden".to_string(),
        action: Action::Allow,
        threat_category: "None".to_string(),
        bytes_sent: rng.gen_range(2_000..=5_000),
        bytes_received: rng.gen_range(2_000..=5_000),
        user_agent: "Mozilla/5.0 (rv:109.0) Gecko/20100101 Firefox/109.0".to_string(),
        source_user: "user.d41e@tenex.com".to_string(),
        app_name: "Tor Browser".to_string(),
    }
}

/// Generate one synthetic dataset, sorted by timestamp with fresh ids.
///
/// Anomalies overwrite random positions, so duplicate indices can reduce the
/// planted count slightly below [`ANOMALY_COUNT`]; the guaranteed Dropbox
/// exfiltration entries make the floor.
pub fn generate_demo_logs() -> Vec<LogEntry> {
    let mut rng = rand::thread_rng();
    let mut logs: Vec<LogEntry> = (0..TOTAL_LOGS).map(|_| normal_log(&mut rng)).collect();

    for _ in 0..GUARANTEED_DROPBOX_EXFIL {
        let slot = rng.gen_range(0..TOTAL_LOGS);
        logs[slot] = dropbox_exfil_log(&mut rng);
    }

    for _ in 0..(ANOMALY_COUNT - GUARANTEED_DROPBOX_EXFIL) {
        let slot = rng.gen_range(0..TOTAL_LOGS);
        logs[slot] = if rng.gen_bool(0.5) {
            mitigated_malware_log(&mut rng)
        } else {
            shadow_it_log(&mut rng)
        };
    }

    // Timestamps share one fixed-width RFC3339 rendering, so lexicographic
    // order is chronological order.
    logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    for log in &mut logs {
        log.id = Uuid::new_v4().to_string();
    }
    logs
}
