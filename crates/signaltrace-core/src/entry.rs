//! Proxy traffic log entries.

use serde::{Deserialize, Serialize};

/// Firewall action recorded for a traffic event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    /// Traffic was allowed through
    Allow,
    /// Traffic was blocked at the perimeter
    Block,
}

/// One logged network event from a web proxy / firewall export.
///
/// Field names on the wire keep the export's PascalCase headers; `id` is
/// assigned once at ingestion and never recomputed. Entries are read-only
/// during an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Opaque unique identity, assigned at ingestion
    pub id: String,

    /// ISO-8601 timestamp (lexicographically sortable)
    #[serde(rename = "Timestamp")]
    pub timestamp: String,

    /// Source IP address
    #[serde(rename = "SourceIP")]
    pub source_ip: String,

    /// Destination URL
    #[serde(rename = "DestURL")]
    pub dest_url: String,

    /// Allow or Block
    #[serde(rename = "Action")]
    pub action: Action,

    /// Threat category; `"None"` means no category
    #[serde(rename = "ThreatCategory")]
    pub threat_category: String,

    /// Bytes sent outbound
    #[serde(rename = "BytesSent")]
    pub bytes_sent: u64,

    /// Bytes received
    #[serde(rename = "BytesReceived")]
    pub bytes_received: u64,

    /// Client signature string
    #[serde(rename = "UserAgent")]
    pub user_agent: String,

    /// Source user identity
    #[serde(rename = "SourceUser")]
    pub source_user: String,

    /// Application name
    #[serde(rename = "AppName")]
    pub app_name: String,
}

impl LogEntry {
    /// Whether the entry carries a real threat category
    pub fn has_threat_category(&self) -> bool {
        self.threat_category != "None"
    }
}
