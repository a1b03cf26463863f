//! Remediation guidance endpoint.
//!
//! Given a flagged entry and the reason it was flagged, returns a short
//! remediation plan. Without a model backend the plan comes from a fixed
//! playbook keyed on the reason text, so demo mode still produces specific
//! guidance.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::json;
use signaltrace_core::LogEntry;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::model::{remediation_prompt, REMEDIATION_SYSTEM};
use crate::AppState;

/// Produce a remediation plan for one flagged log entry
pub async fn remediate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<serde_json::Value>> {
    let log = body.get("log").cloned();
    let reason = body.get("reason").and_then(|v| v.as_str());
    let (log, reason) = match (log, reason) {
        (Some(log), Some(reason)) if !reason.is_empty() => (log, reason.to_string()),
        _ => return Err(ApiError::MissingRemediationFields),
    };
    let log: LogEntry =
        serde_json::from_value(log).map_err(|_| ApiError::MissingRemediationFields)?;

    let remediation = match &state.model {
        Some(model) => {
            model
                .complete(REMEDIATION_SYSTEM, &remediation_prompt(&log, &reason))
                .await?
        }
        None => {
            warn!("no model backend configured, returning playbook remediation");
            playbook_remediation(&log, &reason)
        }
    };

    Ok(Json(json!({ "remediation": remediation })))
}

/// Canned playbooks keyed on the classification reason.
fn playbook_remediation(log: &LogEntry, reason: &str) -> String {
    if reason.contains("Shadow IT") || log.app_name == "Tor Browser" {
        "CRITICAL: Block Tor-related IP ranges at the network perimeter. Update endpoint \
         policy to prevent installation of unauthorized browsers. Interview the user \
         regarding bypass attempts."
            .to_string()
    } else if reason.contains("Large outbound data transfer") {
        format!(
            "INVESTIGATE: Immediate lockdown of account '{}'. Review recently modified \
             files in Dropbox. Revoke all active OAuth tokens for this user. Validate if \
             this was a scheduled backup or unauthorized exfiltration.",
            log.source_user
        )
    } else if reason.contains("Known threat category") {
        format!(
            "ISOLATE: Quarantining source IP {} immediately. Update firewall signatures \
             for {}. Run endpoint detection and response (EDR) deep scan on the affected \
             host.",
            log.source_ip, log.dest_url
        )
    } else if reason.contains("Suspicious scripted access") {
        "ENFORCE: Update Web Proxy policies to block non-browser User-Agents. Require MFA \
         for all command-line tool access to external resources. Review user's shell \
         history."
            .to_string()
    } else {
        "Standard security response: Reset user credentials and perform a full malware \
         scan on the source workstation."
            .to_string()
    }
}
