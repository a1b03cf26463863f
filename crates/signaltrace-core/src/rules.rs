//! Deterministic rule engine for traffic log classification.
//!
//! The decision policy is an explicit ordered table: the first rule whose
//! predicate matches wins and evaluation stops. The same table is rendered
//! verbatim into the remote model's prompt, so local and remote
//! classification share one policy.

use crate::entry::{Action, LogEntry};
use crate::verdict::Verdict;

/// Outbound byte volume above which an allowed transfer is treated as
/// potential exfiltration.
pub const EXFIL_BYTES_THRESHOLD: u64 = 10_000_000;

/// Applications that must never be allowed through the perimeter
/// (anonymizing/tunnel browsers, unauthorized P2P clients).
pub const DISALLOWED_APPS: &[&str] = &["Tor Browser", "BitTorrent", "Psiphon"];

/// Case-insensitive client-signature markers of scripted (non-browser) access.
pub const SCRIPTED_AGENT_MARKERS: &[&str] = &["python", "curl", "powershell"];

/// One row of the classification policy
struct Rule {
    name: &'static str,
    applies: fn(&LogEntry) -> bool,
    verdict: fn(&LogEntry) -> Verdict,
}

/// The ordered policy table. Order is load-bearing: shadow IT outranks
/// exfiltration and threat-category checks even when several predicates hold.
const RULES: &[Rule] = &[
    Rule {
        name: "mitigated",
        applies: |e| e.action == Action::Block,
        verdict: |e| {
            let category = if e.has_threat_category() {
                e.threat_category.as_str()
            } else {
                "Policy"
            };
            Verdict::new(
                &e.id,
                0,
                format!("Threat mitigated by perimeter controls ({category}). Action was blocked."),
            )
        },
    },
    Rule {
        name: "shadow-it",
        applies: |e| e.action == Action::Allow && DISALLOWED_APPS.contains(&e.app_name.as_str()),
        verdict: |e| {
            Verdict::new(
                &e.id,
                100,
                "CRITICAL: Unauthorized Shadow IT application allowed through firewall.",
            )
        },
    },
    Rule {
        name: "exfiltration",
        applies: |e| e.action == Action::Allow && e.bytes_sent > EXFIL_BYTES_THRESHOLD,
        verdict: |e| {
            Verdict::new(
                &e.id,
                85,
                "Large outbound data transfer (>10MB) to unverified destination.",
            )
        },
    },
    Rule {
        name: "known-threat",
        applies: |e| e.action == Action::Allow && e.has_threat_category(),
        verdict: |e| {
            Verdict::new(
                &e.id,
                95,
                format!(
                    "Known threat category ({}) allowed through firewall.",
                    e.threat_category
                ),
            )
        },
    },
    Rule {
        name: "suspicious-client",
        applies: |e| {
            let agent = e.user_agent.to_lowercase();
            e.action == Action::Allow && SCRIPTED_AGENT_MARKERS.iter().any(|m| agent.contains(m))
        },
        verdict: |e| Verdict::new(&e.id, 75, "Suspicious scripted access detected."),
    },
];

/// Classify one log entry under the fixed priority policy.
///
/// Deterministic and total: always returns exactly one verdict.
pub fn classify(entry: &LogEntry) -> Verdict {
    for rule in RULES {
        if (rule.applies)(entry) {
            tracing::debug!(id = %entry.id, rule = rule.name, "rule matched");
            return (rule.verdict)(entry);
        }
    }
    Verdict::new(&entry.id, 0, "Traffic appears normal.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: Action) -> LogEntry {
        LogEntry {
            id: "t-1".to_string(),
            timestamp: "2026-08-23T03:12:00.000Z".to_string(),
            source_ip: "10.0.0.55".to_string(),
            dest_url: "https://example.com/".to_string(),
            action,
            threat_category: "None".to_string(),
            bytes_sent: 1000,
            bytes_received: 2000,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)".to_string(),
            source_user: "user.7a3f@tenex.com".to_string(),
            app_name: "General Browsing".to_string(),
        }
    }

    #[test]
    fn test_blocked_is_mitigated_with_category() {
        let mut e = entry(Action::Block);
        e.threat_category = "Malware".to_string();
        let v = classify(&e);
        assert_eq!(v.confidence, 0);
        assert!(v.reason.contains("Malware"));
        assert!(!v.is_anomaly());
    }

    #[test]
    fn test_blocked_without_category_cites_policy() {
        let v = classify(&entry(Action::Block));
        assert_eq!(v.confidence, 0);
        assert!(v.reason.contains("Policy"));
    }

    #[test]
    fn test_blocked_wins_over_everything() {
        // All other predicates also hold; mitigation must still win.
        let mut e = entry(Action::Block);
        e.app_name = "Tor Browser".to_string();
        e.bytes_sent = 50_000_000;
        e.threat_category = "DLP Violation".to_string();
        e.user_agent = "curl/7.88.1".to_string();
        let v = classify(&e);
        assert_eq!(v.confidence, 0);
    }

    #[test]
    fn test_shadow_it_is_100() {
        let mut e = entry(Action::Allow);
        e.app_name = "Tor Browser".to_string();
        assert_eq!(classify(&e).confidence, 100);
    }

    #[test]
    fn test_shadow_it_outranks_exfiltration_and_threat() {
        let mut e = entry(Action::Allow);
        e.app_name = "Psiphon".to_string();
        e.bytes_sent = 50_000_000;
        e.threat_category = "C2 Server".to_string();
        let v = classify(&e);
        assert_eq!(v.confidence, 100);
        assert!(v.reason.contains("Shadow IT"));
    }

    #[test]
    fn test_exfiltration_is_85() {
        let mut e = entry(Action::Allow);
        e.bytes_sent = EXFIL_BYTES_THRESHOLD + 1;
        assert_eq!(classify(&e).confidence, 85);
    }

    #[test]
    fn test_exfiltration_threshold_is_exclusive() {
        let mut e = entry(Action::Allow);
        e.bytes_sent = EXFIL_BYTES_THRESHOLD;
        assert_eq!(classify(&e).confidence, 0);
    }

    #[test]
    fn test_exfiltration_outranks_threat_category() {
        let mut e = entry(Action::Allow);
        e.bytes_sent = 15_000_000;
        e.threat_category = "Spyware".to_string();
        assert_eq!(classify(&e).confidence, 85);
    }

    #[test]
    fn test_allowed_threat_category_is_95() {
        let mut e = entry(Action::Allow);
        e.threat_category = "Botnet".to_string();
        let v = classify(&e);
        assert_eq!(v.confidence, 95);
        assert!(v.reason.contains("Botnet"));
    }

    #[test]
    fn test_scripted_agent_is_75_case_insensitive() {
        let mut e = entry(Action::Allow);
        e.user_agent = "Python-Requests/2.28.1".to_string();
        assert_eq!(classify(&e).confidence, 75);

        e.user_agent = "Powershell/7.3.4".to_string();
        assert_eq!(classify(&e).confidence, 75);
    }

    #[test]
    fn test_default_is_normal() {
        let v = classify(&entry(Action::Allow));
        assert_eq!(v.confidence, 0);
        assert!(v.reason.contains("normal"));
    }
}
