//! Decision metrics.

use metrics::counter;

use crate::models::AccessDomain;
use crate::services::resolver::ResolvedDecision;

/// Count every completed evaluation by domain, decision and reason.
pub fn record_decision(domain: AccessDomain, resolved: &ResolvedDecision) {
    let labels = [
        ("domain", domain.as_str().to_string()),
        ("decision", resolved.decision.as_str().to_string()),
        (
            "reason",
            resolved
                .reason
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| "granted".to_string()),
        ),
    ];
    counter!("access_decisions_total", &labels).increment(1);
}
