// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Required remediation actions, one per finding.

use crate::domain::catalog::Severity;
use crate::domain::finding::Finding;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    SameDay,
    Scheduled,
}

impl From<Severity> for Urgency {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::Immediate,
            Severity::High => Self::SameDay,
            Severity::Medium | Severity::Low => Self::Scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredAction {
    pub action: String,
    pub urgency: Urgency,
    pub verification_required: bool,
    pub protocol_reference: String,
    pub evidence_index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Map findings 1:1 onto actions, preserving order. Repeated violations are
/// not merged.
pub fn generate(findings: &[Finding]) -> Vec<RequiredAction> {
    findings
        .iter()
        .map(|finding| RequiredAction {
            action: format!("Address violation: {}", finding.description),
            urgency: finding.severity.into(),
            verification_required: finding.severity >= Severity::High,
            protocol_reference: finding.protocol_reference.clone(),
            evidence_index: finding.evidence_index,
            recommendation: finding.recommendation.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::evidence::EvidenceType;

    fn finding(severity: Severity, description: &str) -> Finding {
        Finding {
            protocol_reference: "FDA-3-501.16".to_string(),
            description: description.to_string(),
            evidence_type: EvidenceType::Image,
            evidence_index: 0,
            confidence: 0.8,
            severity,
            location: None,
            recommendation: None,
        }
    }

    #[test]
    fn test_urgency_and_verification_mapping() {
        let actions = generate(&[
            finding(Severity::Critical, "Cooler at 50F"),
            finding(Severity::High, "No soap"),
            finding(Severity::Medium, "Unlabeled bin"),
            finding(Severity::Low, "Scuffed floor"),
        ]);
        let urgencies: Vec<Urgency> = actions.iter().map(|a| a.urgency).collect();
        assert_eq!(
            urgencies,
            vec![Urgency::Immediate, Urgency::SameDay, Urgency::Scheduled, Urgency::Scheduled]
        );
        let verify: Vec<bool> = actions.iter().map(|a| a.verification_required).collect();
        assert_eq!(verify, vec![true, true, false, false]);
        assert_eq!(actions[0].action, "Address violation: Cooler at 50F");
    }

    #[test]
    fn test_duplicates_are_not_merged() {
        let f = finding(Severity::Medium, "Unlabeled bin");
        assert_eq!(generate(&[f.clone(), f]).len(), 2);
    }
}
