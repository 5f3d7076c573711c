// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Finding aggregation and severity escalation.
//!
//! A single pass over the per-item analyses folds every finding through
//! [`Escalation::observe`]. Risk only ever moves up the total order of
//! [`Severity`], so the result is independent of item order.

use crate::domain::catalog::Severity;
use crate::domain::finding::{EvidenceAnalysis, Finding};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall risk is expressed on the same scale as finding severity.
pub type RiskLevel = Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStatus {
    Pass,
    Fail,
    Warning,
    InsufficientData,
}

impl InspectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warning => "warning",
            Self::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalate-if-higher reducer over finding severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escalation {
    pub status: InspectionStatus,
    pub risk_level: RiskLevel,
}

impl Default for Escalation {
    fn default() -> Self {
        Self {
            status: InspectionStatus::Pass,
            risk_level: Severity::Low,
        }
    }
}

impl Escalation {
    /// Low severities never escalate. Anything else raises the state only when
    /// it is at least as severe as the current risk.
    pub fn observe(self, severity: Severity) -> Self {
        if severity == Severity::Low || severity < self.risk_level {
            return self;
        }
        let status = match severity {
            Severity::Critical | Severity::High => InspectionStatus::Fail,
            Severity::Medium => InspectionStatus::Warning,
            Severity::Low => self.status,
        };
        Self {
            status,
            risk_level: severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub status: InspectionStatus,
    pub risk_level: RiskLevel,
    pub findings: Vec<Finding>,
    /// Mean confidence over analyzed items only
    pub confidence: f64,
    pub analyzed_count: usize,
}

/// Combine per-item analyses into one verdict.
pub fn aggregate(analyses: &[EvidenceAnalysis]) -> EvaluationResult {
    let mut escalation = Escalation::default();
    let mut findings = Vec::new();
    let mut analyzed_count = 0usize;
    let mut total_confidence = 0.0;

    for analysis in analyses.iter().filter(|a| a.analyzed) {
        analyzed_count += 1;
        total_confidence += analysis.confidence;

        for finding in analysis.findings() {
            escalation = escalation.observe(finding.severity);
            findings.push(finding);
        }
    }

    let status = if !findings.is_empty() {
        escalation.status
    } else if analyzed_count > 0 {
        InspectionStatus::Pass
    } else {
        InspectionStatus::InsufficientData
    };

    EvaluationResult {
        status,
        risk_level: escalation.risk_level,
        findings,
        confidence: if analyzed_count > 0 {
            total_confidence / analyzed_count as f64
        } else {
            0.0
        },
        analyzed_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::evidence::EvidenceType;
    use crate::domain::finding::{Observation, ObservationKind};

    fn issue(severity: Severity, confidence: f64) -> Observation {
        Observation {
            kind: ObservationKind::Issue,
            severity,
            category: Some("general".to_string()),
            description: format!("{} issue", severity),
            confidence,
            location: None,
            recommendation: None,
            document_reference: None,
        }
    }

    fn analyzed(index: usize, observations: Vec<Observation>) -> EvidenceAnalysis {
        EvidenceAnalysis::analyzed(index, EvidenceType::Image, None, observations, None)
    }

    #[test]
    fn test_escalation_ladder() {
        let e = Escalation::default().observe(Severity::Medium);
        assert_eq!(e.status, InspectionStatus::Warning);
        let e = e.observe(Severity::High);
        assert_eq!((e.status, e.risk_level), (InspectionStatus::Fail, Severity::High));
        let e = e.observe(Severity::Medium);
        assert_eq!((e.status, e.risk_level), (InspectionStatus::Fail, Severity::High));
        let e = e.observe(Severity::Critical).observe(Severity::Low);
        assert_eq!((e.status, e.risk_level), (InspectionStatus::Fail, Severity::Critical));
    }

    #[test]
    fn test_clean_batch_passes() {
        let result = aggregate(&[analyzed(0, vec![]), analyzed(1, vec![])]);
        assert_eq!(result.status, InspectionStatus::Pass);
        assert_eq!(result.risk_level, Severity::Low);
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_all_failed_is_insufficient_data() {
        let result = aggregate(&[
            EvidenceAnalysis::failed(0, EvidenceType::Image, None, "fetch failed"),
            EvidenceAnalysis::not_implemented(1, EvidenceType::Sensor, "not implemented"),
        ]);
        assert_eq!(result.status, InspectionStatus::InsufficientData);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.analyzed_count, 0);
    }

    #[test]
    fn test_partial_failure_without_violations_passes() {
        let result = aggregate(&[
            EvidenceAnalysis::failed(0, EvidenceType::Image, None, "fetch failed"),
            analyzed(1, vec![]),
        ]);
        assert_eq!(result.status, InspectionStatus::Pass);
    }

    #[test]
    fn test_low_only_violations_do_not_escalate() {
        let result = aggregate(&[analyzed(0, vec![issue(Severity::Low, 0.5)])]);
        assert_eq!(result.status, InspectionStatus::Pass);
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn test_mixed_batch_scenario() {
        let result = aggregate(&[
            analyzed(0, vec![issue(Severity::Medium, 0.6)]),
            EvidenceAnalysis::failed(1, EvidenceType::Image, None, "parse error"),
            analyzed(2, vec![issue(Severity::Critical, 0.9)]),
        ]);
        assert_eq!(result.status, InspectionStatus::Fail);
        assert_eq!(result.risk_level, Severity::Critical);
        assert!((result.confidence - 0.75).abs() < 1e-9);
        assert_eq!(result.analyzed_count, 2);
    }
}
