// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Property tests for verdict aggregation and action generation.

use proptest::prelude::*;
use protocollm_core::domain::actions::{self, Urgency};
use protocollm_core::domain::catalog::Severity;
use protocollm_core::domain::evidence::EvidenceType;
use protocollm_core::domain::finding::{EvidenceAnalysis, Observation, ObservationKind};
use protocollm_core::domain::verdict::{aggregate, InspectionStatus};

fn severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

fn observation() -> impl Strategy<Value = Observation> {
    (severity(), 0.0f64..=1.0).prop_map(|(severity, confidence)| Observation {
        kind: ObservationKind::Issue,
        severity,
        category: Some("general".to_string()),
        description: format!("{} violation", severity),
        confidence,
        location: None,
        recommendation: None,
        document_reference: None,
    })
}

/// `None` stands for an item whose analysis failed.
fn batch() -> impl Strategy<Value = Vec<Option<Vec<Observation>>>> {
    prop::collection::vec(
        prop::option::weighted(0.8, prop::collection::vec(observation(), 0..4)),
        1..8,
    )
}

fn analyses(batch: &[Option<Vec<Observation>>]) -> Vec<EvidenceAnalysis> {
    batch
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Some(observations) => {
                EvidenceAnalysis::analyzed(i, EvidenceType::Image, None, observations.clone(), None)
            }
            None => EvidenceAnalysis::failed(i, EvidenceType::Image, None, "fetch failed"),
        })
        .collect()
}

proptest! {
    #[test]
    fn risk_level_is_the_highest_escalating_severity(batch in batch()) {
        let result = aggregate(&analyses(&batch));

        let highest = batch
            .iter()
            .flatten()
            .flatten()
            .map(|o| o.severity)
            .filter(|s| *s != Severity::Low)
            .max()
            .unwrap_or(Severity::Low);
        prop_assert_eq!(result.risk_level, highest);

        let expected = match highest {
            Severity::Critical | Severity::High => InspectionStatus::Fail,
            Severity::Medium => InspectionStatus::Warning,
            Severity::Low if batch.iter().any(Option::is_some) => InspectionStatus::Pass,
            Severity::Low => InspectionStatus::InsufficientData,
        };
        prop_assert_eq!(result.status, expected);
    }

    #[test]
    fn all_critical_batch_fails_in_any_order(batch in batch(), seed in any::<u64>()) {
        let critical: Vec<Option<Vec<Observation>>> = batch
            .iter()
            .map(|item| {
                let mut observations = item.clone().unwrap_or_default();
                for o in &mut observations {
                    o.severity = Severity::Critical;
                }
                if observations.is_empty() {
                    observations.push(Observation {
                        kind: ObservationKind::Issue,
                        severity: Severity::Critical,
                        category: None,
                        description: "critical violation".to_string(),
                        confidence: 0.9,
                        location: None,
                        recommendation: None,
                        document_reference: None,
                    });
                }
                Some(observations)
            })
            .collect();
        let mut shuffled = critical.clone();
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();

        for order in [critical, shuffled] {
            let result = aggregate(&analyses(&order));
            prop_assert_eq!(result.status, InspectionStatus::Fail);
            prop_assert_eq!(result.risk_level, Severity::Critical);
        }
    }

    #[test]
    fn confidence_ignores_failed_items(batch in batch()) {
        let result = aggregate(&analyses(&batch));
        prop_assert!((0.0..=1.0).contains(&result.confidence));
        if result.analyzed_count == 0 {
            prop_assert_eq!(result.confidence, 0.0);
        }
        prop_assert_eq!(result.analyzed_count, batch.iter().filter(|b| b.is_some()).count());
    }

    #[test]
    fn every_finding_gets_exactly_one_action(batch in batch()) {
        let result = aggregate(&analyses(&batch));
        let actions = actions::generate(&result.findings);

        prop_assert_eq!(actions.len(), result.findings.len());
        for (action, finding) in actions.iter().zip(&result.findings) {
            prop_assert_eq!(action.evidence_index, finding.evidence_index);
            prop_assert_eq!(action.urgency == Urgency::Immediate, finding.severity == Severity::Critical);
            prop_assert_eq!(action.verification_required, finding.severity >= Severity::High);
        }
    }
}
