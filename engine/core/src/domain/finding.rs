// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Findings and per-item analyses
//!
//! The reasoning service answers with loosely typed JSON. This module turns
//! that text into [`Observation`]s, records one [`EvidenceAnalysis`] per
//! evidence item and projects issue observations into immutable [`Finding`]s.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Response parsing and the per-item result value objects

use crate::domain::catalog::Severity;
use crate::domain::evidence::EvidenceType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Confidence reported for an analyzed item with no issues.
pub const CLEAN_ITEM_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Issue,
    Confirmation,
}

/// One normalized entry from the reasoning service's `findings` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub kind: ObservationKind,
    pub severity: Severity,
    pub category: Option<String>,
    pub description: String,
    pub confidence: f64,
    pub location: Option<String>,
    pub recommendation: Option<String>,
    pub document_reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    #[serde(default)]
    pub compliant: Option<bool>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("response contained no JSON object")]
    NoJson,

    #[error("malformed analysis JSON: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
    #[serde(default)]
    document_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(default)]
    findings: Vec<RawObservation>,
    #[serde(default)]
    overall_assessment: Option<OverallAssessment>,
}

/// Parsed reasoning-service response for one prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub observations: Vec<Observation>,
    pub overall_assessment: Option<OverallAssessment>,
}

impl AnalysisReport {
    /// Parse a reasoning response, unwrapping Markdown code fences.
    ///
    /// Unknown or missing severities default to `medium`; confidences are
    /// clamped into `[0, 1]`.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let json = extract_json(text).ok_or(ParseError::NoJson)?;
        let raw: RawReport =
            serde_json::from_str(&json).map_err(|e| ParseError::Malformed(e.to_string()))?;

        let observations = raw
            .findings
            .into_iter()
            .filter_map(|r| {
                let description = r.description.filter(|d| !d.trim().is_empty())?;
                let kind = match r.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
                    Some("confirmation") => ObservationKind::Confirmation,
                    _ => ObservationKind::Issue,
                };
                Some(Observation {
                    kind,
                    severity: r
                        .severity
                        .as_deref()
                        .and_then(Severity::from_label)
                        .unwrap_or(Severity::Medium),
                    category: r.category,
                    description,
                    confidence: r.confidence.unwrap_or(0.7).clamp(0.0, 1.0),
                    location: r.location,
                    recommendation: r.recommendation,
                    document_reference: r.document_reference.filter(|d| !d.trim().is_empty()),
                })
            })
            .collect();

        Ok(Self {
            observations,
            overall_assessment: raw.overall_assessment,
        })
    }
}

/// Locate the JSON object in a model response.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed.to_string());
    }

    for marker in ["```json", "```"] {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end_offset) = text[content_start..].find("```") {
                let content_end = content_start + end_offset;
                return Some(text[content_start..content_end].trim().to_string());
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| text[start..=end].to_string())
}

/// One discrete violation attributed to one evidence item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub protocol_reference: String,
    pub description: String,
    pub evidence_type: EvidenceType,
    pub evidence_index: usize,
    pub confidence: f64,
    pub severity: Severity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Outcome of dispatching one evidence item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceAnalysis {
    pub index: usize,
    pub evidence_type: EvidenceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_locator: Option<String>,

    pub analyzed: bool,

    #[serde(default)]
    pub observations: Vec<Observation>,

    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// SHA-256 of persisted evidence bytes, when the evidence store accepted them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_digest: Option<String>,
}

impl EvidenceAnalysis {
    /// A successfully analyzed item. Confidence is that of the most severe
    /// issue, or [`CLEAN_ITEM_CONFIDENCE`] when there are none.
    pub fn analyzed(
        index: usize,
        evidence_type: EvidenceType,
        source_locator: Option<String>,
        observations: Vec<Observation>,
        summary: Option<String>,
    ) -> Self {
        let mut analysis = Self {
            index,
            evidence_type,
            source_locator,
            analyzed: true,
            observations,
            confidence: CLEAN_ITEM_CONFIDENCE,
            summary,
            error: None,
            note: None,
            evidence_digest: None,
        };
        if let Some(top) = analysis.most_severe_issue() {
            analysis.confidence = top.confidence;
        }
        analysis
    }

    pub fn failed(
        index: usize,
        evidence_type: EvidenceType,
        source_locator: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            index,
            evidence_type,
            source_locator,
            analyzed: false,
            observations: Vec::new(),
            confidence: 0.0,
            summary: None,
            error: Some(error.into()),
            note: None,
            evidence_digest: None,
        }
    }

    /// Declared capability gap: attempted, but nothing was analyzed.
    pub fn not_implemented(
        index: usize,
        evidence_type: EvidenceType,
        note: impl Into<String>,
    ) -> Self {
        Self {
            note: Some(note.into()),
            error: None,
            ..Self::failed(index, evidence_type, None, "")
        }
    }

    pub fn issues(&self) -> impl Iterator<Item = &Observation> {
        self.observations
            .iter()
            .filter(|o| o.kind == ObservationKind::Issue)
    }

    /// First issue of the highest severity.
    pub fn most_severe_issue(&self) -> Option<&Observation> {
        self.issues().fold(None, |best: Option<&Observation>, o| match best {
            Some(b) if b.severity >= o.severity => Some(b),
            _ => Some(o),
        })
    }

    /// Project issue observations into findings. Unanalyzed items yield none.
    pub fn findings(&self) -> Vec<Finding> {
        if !self.analyzed {
            return Vec::new();
        }
        self.issues()
            .map(|o| Finding {
                protocol_reference: o
                    .document_reference
                    .clone()
                    .or_else(|| o.category.clone())
                    .unwrap_or_else(|| "general".to_string()),
                description: o.description.clone(),
                evidence_type: self.evidence_type,
                evidence_index: self.index,
                confidence: o.confidence,
                severity: o.severity,
                location: o.location.clone(),
                recommendation: o.recommendation.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"Here is my analysis:
```json
{
  "findings": [
    {"type": "confirmation", "severity": "info", "category": "sanitation", "description": "Prep table is clean", "confidence": 0.9},
    {"type": "issue", "severity": "major", "category": "cross_contamination", "description": "Raw chicken above lettuce", "confidence": 0.82, "document_reference": "FDA-3-302.11"},
    {"type": "issue", "severity": "minor", "category": "food_labeling", "description": "Unlabeled container", "confidence": 0.6}
  ],
  "overall_assessment": {"compliant": false, "score": 55, "summary": "Storage order violation"}
}
```"#;

    #[test]
    fn test_parse_fenced_response_normalizes_severity() {
        let report = AnalysisReport::parse(RESPONSE).unwrap();
        assert_eq!(report.observations.len(), 3);
        assert_eq!(report.observations[0].kind, ObservationKind::Confirmation);
        assert_eq!(report.observations[1].severity, Severity::High);
        assert_eq!(report.observations[2].severity, Severity::Medium);
        assert_eq!(
            report.overall_assessment.unwrap().summary.as_deref(),
            Some("Storage order violation")
        );
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert_eq!(
            AnalysisReport::parse("I could not see the image."),
            Err(ParseError::NoJson)
        );
        assert!(matches!(
            AnalysisReport::parse("{\"findings\": [1, 2]}"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_analysis_confidence_follows_most_severe_issue() {
        let report = AnalysisReport::parse(RESPONSE).unwrap();
        let analysis =
            EvidenceAnalysis::analyzed(0, EvidenceType::Image, None, report.observations, None);
        assert_eq!(analysis.confidence, 0.82);

        let findings = analysis.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].protocol_reference, "FDA-3-302.11");
        assert_eq!(findings[1].protocol_reference, "food_labeling");
    }

    #[test]
    fn test_clean_item_confidence() {
        let analysis = EvidenceAnalysis::analyzed(0, EvidenceType::Text, None, vec![], None);
        assert_eq!(analysis.confidence, CLEAN_ITEM_CONFIDENCE);
        assert!(analysis.findings().is_empty());
    }

    #[test]
    fn test_failed_item_has_no_findings() {
        let analysis = EvidenceAnalysis::failed(2, EvidenceType::Image, None, "timed out");
        assert!(!analysis.analyzed);
        assert_eq!(analysis.error.as_deref(), Some("timed out"));
        assert!(analysis.findings().is_empty());
    }
}
