// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::evidence::EvidenceType;
use crate::domain::verdict::{InspectionStatus, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one evaluation request, published on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EvaluationEvent {
    EvaluationStarted {
        inspection_id: Uuid,
        account_id: String,
        profile_id: String,
        protocol_pack: Option<String>,
        item_count: usize,
        started_at: DateTime<Utc>,
    },
    EvidenceAnalyzed {
        inspection_id: Uuid,
        index: usize,
        evidence_type: EvidenceType,
        finding_count: usize,
        confidence: f64,
        analyzed_at: DateTime<Utc>,
    },
    EvidenceFailed {
        inspection_id: Uuid,
        index: usize,
        evidence_type: EvidenceType,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    EvaluationCompleted {
        inspection_id: Uuid,
        status: InspectionStatus,
        risk_level: RiskLevel,
        finding_count: usize,
        duration_ms: u64,
        completed_at: DateTime<Utc>,
    },
    CreditsSettled {
        inspection_id: Uuid,
        account_id: String,
        reserved: u64,
        consumed: u64,
        remaining: u64,
        settled_at: DateTime<Utc>,
    },
    /// Rejected before evidence processing (validation, credits, cancellation)
    EvaluationRejected {
        inspection_id: Uuid,
        account_id: String,
        reason: String,
        rejected_at: DateTime<Utc>,
    },
}

impl EvaluationEvent {
    pub fn inspection_id(&self) -> Uuid {
        match self {
            Self::EvaluationStarted { inspection_id, .. }
            | Self::EvidenceAnalyzed { inspection_id, .. }
            | Self::EvidenceFailed { inspection_id, .. }
            | Self::EvaluationCompleted { inspection_id, .. }
            | Self::CreditsSettled { inspection_id, .. }
            | Self::EvaluationRejected { inspection_id, .. } => *inspection_id,
        }
    }
}
