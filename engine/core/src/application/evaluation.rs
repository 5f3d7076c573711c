// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Evaluation Service
//!
//! The engine boundary: one call turns an inspection request into an
//! [`InspectionReport`].
//!
//! # Pipeline
//!
//! 1. Validate the request (input type, payload shape, item cap, pack id)
//! 2. Resolve the standards profile
//! 3. Reserve one credit per evidence item
//! 4. Retrieve reference passages when the profile lists documents
//! 5. Dispatch evidence
//! 6. Settle credits for the items actually attempted
//! 7. Aggregate findings and generate required actions
//!
//! Steps 1 and 2 have no side effects, so an invalid request never touches
//! the ledger or the reasoning service. Once credits are reserved the
//! reservation is always either settled or released.

use crate::application::evidence_dispatcher::{DispatchContext, EvidenceDispatcher};
use crate::application::profile_resolver::{ProfileResolver, ProfileSelector, ProfileSource};
use crate::application::prompt_composer::{validate_inputs, PromptComposer, PromptMetadata};
use crate::domain::actions::{self, RequiredAction};
use crate::domain::catalog::{ProtocolPack, RuleCatalog};
use crate::domain::credits::{CreditLedger, CreditReservation};
use crate::domain::errors::{EngineError, ValidationError};
use crate::domain::events::EvaluationEvent;
use crate::domain::evidence::{EvidenceType, InspectRequest, MAX_EVIDENCE_ITEMS};
use crate::domain::finding::{EvidenceAnalysis, Finding};
use crate::domain::profile::{Industry, ProfileId, StandardsProfile, TaskType};
use crate::domain::repository::ProfileRepository;
use crate::domain::retrieval::{ReferenceChunk, ReferenceRetriever};
use crate::domain::verdict::{aggregate, InspectionStatus, RiskLevel};
use crate::infrastructure::event_bus::EventBus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionReport {
    pub inspection_id: Uuid,
    pub status: InspectionStatus,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub findings: Vec<Finding>,
    pub required_actions: Vec<RequiredAction>,
    /// Per-item outcome, including errors for items that were not analyzed
    pub evidence: Vec<EvidenceAnalysis>,
    /// True when at least one item was analyzed
    pub audit_ready: bool,
    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub protocol_pack: Option<String>,
    pub profile_id: String,
    pub profile_source: String,
    pub input_type: EvidenceType,
    pub location: Option<String>,
    pub operator: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub credits_used: u64,
    pub remaining_credits: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub struct EvaluationService {
    catalog: Arc<RuleCatalog>,
    resolver: ProfileResolver,
    composer: Arc<PromptComposer>,
    dispatcher: EvidenceDispatcher,
    ledger: Arc<dyn CreditLedger>,
    event_bus: EventBus,
    retriever: Option<Arc<dyn ReferenceRetriever>>,
    retrieval_top_k: usize,
    max_items: usize,
}

impl EvaluationService {
    pub fn new(
        catalog: Arc<RuleCatalog>,
        profiles: Arc<dyn ProfileRepository>,
        composer: Arc<PromptComposer>,
        dispatcher: EvidenceDispatcher,
        ledger: Arc<dyn CreditLedger>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            catalog,
            resolver: ProfileResolver::new(profiles),
            composer,
            dispatcher,
            ledger,
            event_bus,
            retriever: None,
            retrieval_top_k: 5,
            max_items: MAX_EVIDENCE_ITEMS,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn ReferenceRetriever>, top_k: usize) -> Self {
        self.retriever = Some(retriever);
        self.retrieval_top_k = top_k;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.min(MAX_EVIDENCE_ITEMS);
        self
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &Arc<dyn CreditLedger> {
        &self.ledger
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub async fn evaluate(
        &self,
        account_id: &str,
        request: &InspectRequest,
        cancel: &CancellationToken,
    ) -> Result<InspectionReport, EngineError> {
        let inspection_id = Uuid::new_v4();
        let started = Instant::now();

        let prepared = match self.prepare(account_id, request).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.reject(inspection_id, account_id, &e);
                return Err(e);
            }
        };
        let Prepared {
            input_type,
            items,
            pack,
            resolved_source,
            profile,
            mut warnings,
        } = prepared;

        let units = items.len() as u64;
        let reservation = match self.ledger.authorize(account_id, units).await {
            Ok(reservation) => reservation,
            Err(e) => {
                let e = EngineError::from(e);
                self.reject(inspection_id, account_id, &e);
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            self.release(&reservation).await;
            self.reject(inspection_id, account_id, &EngineError::Cancelled);
            return Err(EngineError::Cancelled);
        }

        info!(
            %inspection_id,
            account_id,
            profile_id = %profile.id,
            %input_type,
            items = items.len(),
            "Starting evaluation"
        );
        self.event_bus.publish(EvaluationEvent::EvaluationStarted {
            inspection_id,
            account_id: account_id.to_string(),
            profile_id: profile.id.to_string(),
            protocol_pack: pack.map(|p| p.id.clone()),
            item_count: items.len(),
            started_at: Utc::now(),
        });

        let location = request
            .context
            .location
            .clone()
            .or_else(|| request.context.area.clone());
        let references = self
            .retrieve_references(&profile, location.as_deref(), &mut warnings)
            .await;
        for w in validate_inputs(Some(&profile), &references) {
            if !warnings.contains(&w) {
                warnings.push(w);
            }
        }

        let context = DispatchContext {
            metadata: PromptMetadata {
                location: location.clone(),
                pack_name: pack.map(|p| p.name.clone()),
                standards: pack
                    .map(|p| self.catalog.effective_standards(&p.id).to_vec())
                    .unwrap_or_default(),
            },
            profile,
            references,
        };

        let outcome = self.dispatcher.process_batch(items, &context, cancel).await;

        let consumed = outcome.attempted as u64;
        let balance = self.ledger.settle(&reservation, consumed).await?;
        metrics::counter!("protocollm_credits_debited_total").increment(consumed);
        self.event_bus.publish(EvaluationEvent::CreditsSettled {
            inspection_id,
            account_id: account_id.to_string(),
            reserved: reservation.units,
            consumed,
            remaining: balance.remaining,
            settled_at: Utc::now(),
        });

        if outcome.cancelled {
            warn!(%inspection_id, attempted = outcome.attempted, "Evaluation cancelled");
            self.reject(inspection_id, account_id, &EngineError::Cancelled);
            return Err(EngineError::Cancelled);
        }

        for analysis in &outcome.analyses {
            self.publish_item(inspection_id, analysis);
        }

        let result = aggregate(&outcome.analyses);
        let required_actions = actions::generate(&result.findings);
        let duration_ms = started.elapsed().as_millis() as u64;

        metrics::counter!("protocollm_evaluations_total", "status" => result.status.as_str()).increment(1);
        metrics::histogram!("protocollm_evaluation_duration_seconds").record(started.elapsed().as_secs_f64());
        self.event_bus.publish(EvaluationEvent::EvaluationCompleted {
            inspection_id,
            status: result.status,
            risk_level: result.risk_level,
            finding_count: result.findings.len(),
            duration_ms,
            completed_at: Utc::now(),
        });
        info!(
            %inspection_id,
            status = %result.status,
            risk_level = %result.risk_level,
            findings = result.findings.len(),
            credits_used = consumed,
            duration_ms,
            "Evaluation completed"
        );

        Ok(InspectionReport {
            inspection_id,
            status: result.status,
            risk_level: result.risk_level,
            confidence: result.confidence,
            audit_ready: result.analyzed_count > 0,
            findings: result.findings,
            required_actions,
            evidence: outcome.analyses,
            metadata: ReportMetadata {
                protocol_pack: request.protocol_pack.clone(),
                profile_id: context.profile.id.to_string(),
                profile_source: source_label(resolved_source).to_string(),
                input_type,
                location,
                operator: request.context.operator.clone(),
                timestamp: Utc::now(),
                credits_used: consumed,
                remaining_credits: balance.remaining,
                warnings,
            },
        })
    }

    /// Ask the reasoning service for an executive summary of a finished report.
    pub async fn summarize(&self, report: &InspectionReport) -> Result<String, EngineError> {
        let resolved = self
            .resolver
            .resolve(&ProfileSelector::Explicit(ProfileId::new(report.metadata.profile_id.clone())))
            .await?;
        let prompt = self.composer.compose_summary(&report.evidence, &resolved.profile);
        self.dispatcher
            .reasoning()
            .invoke(&prompt, None)
            .await
            .map_err(|e| EngineError::Backend(format!("summary generation failed: {}", e)))
    }

    async fn prepare<'a>(&'a self, account_id: &str, request: &InspectRequest) -> Result<Prepared<'a>, EngineError> {
        if account_id.trim().is_empty() {
            return Err(ValidationError::MissingAccount.into());
        }

        let input_type = request.input_type()?;
        let items = request.into_items(self.max_items)?;

        let pack = match request.protocol_pack.as_deref() {
            Some(id) => Some(
                self.catalog
                    .get(id)
                    .filter(|p| p.active)
                    .ok_or_else(|| ValidationError::UnknownProtocolPack(id.to_string()))?,
            ),
            None => None,
        };

        let selector = profile_selector(request, pack)?;
        let resolved = self.resolver.resolve(&selector).await?;

        Ok(Prepared {
            input_type,
            items,
            pack,
            resolved_source: resolved.source,
            profile: resolved.profile,
            warnings: resolved.warnings,
        })
    }

    async fn retrieve_references(
        &self,
        profile: &StandardsProfile,
        location: Option<&str>,
        warnings: &mut Vec<String>,
    ) -> Vec<ReferenceChunk> {
        if profile.document_ids.is_empty() {
            return Vec::new();
        }
        let Some(retriever) = &self.retriever else {
            warnings.push("Profile references documents but no retriever is configured".to_string());
            return Vec::new();
        };

        let mut query = format!(
            "{} {} requirements",
            profile.industry(),
            profile.task_type().description()
        );
        if let Some(location) = location {
            query.push_str(" for ");
            query.push_str(location);
        }

        match retriever.search(&query, self.retrieval_top_k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(profile_id = %profile.id, "Reference retrieval failed, continuing without documents: {}", e);
                warnings.push(format!("Reference documents unavailable: {}", e));
                Vec::new()
            }
        }
    }

    fn publish_item(&self, inspection_id: Uuid, analysis: &EvidenceAnalysis) {
        let outcome = if analysis.analyzed {
            "analyzed"
        } else if analysis.note.is_some() {
            "not_implemented"
        } else {
            "failed"
        };
        metrics::counter!("protocollm_evidence_items_total", "outcome" => outcome).increment(1);

        let event = if analysis.analyzed {
            EvaluationEvent::EvidenceAnalyzed {
                inspection_id,
                index: analysis.index,
                evidence_type: analysis.evidence_type,
                finding_count: analysis.issues().count(),
                confidence: analysis.confidence,
                analyzed_at: Utc::now(),
            }
        } else {
            EvaluationEvent::EvidenceFailed {
                inspection_id,
                index: analysis.index,
                evidence_type: analysis.evidence_type,
                reason: analysis
                    .error
                    .clone()
                    .or_else(|| analysis.note.clone())
                    .unwrap_or_default(),
                failed_at: Utc::now(),
            }
        };
        self.event_bus.publish(event);
    }

    async fn release(&self, reservation: &CreditReservation) {
        if let Err(e) = self.ledger.release(reservation).await {
            warn!(reservation = %reservation.id, "Failed to release credit reservation: {}", e);
        }
    }

    fn reject(&self, inspection_id: Uuid, account_id: &str, error: &EngineError) {
        metrics::counter!("protocollm_evaluations_rejected_total", "reason" => error.code()).increment(1);
        self.event_bus.publish(EvaluationEvent::EvaluationRejected {
            inspection_id,
            account_id: account_id.to_string(),
            reason: error.to_string(),
            rejected_at: Utc::now(),
        });
    }
}

struct Prepared<'a> {
    input_type: EvidenceType,
    items: Vec<crate::domain::evidence::EvidenceItem>,
    pack: Option<&'a ProtocolPack>,
    resolved_source: ProfileSource,
    profile: StandardsProfile,
    warnings: Vec<String>,
}

/// An explicit profile id wins. Otherwise industry comes from the request or,
/// failing that, from the pack's sector.
fn profile_selector(
    request: &InspectRequest,
    pack: Option<&ProtocolPack>,
) -> Result<ProfileSelector, EngineError> {
    if let Some(id) = request.profile_id.as_deref().filter(|id| !id.is_empty()) {
        return Ok(ProfileSelector::Explicit(ProfileId::new(id)));
    }

    let industry = match request.industry.as_deref() {
        Some(s) => Some(s.parse::<Industry>().map_err(ValidationError::MalformedPayload)?),
        None => pack.map(|p| Industry::from_pack_sector(&p.sector)),
    };
    let task_type = request
        .task_type
        .as_deref()
        .map(str::parse::<TaskType>)
        .transpose()
        .map_err(ValidationError::MalformedPayload)?;

    Ok(match (industry, task_type) {
        (None, None) => ProfileSelector::Unconfigured,
        (industry, task_type) => ProfileSelector::Scoped {
            industry: industry.unwrap_or_default(),
            task_type: task_type.unwrap_or_default(),
        },
    })
}

fn source_label(source: ProfileSource) -> &'static str {
    match source {
        ProfileSource::Explicit => "explicit",
        ProfileSource::ExactSystem => "system",
        ProfileSource::IndustryGeneral => "industry_default",
        ProfileSource::ZeroConfig => "zero_config",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> InspectRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_explicit_profile_wins() {
        let req = request(json!({
            "profile_id": "p-1",
            "industry": "retail",
            "input_type": "text",
            "payload": {"text": "x"}
        }));
        assert_eq!(
            profile_selector(&req, None).unwrap(),
            ProfileSelector::Explicit(ProfileId::new("p-1"))
        );
    }

    #[test]
    fn test_pack_sector_implies_industry() {
        let catalog = RuleCatalog::builtin();
        let pack = catalog.get("food_service_nationwide_v1");
        let req = request(json!({"input_type": "text", "payload": {"text": "x"}}));
        assert_eq!(
            profile_selector(&req, pack).unwrap(),
            ProfileSelector::Scoped {
                industry: Industry::Food,
                task_type: TaskType::General
            }
        );
    }

    #[test]
    fn test_no_configuration_is_unconfigured() {
        let req = request(json!({"input_type": "text", "payload": {"text": "x"}}));
        assert_eq!(profile_selector(&req, None).unwrap(), ProfileSelector::Unconfigured);
    }

    #[test]
    fn test_unknown_industry_is_rejected() {
        let req = request(json!({"industry": "aerospace", "input_type": "text", "payload": {}}));
        let err = profile_selector(&req, None).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::MalformedPayload(_))));
    }
}
