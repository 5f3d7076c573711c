// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end tests for the evaluation pipeline.
//!
//! Each test wires a real `EvaluationService` with the in-memory profile
//! repository and credit ledger, a scripted reasoning service and a stub
//! evidence fetcher, then checks the report and the ledger state.

use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use parking_lot::Mutex;
use protocollm_core::application::evaluation::EvaluationService;
use protocollm_core::application::evidence_dispatcher::{DispatchSettings, EvidenceDispatcher};
use protocollm_core::application::prompt_composer::PromptComposer;
use protocollm_core::domain::actions::Urgency;
use protocollm_core::domain::catalog::{RuleCatalog, Severity};
use protocollm_core::domain::credits::CreditLedger;
use protocollm_core::domain::errors::EngineError;
use protocollm_core::domain::events::EvaluationEvent;
use protocollm_core::domain::evidence::InspectRequest;
use protocollm_core::domain::evidence_fetch::{EvidenceFetcher, FetchError, FetchedEvidence};
use protocollm_core::domain::reasoning::{ImagePayload, ReasoningError, ReasoningService};
use protocollm_core::domain::verdict::InspectionStatus;
use protocollm_core::infrastructure::event_bus::EventBus;
use protocollm_core::infrastructure::repositories::{InMemoryCreditLedger, InMemoryProfileRepository};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MEDIUM: &str = r#"{"findings": [{"type": "issue", "severity": "medium", "category": "labeling", "description": "Unlabeled container on prep line", "confidence": 0.6}]}"#;
const CRITICAL: &str = r#"```json
{"findings": [{"type": "issue", "severity": "critical", "category": "temperature", "description": "Walk-in cooler reading 50F", "confidence": 0.9, "recommendation": "Discard TCS food held above 41F"}]}
```"#;
const CLEAN: &str = r#"{"findings": [], "overall_assessment": {"compliant": true}}"#;

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

/// Answers by the first marker found in the prompt or in the image bytes;
/// `None` means failure.
struct ScriptedReasoning {
    script: Vec<(&'static str, Option<&'static str>)>,
    calls: Mutex<usize>,
    /// Cancelled when this call number starts; the call then stalls
    cancel_on_call: Option<(usize, CancellationToken)>,
}

impl ScriptedReasoning {
    fn new(script: Vec<(&'static str, Option<&'static str>)>) -> Self {
        Self {
            script,
            calls: Mutex::new(0),
            cancel_on_call: None,
        }
    }

    fn cancelling_on_call(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on_call = Some((call, token));
        self
    }

    fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    async fn invoke(&self, prompt: &str, image: Option<&ImagePayload>) -> Result<String, ReasoningError> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        if let Some((at, token)) = &self.cancel_on_call {
            if call == *at {
                token.cancel();
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }

        let image_text = image
            .and_then(|i| base64::engine::general_purpose::STANDARD.decode(&i.base64_data).ok())
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_default();
        for (marker, reply) in &self.script {
            if prompt.contains(marker) || image_text.contains(marker) {
                return match reply {
                    Some(reply) => Ok(reply.to_string()),
                    None => Err(ReasoningError::Provider("upstream unavailable".to_string())),
                };
            }
        }
        Ok(CLEAN.to_string())
    }
}

/// Serves a PNG whose trailing bytes are the URL; `missing` URLs are 404.
struct CdnFetcher;

#[async_trait]
impl EvidenceFetcher for CdnFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedEvidence, FetchError> {
        if url.contains("missing") {
            return Err(FetchError::Status(404));
        }
        let mut body = PNG_HEADER.to_vec();
        body.extend_from_slice(url.as_bytes());
        Ok(FetchedEvidence {
            bytes: Bytes::from(body),
            content_type: Some("image/png".to_string()),
        })
    }
}

struct Harness {
    service: EvaluationService,
    ledger: Arc<InMemoryCreditLedger>,
    reasoning: Arc<ScriptedReasoning>,
}

fn harness(balance: u64, reasoning: ScriptedReasoning) -> Harness {
    harness_with(balance, reasoning, DispatchSettings::default())
}

fn harness_with(balance: u64, reasoning: ScriptedReasoning, settings: DispatchSettings) -> Harness {
    let reasoning = Arc::new(reasoning);
    let composer = Arc::new(PromptComposer::new());
    let dispatcher = EvidenceDispatcher::new(
        reasoning.clone(),
        Arc::new(CdnFetcher),
        composer.clone(),
        settings,
    );
    let ledger = Arc::new(InMemoryCreditLedger::with_balances([(
        "acct-kitchen".to_string(),
        balance,
    )]));
    let service = EvaluationService::new(
        Arc::new(RuleCatalog::builtin()),
        Arc::new(InMemoryProfileRepository::with_system_profiles()),
        composer,
        dispatcher,
        ledger.clone(),
        EventBus::default(),
    );
    Harness {
        service,
        ledger,
        reasoning,
    }
}

fn documents_request(contents: &[&str]) -> InspectRequest {
    let documents: Vec<_> = contents
        .iter()
        .enumerate()
        .map(|(i, content)| json!({"name": format!("log-{}", i), "content": content}))
        .collect();
    serde_json::from_value(json!({
        "protocol_pack": "food_service_nationwide_v1",
        "input_type": "text",
        "context": {"location": "Main kitchen", "operator": "j.doe"},
        "payload": {"documents": documents},
    }))
    .unwrap()
}

fn image_request(urls: &[&str]) -> InspectRequest {
    serde_json::from_value(json!({
        "protocol_pack": "food_service_nationwide_v1",
        "input_type": "image",
        "context": {"location": "Cold storage"},
        "payload": {"images": urls},
    }))
    .unwrap()
}

#[tokio::test]
async fn test_mixed_image_batch_produces_critical_failure() {
    let h = harness(
        10,
        ScriptedReasoning::new(vec![("prep-line", Some(MEDIUM)), ("walk-in", Some(CRITICAL))]),
    );
    let request = image_request(&[
        "https://cdn.example.com/prep-line.png",
        "https://cdn.example.com/missing.png",
        "https://cdn.example.com/walk-in.png",
    ]);

    let report = h
        .service
        .evaluate("acct-kitchen", &request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, InspectionStatus::Fail);
    assert_eq!(report.risk_level, Severity::Critical);
    assert!((report.confidence - 0.75).abs() < 1e-9);

    assert!(report.evidence[0].analyzed);
    assert!(!report.evidence[1].analyzed);
    assert!(report.evidence[1].error.as_deref().unwrap().contains("404"));
    assert!(report.evidence[2].analyzed);
    assert_eq!(
        report.evidence[2].source_locator.as_deref(),
        Some("https://cdn.example.com/walk-in.png")
    );

    let actions: Vec<(Urgency, usize)> = report
        .required_actions
        .iter()
        .map(|a| (a.urgency, a.evidence_index))
        .collect();
    assert_eq!(actions, vec![(Urgency::Scheduled, 0), (Urgency::Immediate, 2)]);

    // The missing image was fetched; only two reached the reasoning service.
    assert_eq!(h.reasoning.calls(), 2);
    assert_eq!(report.metadata.credits_used, 3);
    assert_eq!(report.metadata.remaining_credits, 7);
}

#[tokio::test]
async fn test_cancellation_mid_batch_bills_only_dispatched_items() {
    let cancel = CancellationToken::new();
    let settings = DispatchSettings {
        max_concurrency: 1,
        ..Default::default()
    };
    let h = harness_with(
        8,
        ScriptedReasoning::new(vec![]).cancelling_on_call(2, cancel.clone()),
        settings,
    );
    let mut events = h.service.event_bus().subscribe();

    let err = h
        .service
        .evaluate("acct-kitchen", &documents_request(&["a", "b", "c", "d"]), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(h.reasoning.calls(), 2);
    let balance = h.ledger.balance("acct-kitchen").await.unwrap();
    assert_eq!(balance.remaining, 6);
    assert_eq!(balance.total_used, 2);

    let mut settled = None;
    while let Ok(event) = events.try_recv() {
        if let EvaluationEvent::CreditsSettled { reserved, consumed, .. } = event {
            settled = Some((reserved, consumed));
        }
    }
    assert_eq!(settled, Some((4, 2)));
}

#[tokio::test]
async fn test_mixed_batch_produces_critical_failure() {
    let h = harness(
        10,
        ScriptedReasoning::new(vec![
            ("LABEL-LOG", Some(MEDIUM)),
            ("BROKEN-LOG", None),
            ("COOLER-LOG", Some(CRITICAL)),
        ]),
    );
    let request = documents_request(&[
        "LABEL-LOG prep line audit",
        "BROKEN-LOG unreadable scan",
        "COOLER-LOG walk-in readings",
    ]);

    let report = h
        .service
        .evaluate("acct-kitchen", &request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, InspectionStatus::Fail);
    assert_eq!(report.risk_level, Severity::Critical);
    assert!((report.confidence - 0.75).abs() < 1e-9);
    assert!(report.audit_ready);

    assert_eq!(report.findings.len(), 2);
    assert_eq!(report.findings[0].evidence_index, 0);
    assert_eq!(report.findings[1].evidence_index, 2);

    assert_eq!(report.evidence.len(), 3);
    assert!(!report.evidence[1].analyzed);
    assert!(report.evidence[1].error.is_some());

    let urgencies: Vec<Urgency> = report.required_actions.iter().map(|a| a.urgency).collect();
    assert_eq!(urgencies, vec![Urgency::Scheduled, Urgency::Immediate]);
    assert!(report.required_actions[1].verification_required);

    // Failed items were attempted and are billed.
    assert_eq!(report.metadata.credits_used, 3);
    assert_eq!(report.metadata.remaining_credits, 7);
    assert_eq!(report.metadata.protocol_pack.as_deref(), Some("food_service_nationwide_v1"));
    assert_eq!(report.metadata.location.as_deref(), Some("Main kitchen"));
}

#[tokio::test]
async fn test_insufficient_credits_rejects_before_dispatch() {
    let h = harness(3, ScriptedReasoning::new(vec![]));
    let request = documents_request(&["a", "b", "c", "d", "e"]);

    let err = h
        .service
        .evaluate("acct-kitchen", &request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::InsufficientCredits {
            remaining: 3,
            required: 5
        }
    ));
    assert_eq!(h.reasoning.calls(), 0);
    let balance = h.ledger.balance("acct-kitchen").await.unwrap();
    assert_eq!(balance.remaining, 3);
    assert_eq!(balance.total_used, 0);
}

#[tokio::test]
async fn test_invalid_request_costs_nothing() {
    let h = harness(5, ScriptedReasoning::new(vec![]));
    let request: InspectRequest = serde_json::from_value(json!({
        "input_type": "image",
        "payload": {"images": []},
    }))
    .unwrap();

    let err = h
        .service
        .evaluate("acct-kitchen", &request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(h.ledger.balance("acct-kitchen").await.unwrap().remaining, 5);
}

#[tokio::test]
async fn test_cancelled_request_refunds_reservation() {
    let h = harness(4, ScriptedReasoning::new(vec![]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .service
        .evaluate("acct-kitchen", &documents_request(&["a", "b"]), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(h.reasoning.calls(), 0);
    assert_eq!(h.ledger.balance("acct-kitchen").await.unwrap().remaining, 4);
}

#[tokio::test]
async fn test_lifecycle_events_are_published_in_order() {
    let h = harness(5, ScriptedReasoning::new(vec![("COOLER-LOG", Some(CRITICAL))]));
    let mut events = h.service.event_bus().subscribe();

    h.service
        .evaluate(
            "acct-kitchen",
            &documents_request(&["COOLER-LOG walk-in"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(match event {
            EvaluationEvent::EvaluationStarted { .. } => "started",
            EvaluationEvent::EvidenceAnalyzed { .. } => "analyzed",
            EvaluationEvent::EvidenceFailed { .. } => "failed",
            EvaluationEvent::CreditsSettled { .. } => "settled",
            EvaluationEvent::EvaluationCompleted { .. } => "completed",
            EvaluationEvent::EvaluationRejected { .. } => "rejected",
        });
    }
    assert_eq!(names, vec!["started", "settled", "analyzed", "completed"]);
}

#[tokio::test]
async fn test_concurrent_requests_never_overdraw() {
    let h = Arc::new(harness(5, ScriptedReasoning::new(vec![])));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.service
                .evaluate(
                    "acct-kitchen",
                    &documents_request(&["one", "two"]),
                    &CancellationToken::new(),
                )
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(report) => {
                assert_eq!(report.metadata.credits_used, 2);
                succeeded += 1;
            }
            Err(e) => assert!(matches!(e, EngineError::InsufficientCredits { .. })),
        }
    }

    assert_eq!(succeeded, 2);
    let balance = h.ledger.balance("acct-kitchen").await.unwrap();
    assert_eq!(balance.remaining, 1);
    assert_eq!(balance.total_used, 4);
}
