// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod evaluation;
pub mod evidence_dispatcher;
pub mod profile_resolver;
pub mod profile_service;
pub mod prompt_composer;
pub mod repository_factory;

// Re-export use cases for convenience
pub use evaluation::{EvaluationService, InspectionReport, ReportMetadata};
pub use evidence_dispatcher::{DispatchSettings, EvidenceDispatcher};
pub use profile_service::{ProfileListing, ProfileService};
pub use prompt_composer::PromptComposer;
