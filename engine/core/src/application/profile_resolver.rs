// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Profile Resolver
//!
//! Decides which standards profile governs one evaluation.
//!
//! An explicit profile id is looked up directly and never substituted: a
//! missing or inactive id is a validation error. Without an explicit id the
//! resolver walks [`FALLBACK_CHAIN`] in order and the first step that yields
//! a profile wins. The last step is the hardcoded zero-config profile, so
//! resolution always ends with a rule set.

use crate::domain::errors::{EngineError, ValidationError};
use crate::domain::profile::{
    Industry, ProfileId, StandardsProfile, TaskType, MAX_RECOMMENDED_DOCUMENTS,
    MAX_RECOMMENDED_RULES, ZERO_CONFIG_PROFILE_ID,
};
use crate::domain::repository::{ProfileRepository, RepositoryError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSelector {
    Explicit(ProfileId),
    Scoped { industry: Industry, task_type: TaskType },
    /// Caller supplied no configuration at all
    Unconfigured,
}

/// Which step of resolution produced the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    Explicit,
    ExactSystem,
    IndustryGeneral,
    ZeroConfig,
}

/// One step of the implicit resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStep {
    ExactSystem,
    IndustryGeneral,
    ZeroConfig,
}

pub const FALLBACK_CHAIN: [FallbackStep; 3] = [
    FallbackStep::ExactSystem,
    FallbackStep::IndustryGeneral,
    FallbackStep::ZeroConfig,
];

impl FallbackStep {
    fn source(self) -> ProfileSource {
        match self {
            Self::ExactSystem => ProfileSource::ExactSystem,
            Self::IndustryGeneral => ProfileSource::IndustryGeneral,
            Self::ZeroConfig => ProfileSource::ZeroConfig,
        }
    }

    async fn attempt(
        self,
        repo: &dyn ProfileRepository,
        industry: Industry,
        task_type: TaskType,
    ) -> Result<Option<StandardsProfile>, RepositoryError> {
        match self {
            Self::ExactSystem => repo.find_system(industry, task_type).await,
            // Already covered by the exact step
            Self::IndustryGeneral if task_type == TaskType::General => Ok(None),
            Self::IndustryGeneral => repo.find_system(industry, TaskType::General).await,
            Self::ZeroConfig => Ok(Some(StandardsProfile::zero_config())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub profile: StandardsProfile,
    pub source: ProfileSource,
    /// Soft-cap and degradation notices; never fatal
    pub warnings: Vec<String>,
}

pub struct ProfileResolver {
    repository: Arc<dyn ProfileRepository>,
}

impl ProfileResolver {
    pub fn new(repository: Arc<dyn ProfileRepository>) -> Self {
        Self { repository }
    }

    pub async fn resolve(&self, selector: &ProfileSelector) -> Result<ResolvedProfile, EngineError> {
        let (profile, source, mut warnings) = match selector {
            ProfileSelector::Explicit(id) => (self.resolve_explicit(id).await?, ProfileSource::Explicit, Vec::new()),
            ProfileSelector::Scoped { industry, task_type } => self.walk_chain(*industry, *task_type).await,
            ProfileSelector::Unconfigured => (
                StandardsProfile::zero_config(),
                ProfileSource::ZeroConfig,
                vec!["No profile provided - using zero-config mode".to_string()],
            ),
        };

        warnings.extend(soft_cap_warnings(&profile));
        for w in &warnings {
            warn!(profile_id = %profile.id, "{}", w);
        }
        debug!(profile_id = %profile.id, ?source, "Resolved standards profile");

        Ok(ResolvedProfile {
            profile,
            source,
            warnings,
        })
    }

    async fn resolve_explicit(&self, id: &ProfileId) -> Result<StandardsProfile, EngineError> {
        if id.as_str() == ZERO_CONFIG_PROFILE_ID {
            return Ok(StandardsProfile::zero_config());
        }

        match self.repository.find_by_id(id).await {
            Ok(Some(profile)) if profile.active => Ok(profile),
            Ok(_) => Err(ValidationError::UnknownProfile(id.to_string()).into()),
            Err(e) => Err(EngineError::Backend(format!("profile lookup failed: {}", e))),
        }
    }

    async fn walk_chain(
        &self,
        industry: Industry,
        task_type: TaskType,
    ) -> (StandardsProfile, ProfileSource, Vec<String>) {
        let mut warnings = Vec::new();

        for step in FALLBACK_CHAIN {
            match step.attempt(self.repository.as_ref(), industry, task_type).await {
                Ok(Some(profile)) => return (profile, step.source(), warnings),
                Ok(None) => continue,
                Err(e) => {
                    warnings.push(format!("Profile lookup step {:?} failed: {}", step, e));
                }
            }
        }

        // ZeroConfig never yields None
        (StandardsProfile::zero_config(), ProfileSource::ZeroConfig, warnings)
    }
}

fn soft_cap_warnings(profile: &StandardsProfile) -> Vec<String> {
    let mut warnings = Vec::new();
    let rules = profile.plain_language_rules.len();
    if rules > MAX_RECOMMENDED_RULES {
        warnings.push(format!(
            "Profile has {} rules (max recommended: {}) - may exceed token limits",
            rules, MAX_RECOMMENDED_RULES
        ));
    }
    let documents = profile.document_ids.len();
    if documents > MAX_RECOMMENDED_DOCUMENTS {
        warnings.push(format!(
            "Profile references {} documents (max recommended: {}) - may exceed token limits",
            documents, MAX_RECOMMENDED_DOCUMENTS
        ));
    }
    warnings
}
