// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Engine assembly: turns an `EngineConfig` into wired application services.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use protocollm_core::application::evaluation::EvaluationService;
use protocollm_core::application::evidence_dispatcher::{DispatchSettings, EvidenceDispatcher};
use protocollm_core::application::profile_service::ProfileService;
use protocollm_core::application::prompt_composer::PromptComposer;
use protocollm_core::application::repository_factory::{
    create_credit_ledger, create_profile_repository, storage_backend,
};
use protocollm_core::domain::catalog::RuleCatalog;
use protocollm_core::domain::engine_config::EngineConfig;
use protocollm_core::infrastructure::event_bus::EventBus;
use protocollm_core::infrastructure::evidence_fetcher::HttpEvidenceFetcher;
use protocollm_core::infrastructure::llm::ProviderRegistry;
use protocollm_core::infrastructure::retrieval::HttpReferenceRetriever;
use protocollm_core::infrastructure::storage::create_evidence_store;
use protocollm_core::presentation::api::AppState;

pub struct Engine {
    pub evaluation: Arc<EvaluationService>,
    pub profiles: Arc<ProfileService>,
    pub registry: Arc<ProviderRegistry>,
}

impl Engine {
    pub fn app_state(&self) -> AppState {
        AppState::new(self.evaluation.clone(), self.profiles.clone())
    }
}

pub async fn build(config: &EngineConfig) -> Result<Engine> {
    let registry = Arc::new(
        ProviderRegistry::from_config(config).context("Failed to initialize reasoning providers")?,
    );

    let dispatch = &config.dispatch;
    let fetcher = HttpEvidenceFetcher::new(dispatch.fetch_timeout, dispatch.max_image_bytes)
        .context("Failed to build evidence fetcher")?;

    let composer = Arc::new(PromptComposer::new());
    let mut dispatcher = EvidenceDispatcher::new(
        registry.clone(),
        Arc::new(fetcher),
        composer.clone(),
        DispatchSettings::from(dispatch),
    );
    if let Some(store) = create_evidence_store(config.evidence_store.as_ref())
        .context("Failed to open evidence store")?
    {
        info!("Evidence store enabled");
        dispatcher = dispatcher.with_evidence_store(store);
    }

    let backend = storage_backend(&config.ledger);
    let profile_repository = create_profile_repository(&backend);
    let ledger = create_credit_ledger(&config.ledger)
        .await
        .context("Failed to initialize credit ledger")?;

    let mut evaluation = EvaluationService::new(
        Arc::new(RuleCatalog::builtin()),
        profile_repository.clone(),
        composer,
        dispatcher,
        ledger,
        EventBus::with_default_capacity(),
    )
    .with_max_items(dispatch.max_items);

    if let Some(endpoint) = &config.retrieval.endpoint {
        let retriever = HttpReferenceRetriever::new(
            endpoint.clone(),
            config.retrieval.api_key.clone(),
            config.retrieval.timeout,
        )
        .context("Failed to build reference retriever")?;
        info!(%endpoint, "Reference retrieval enabled");
        evaluation = evaluation.with_retriever(Arc::new(retriever), config.retrieval.top_k);
    }

    Ok(Engine {
        evaluation: Arc::new(evaluation),
        profiles: Arc::new(ProfileService::new(profile_repository)),
        registry,
    })
}
