// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod event_bus;
pub mod evidence_fetcher;
pub mod llm;
pub mod prompt_template_engine;
pub mod repositories;
pub mod retrieval;
pub mod storage;

pub use event_bus::EventBus;
pub use evidence_fetcher::HttpEvidenceFetcher;
