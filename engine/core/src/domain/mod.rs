// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Compliance reference data, evaluation value objects and the contracts the
//! engine holds its collaborators to.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types, policies and traits; no I/O

pub mod actions;
pub mod catalog;
pub mod credits;
pub mod engine_config;
pub mod errors;
pub mod events;
pub mod evidence;
pub mod evidence_fetch;
pub mod evidence_store;
pub mod finding;
pub mod profile;
pub mod reasoning;
pub mod repository;
pub mod retrieval;
pub mod verdict;
