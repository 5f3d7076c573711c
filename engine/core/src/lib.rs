// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! ProtocolLM compliance evaluation engine.
//!
//! Resolves which rules apply to a request, composes layered instructions for
//! a reasoning service, dispatches evidence through type-specific analyzers,
//! escalates findings into a verdict and meters usage against credits.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Library root for the engine's DDD layers

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
