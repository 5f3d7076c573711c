// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`protocollm-core`)
//!
//! HTTP surface that translates external requests into application service
//! calls. No business logic lives here; evaluation, profile management and
//! credit queries are delegated to services in `crate::application`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP/SSE (Axum) | Inspection, pack, profile and credit endpoints plus an evaluation event stream |

pub mod api;
