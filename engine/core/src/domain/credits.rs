// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Credit Ledger
//!
//! Usage metering around an evaluation. Authorization reserves the requested
//! units atomically, so two concurrent requests can never both pass against
//! a balance that covers only one of them. Settlement then debits what was
//! actually consumed and refunds the rest of the reservation.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Ledger contract; implementations live in `infrastructure/repositories`
//!
//! Balances never go negative: every implementation decrements conditionally.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    pub account_id: String,
    pub remaining: u64,
    pub total_used: u64,
}

impl CreditBalance {
    pub fn empty(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            remaining: 0,
            total_used: 0,
        }
    }
}

/// Units held for one in-flight evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditReservation {
    pub id: Uuid,
    pub account_id: String,
    pub units: u64,
    /// Balance left after the hold was taken
    pub remaining: u64,
    pub created_at: DateTime<Utc>,
}

impl CreditReservation {
    pub fn new(account_id: &str, units: u64, remaining: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            units,
            remaining,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient credits: {remaining} remaining, {required} required")]
    InsufficientCredits { remaining: u64, required: u64 },

    #[error("Reservation {0} is unknown or already settled")]
    UnknownReservation(Uuid),

    #[error("Cannot settle {consumed} units against a reservation of {reserved}")]
    OverSettlement { consumed: u64, reserved: u64 },

    #[error("Credit amount must be positive")]
    InvalidAmount,

    #[error("Database error: {0}")]
    Database(String),
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Reserve `units` against the account, failing without side effects when
    /// the balance cannot cover them.
    async fn authorize(&self, account_id: &str, units: u64)
        -> Result<CreditReservation, LedgerError>;

    /// Debit `consumed` units (at most the reserved amount) and refund the
    /// rest. A reservation settles exactly once.
    async fn settle(
        &self,
        reservation: &CreditReservation,
        consumed: u64,
    ) -> Result<CreditBalance, LedgerError>;

    /// Return the whole reservation without debiting anything.
    async fn release(&self, reservation: &CreditReservation) -> Result<CreditBalance, LedgerError>;

    /// Add purchased credits.
    async fn top_up(&self, account_id: &str, units: u64) -> Result<CreditBalance, LedgerError>;

    /// Unknown accounts report an empty balance.
    async fn balance(&self, account_id: &str) -> Result<CreditBalance, LedgerError>;
}
