// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the persistence contracts defined in
//! the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL
//!
//! - **PostgresCreditLedger** - Credit balances with conditional decrements
//!
//! ## In-Memory
//!
//! Lightweight implementations for development, the CLI and tests:
//! - **InMemoryProfileRepository** - Standards profiles, seeded with system defaults
//! - **InMemoryCreditLedger** - Credit balances behind a single lock

pub mod postgres_credit_ledger;

use crate::domain::credits::{CreditBalance, CreditLedger, CreditReservation, LedgerError};
use crate::domain::profile::{
    system_profiles, Industry, ProfileDraft, ProfileId, StandardsProfile, TaskType,
};
use crate::domain::repository::{ProfileRepository, RepositoryError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub use postgres_credit_ledger::PostgresCreditLedger;

#[derive(Clone, Default)]
pub struct InMemoryProfileRepository {
    profiles: Arc<RwLock<HashMap<ProfileId, StandardsProfile>>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-populated with the built-in system profiles.
    pub fn with_system_profiles() -> Self {
        let repo = Self::new();
        {
            let mut profiles = repo.profiles.write();
            for profile in system_profiles() {
                profiles.insert(profile.id.clone(), profile);
            }
        }
        repo
    }

    /// Operator action: retire any profile, system ones included.
    pub async fn deactivate_system(&self, id: &ProfileId) {
        if let Some(profile) = self.profiles.write().get_mut(id) {
            profile.active = false;
        }
    }

    fn owned_mut<'a>(
        profiles: &'a mut HashMap<ProfileId, StandardsProfile>,
        id: &ProfileId,
        owner_id: &str,
    ) -> Result<&'a mut StandardsProfile, RepositoryError> {
        let profile = profiles
            .get_mut(id)
            .filter(|p| p.active)
            .ok_or_else(|| RepositoryError::NotFound(format!("Profile {} not found", id)))?;
        if profile.is_system() {
            return Err(RepositoryError::Forbidden("System profiles are read-only".to_string()));
        }
        if !profile.owner.is_user(owner_id) {
            return Err(RepositoryError::Forbidden(format!("Profile {} belongs to another owner", id)));
        }
        Ok(profile)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn save(&self, profile: &StandardsProfile) -> Result<(), RepositoryError> {
        self.profiles.write().insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &ProfileId) -> Result<Option<StandardsProfile>, RepositoryError> {
        Ok(self.profiles.read().get(id).cloned())
    }

    async fn find_system(
        &self,
        industry: Industry,
        task_type: TaskType,
    ) -> Result<Option<StandardsProfile>, RepositoryError> {
        let profiles = self.profiles.read();
        let mut matches: Vec<&StandardsProfile> = profiles
            .values()
            .filter(|p| p.active && p.is_system() && !p.is_zero_config())
            .filter(|p| p.industry() == industry && p.task_type() == task_type)
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches.first().map(|p| (*p).clone()))
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<StandardsProfile>, RepositoryError> {
        let profiles = self.profiles.read();
        let mut visible: Vec<StandardsProfile> = profiles
            .values()
            .filter(|p| p.active && (p.is_system() || p.owner.is_user(owner_id)))
            .cloned()
            .collect();
        visible.sort_by_key(|p| (!p.is_system(), Reverse(p.created_at), p.id.clone()));
        Ok(visible)
    }

    async fn update(
        &self,
        id: &ProfileId,
        owner_id: &str,
        draft: ProfileDraft,
    ) -> Result<StandardsProfile, RepositoryError> {
        let errors = draft.validate();
        if !errors.is_empty() {
            return Err(RepositoryError::Invalid(errors));
        }
        let mut profiles = self.profiles.write();
        let profile = Self::owned_mut(&mut profiles, id, owner_id)?;
        draft.apply_to(profile);
        Ok(profile.clone())
    }

    async fn deactivate(&self, id: &ProfileId, owner_id: &str) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write();
        let profile = Self::owned_mut(&mut profiles, id, owner_id)?;
        profile.active = false;
        profile.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, CreditBalance>,
    reservations: HashMap<Uuid, CreditReservation>,
}

/// Single-process ledger. Every operation runs under one lock, which makes
/// the check-and-reserve in `authorize` atomic.
#[derive(Clone, Default)]
pub struct InMemoryCreditLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryCreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balances(balances: impl IntoIterator<Item = (String, u64)>) -> Self {
        let ledger = Self::new();
        {
            let mut state = ledger.state.lock();
            for (account_id, remaining) in balances {
                state.balances.insert(
                    account_id.clone(),
                    CreditBalance {
                        account_id,
                        remaining,
                        total_used: 0,
                    },
                );
            }
        }
        ledger
    }

    fn finish(&self, reservation: &CreditReservation, consumed: u64) -> Result<CreditBalance, LedgerError> {
        let mut state = self.state.lock();
        let held = state
            .reservations
            .get(&reservation.id)
            .ok_or(LedgerError::UnknownReservation(reservation.id))?;
        if consumed > held.units {
            return Err(LedgerError::OverSettlement {
                consumed,
                reserved: held.units,
            });
        }
        let held = state
            .reservations
            .remove(&reservation.id)
            .ok_or(LedgerError::UnknownReservation(reservation.id))?;

        let balance = state
            .balances
            .entry(held.account_id.clone())
            .or_insert_with(|| CreditBalance::empty(&held.account_id));
        balance.remaining += held.units - consumed;
        balance.total_used += consumed;
        Ok(balance.clone())
    }
}

#[async_trait]
impl CreditLedger for InMemoryCreditLedger {
    async fn authorize(&self, account_id: &str, units: u64) -> Result<CreditReservation, LedgerError> {
        if units == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut state = self.state.lock();
        let remaining = state.balances.get(account_id).map(|b| b.remaining).unwrap_or(0);
        if remaining < units {
            return Err(LedgerError::InsufficientCredits {
                remaining,
                required: units,
            });
        }

        let balance = state
            .balances
            .get_mut(account_id)
            .ok_or(LedgerError::InsufficientCredits {
                remaining: 0,
                required: units,
            })?;
        balance.remaining -= units;
        let reservation = CreditReservation::new(account_id, units, balance.remaining);
        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn settle(&self, reservation: &CreditReservation, consumed: u64) -> Result<CreditBalance, LedgerError> {
        self.finish(reservation, consumed)
    }

    async fn release(&self, reservation: &CreditReservation) -> Result<CreditBalance, LedgerError> {
        self.finish(reservation, 0)
    }

    async fn top_up(&self, account_id: &str, units: u64) -> Result<CreditBalance, LedgerError> {
        if units == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut state = self.state.lock();
        let balance = state
            .balances
            .entry(account_id.to_string())
            .or_insert_with(|| CreditBalance::empty(account_id));
        balance.remaining += units;
        Ok(balance.clone())
    }

    async fn balance(&self, account_id: &str) -> Result<CreditBalance, LedgerError> {
        Ok(self
            .state
            .lock()
            .balances
            .get(account_id)
            .cloned()
            .unwrap_or_else(|| CreditBalance::empty(account_id)))
    }
}
