// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Credit Ledger
//!
//! `CreditLedger` backed by two tables:
//!
//! - `credit_balances (account_id, remaining, total_used, updated_at)`
//! - `credit_reservations (id, account_id, units, created_at)`
//!
//! Authorization is a single conditional `UPDATE ... WHERE remaining >= $n`,
//! so two concurrent requests can never spend the same units. Settlement
//! deletes the reservation row and only then adjusts the balance, all in one
//! transaction; a second settle finds no row.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::debug;

use crate::domain::credits::{CreditBalance, CreditLedger, CreditReservation, LedgerError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS credit_balances (
    account_id TEXT PRIMARY KEY,
    remaining BIGINT NOT NULL DEFAULT 0 CHECK (remaining >= 0),
    total_used BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE TABLE IF NOT EXISTS credit_reservations (
    id UUID PRIMARY KEY,
    account_id TEXT NOT NULL REFERENCES credit_balances(account_id),
    units BIGINT NOT NULL CHECK (units > 0),
    created_at TIMESTAMPTZ NOT NULL
);
"#;

pub struct PostgresCreditLedger {
    pool: PgPool,
}

impl PostgresCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the ledger tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn finish(
        &self,
        reservation: &CreditReservation,
        consumed: u64,
    ) -> Result<CreditBalance, LedgerError> {
        if consumed > reservation.units {
            return Err(LedgerError::OverSettlement {
                consumed,
                reserved: reservation.units,
            });
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row = sqlx::query(
            "DELETE FROM credit_reservations WHERE id = $1 RETURNING account_id, units",
        )
        .bind(reservation.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or(LedgerError::UnknownReservation(reservation.id))?;

        let account_id: String = row.get("account_id");
        let units = to_u64(row.get("units"));
        if consumed > units {
            return Err(LedgerError::OverSettlement {
                consumed,
                reserved: units,
            });
        }

        let refund = to_i64(units - consumed)?;
        let row = sqlx::query(
            r#"
            UPDATE credit_balances
            SET remaining = remaining + $2, total_used = total_used + $3, updated_at = NOW()
            WHERE account_id = $1
            RETURNING remaining, total_used
            "#,
        )
        .bind(&account_id)
        .bind(refund)
        .bind(to_i64(consumed)?)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        debug!(reservation_id = %reservation.id, consumed, "Settled credit reservation");

        Ok(CreditBalance {
            account_id,
            remaining: to_u64(row.get("remaining")),
            total_used: to_u64(row.get("total_used")),
        })
    }
}

fn db_error(err: sqlx::Error) -> LedgerError {
    LedgerError::Database(err.to_string())
}

fn to_i64(units: u64) -> Result<i64, LedgerError> {
    i64::try_from(units).map_err(|_| LedgerError::InvalidAmount)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl CreditLedger for PostgresCreditLedger {
    async fn authorize(&self, account_id: &str, units: u64) -> Result<CreditReservation, LedgerError> {
        if units == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let amount = to_i64(units)?;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE credit_balances
            SET remaining = remaining - $2, updated_at = NOW()
            WHERE account_id = $1 AND remaining >= $2
            RETURNING remaining
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(row) = updated else {
            // Nothing changed; report the balance the caller could not cover.
            let remaining = sqlx::query("SELECT remaining FROM credit_balances WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?
                .map(|r| to_u64(r.get("remaining")))
                .unwrap_or(0);
            return Err(LedgerError::InsufficientCredits {
                remaining,
                required: units,
            });
        };

        let reservation = CreditReservation::new(account_id, units, to_u64(row.get("remaining")));
        sqlx::query(
            "INSERT INTO credit_reservations (id, account_id, units, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(reservation.id)
        .bind(account_id)
        .bind(amount)
        .bind(reservation.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        debug!(account_id, units, reservation_id = %reservation.id, "Reserved credits");
        Ok(reservation)
    }

    async fn settle(&self, reservation: &CreditReservation, consumed: u64) -> Result<CreditBalance, LedgerError> {
        self.finish(reservation, consumed).await
    }

    async fn release(&self, reservation: &CreditReservation) -> Result<CreditBalance, LedgerError> {
        self.finish(reservation, 0).await
    }

    async fn top_up(&self, account_id: &str, units: u64) -> Result<CreditBalance, LedgerError> {
        if units == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let row = sqlx::query(
            r#"
            INSERT INTO credit_balances (account_id, remaining, total_used, updated_at)
            VALUES ($1, $2, 0, NOW())
            ON CONFLICT (account_id) DO UPDATE SET
                remaining = credit_balances.remaining + EXCLUDED.remaining,
                updated_at = NOW()
            RETURNING remaining, total_used
            "#,
        )
        .bind(account_id)
        .bind(to_i64(units)?)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(CreditBalance {
            account_id: account_id.to_string(),
            remaining: to_u64(row.get("remaining")),
            total_used: to_u64(row.get("total_used")),
        })
    }

    async fn balance(&self, account_id: &str) -> Result<CreditBalance, LedgerError> {
        let row = sqlx::query("SELECT remaining, total_used FROM credit_balances WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(match row {
            Some(row) => CreditBalance {
                account_id: account_id.to_string(),
                remaining: to_u64(row.get("remaining")),
                total_used: to_u64(row.get("total_used")),
            },
            None => CreditBalance::empty(account_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_conversion() {
        assert_eq!(to_i64(42), Ok(42));
        assert_eq!(to_i64(u64::MAX), Err(LedgerError::InvalidAmount));
        assert_eq!(to_u64(-1), 0);
    }

    #[tokio::test]
    async fn test_zero_amounts_rejected_before_touching_database() {
        let pool = PgPool::connect_lazy("postgres://localhost/protocollm").unwrap();
        let ledger = PostgresCreditLedger::new(pool);
        assert_eq!(ledger.authorize("acct", 0).await, Err(LedgerError::InvalidAmount));
        assert_eq!(ledger.top_up("acct", 0).await, Err(LedgerError::InvalidAmount));
    }
}
