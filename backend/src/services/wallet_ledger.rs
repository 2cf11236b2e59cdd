//! # Wallet Ledger
//!
//! The only code path that changes a wallet balance.
//!
//! Each credit or debit is one conditional `UPDATE ... RETURNING` plus one
//! `wallet_transactions` row, both issued on the caller's client. Callers
//! pass their open transaction so the balance and its journal entry commit
//! or roll back together.
//!
//! ```text
//! debit:  UPDATE users SET w = w - amt WHERE id = $1 AND w >= amt
//!           ├── 1 row  -> journal row, BalanceChange
//!           └── 0 rows -> InsufficientBalance (balance untouched)
//! ```

use chrono::Utc;
use rust_decimal::Decimal;
use tokio_postgres::GenericClient;
use uuid::Uuid;

use crate::db::queries;
use crate::db::{Currency, Database, LedgerDirection, WalletKind, WalletTransactionRecord};
use crate::error::LedgerError;
use crate::models::UserProfileResponse;

/// One requested balance movement.
#[derive(Debug, Clone)]
pub struct LedgerEntry<'a> {
    pub user_id: Uuid,
    pub wallet: WalletKind,
    pub currency: Currency,
    pub amount: Decimal,

    /// Journal tag, e.g. "task_reward" or "withdrawal".
    pub reason: &'a str,

    pub reference_id: Option<Uuid>,
}

/// Balance before and after a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
}

/// Decimal places a currency's columns hold.
pub fn currency_scale(currency: Currency) -> u32 {
    match currency {
        Currency::Inr => 2,
        Currency::Usdt => 6,
    }
}

/// Reject non-positive amounts and amounts finer than the currency allows.
pub fn validate_amount(amount: Decimal, currency: Currency) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation("Amount must be greater than zero".to_string()));
    }
    let scale = currency_scale(currency);
    if amount.normalize().scale() > scale {
        return Err(LedgerError::Validation(format!(
            "{} amounts allow at most {} decimal places",
            currency.as_str(),
            scale
        )));
    }
    Ok(())
}

/// Add to a wallet. Fails on an invalid amount or a missing user.
pub async fn credit<C: GenericClient + Sync>(
    client: &C,
    entry: &LedgerEntry<'_>,
) -> Result<BalanceChange, LedgerError> {
    validate_amount(entry.amount, entry.currency)?;

    let new_balance = queries::credit_wallet(
        client,
        entry.user_id,
        entry.wallet,
        entry.currency,
        entry.amount,
    )
    .await?
    .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", entry.user_id)))?;

    let change = BalanceChange {
        previous_balance: new_balance - entry.amount,
        new_balance,
    };
    journal(client, entry, LedgerDirection::Credit, change).await?;
    Ok(change)
}

/// Subtract from a wallet only if the balance covers the amount.
pub async fn debit<C: GenericClient + Sync>(
    client: &C,
    entry: &LedgerEntry<'_>,
) -> Result<BalanceChange, LedgerError> {
    validate_amount(entry.amount, entry.currency)?;

    let updated = queries::debit_wallet(
        client,
        entry.user_id,
        entry.wallet,
        entry.currency,
        entry.amount,
    )
    .await?;

    let Some(new_balance) = updated else {
        let available = queries::wallet_balance(client, entry.user_id, entry.wallet, entry.currency)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", entry.user_id)))?;
        return Err(LedgerError::InsufficientBalance {
            available,
            requested: entry.amount,
        });
    };

    let change = BalanceChange {
        previous_balance: new_balance + entry.amount,
        new_balance,
    };
    journal(client, entry, LedgerDirection::Debit, change).await?;
    Ok(change)
}

async fn journal<C: GenericClient + Sync>(
    client: &C,
    entry: &LedgerEntry<'_>,
    direction: LedgerDirection,
    change: BalanceChange,
) -> Result<(), LedgerError> {
    queries::insert_wallet_transaction(
        client,
        &WalletTransactionRecord {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            wallet: entry.wallet.as_str().to_string(),
            currency: entry.currency.as_str().to_string(),
            direction: direction.as_str().to_string(),
            amount: entry.amount,
            balance_before: change.previous_balance,
            balance_after: change.new_balance,
            reason: entry.reason.to_string(),
            reference_id: entry.reference_id,
            created_at: Utc::now(),
        },
    )
    .await?;
    Ok(())
}

/// Read side of the ledger: profile balances and the journal.
#[derive(Clone)]
pub struct WalletService {
    db: Database,
}

impl WalletService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfileResponse, LedgerError> {
        let client = self.db.client().await?;
        let user = queries::get_user(&**client, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", user_id)))?;
        Ok(user.into())
    }

    /// Journal rows for a user, newest first.
    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransactionRecord>, LedgerError> {
        let client = self.db.client().await?;
        Ok(queries::list_wallet_transactions(&**client, user_id, limit, offset).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(dec!(10.50), Currency::Inr).is_ok());
        assert!(validate_amount(dec!(10.500), Currency::Inr).is_ok());
        assert!(validate_amount(dec!(0.123456), Currency::Usdt).is_ok());

        assert!(matches!(validate_amount(dec!(0), Currency::Inr), Err(LedgerError::Validation(_))));
        assert!(matches!(validate_amount(dec!(-5), Currency::Usdt), Err(LedgerError::Validation(_))));
        assert!(matches!(validate_amount(dec!(1.005), Currency::Inr), Err(LedgerError::Validation(_))));
        assert!(matches!(validate_amount(dec!(1.0000001), Currency::Usdt), Err(LedgerError::Validation(_))));
    }
}
