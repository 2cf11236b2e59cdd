//! # Withdrawal Service
//!
//! Withdrawal requests, admin approval/rejection and the weekday window
//! configuration.
//!
//! ## Request Flow
//!
//! ```text
//! 1. Validate amount (>= MIN_WITHDRAWAL_AMOUNT for INR)
//!              ↓
//! 2. Withdrawal gate (weekday, level, time window)
//!              ↓
//! 3. Bank account must be the user's and active
//!              ↓
//! 4. Conditional debit + total_withdrawals += amount
//!              ↓
//! 5. Insert pending withdrawal with bank snapshot
//! ```
//!
//! ## Processing
//!
//! Approve and reject both move `pending` with a conditional update, so a
//! second decision on the same withdrawal fails with `Conflict`. Rejection
//! credits the amount back and reverses `total_withdrawals` in the same
//! transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::queries;
use crate::db::{
    Currency, Database, WalletKind, WithdrawalAction, WithdrawalConfigRecord, WithdrawalRecord,
    WithdrawalStatus,
};
use crate::error::LedgerError;
use crate::models::{UpsertWithdrawalConfigRequest, WithdrawRequest, WithdrawalWindowResponse};
use crate::utils::{day_of_week, parse_hhmm, to_local};

use super::wallet_ledger::{self, LedgerEntry};
use super::withdrawal_gate::{self, GateDecision};

/// A withdrawal after a request or a decision, with the wallet balance it
/// left behind when money moved.
#[derive(Debug, Clone)]
pub struct WithdrawalOutcome {
    pub withdrawal: WithdrawalRecord,

    /// `None` for an approval, which moves no money.
    pub wallet_balance: Option<Decimal>,
}

#[derive(Clone)]
pub struct WithdrawalService {
    db: Database,
    config: AppConfig,
}

impl WithdrawalService {
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self { db, config }
    }

    /// Gate decision for `user_id` at `now`.
    pub async fn window_status(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalWindowResponse, LedgerError> {
        let client = self.db.client().await?;

        let user = queries::get_user(&**client, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", user_id)))?;

        let local_now = to_local(now, self.config.business_offset);
        let day = day_of_week(&local_now);
        let config = queries::get_withdrawal_config(&**client, day).await?;
        let decision = withdrawal_gate::evaluate(config.as_ref(), user.current_level_number, &local_now);

        Ok(WithdrawalWindowResponse {
            allowed: decision.is_allowed(),
            reason: decision.reason().map(str::to_string),
            day_of_week: day,
            config,
        })
    }

    /// Create a pending withdrawal and take the funds out of the wallet.
    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        request: WithdrawRequest,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        wallet_ledger::validate_amount(request.amount, request.currency)?;
        if request.currency == Currency::Inr && request.amount < self.config.min_withdrawal_amount {
            return Err(LedgerError::Validation(format!(
                "Minimum withdrawal amount is {}",
                self.config.min_withdrawal_amount
            )));
        }

        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        let user = queries::lock_user(&*tx, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", user_id)))?;

        let local_now = to_local(now, self.config.business_offset);
        let config = queries::get_withdrawal_config(&*tx, day_of_week(&local_now)).await?;
        if let GateDecision::Denied(reason) =
            withdrawal_gate::evaluate(config.as_ref(), user.current_level_number, &local_now)
        {
            info!("Withdrawal denied for {}: {}", user_id, reason);
            return Err(LedgerError::WithdrawalNotAllowed(reason.to_string()));
        }

        let account = queries::get_active_bank_account(&*tx, request.bank_account_id, user_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Bank account not found: {}", request.bank_account_id))
            })?;

        let withdrawal_id = Uuid::new_v4();
        let change = wallet_ledger::debit(
            &*tx,
            &LedgerEntry {
                user_id,
                wallet: request.wallet,
                currency: request.currency,
                amount: request.amount,
                reason: "withdrawal",
                reference_id: Some(withdrawal_id),
            },
        )
        .await?;

        queries::adjust_total_withdrawals(&*tx, user_id, request.amount).await?;

        let withdrawal = WithdrawalRecord {
            id: withdrawal_id,
            user_id,
            amount: request.amount,
            wallet: request.wallet.as_str().to_string(),
            currency: request.currency.as_str().to_string(),
            account_type: account.account_type,
            account_holder_name: account.account_holder_name,
            account_number: account.account_number,
            ifsc_code: account.ifsc_code,
            bank_name: account.bank_name,
            upi_id: account.upi_id,
            qr_code_url: account.qr_code_url,
            status: WithdrawalStatus::Pending.as_str().to_string(),
            admin_remark: None,
            created_at: now,
            processed_at: None,
        };
        queries::insert_withdrawal(&*tx, &withdrawal).await?;

        tx.commit().await?;

        info!(
            "💸 Withdrawal {} requested by {}: {} {} from {} wallet",
            withdrawal.id, user_id, withdrawal.amount, withdrawal.currency, withdrawal.wallet
        );
        Ok(WithdrawalOutcome {
            withdrawal,
            wallet_balance: Some(change.new_balance),
        })
    }

    pub async fn approve(
        &self,
        id: Uuid,
        remark: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        self.process(id, WithdrawalAction::Approve, remark, now).await
    }

    pub async fn reject(
        &self,
        id: Uuid,
        remark: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        self.process(id, WithdrawalAction::Reject, remark, now).await
    }

    async fn process(
        &self,
        id: Uuid,
        action: WithdrawalAction,
        remark: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        let withdrawal = queries::get_withdrawal(&*tx, id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Withdrawal not found: {}", id)))?;

        let current: WithdrawalStatus = withdrawal.status.parse().map_err(LedgerError::Internal)?;
        let next = current
            .apply(action)
            .map_err(|terminal| LedgerError::Conflict(format!("Withdrawal already {}", terminal.as_str())))?;

        let updated = queries::transition_withdrawal(&*tx, id, current, next, remark.as_deref(), now)
            .await?
            .ok_or_else(|| LedgerError::Conflict("Withdrawal already processed".to_string()))?;

        let mut wallet_balance = None;
        if next == WithdrawalStatus::Rejected {
            let wallet: WalletKind = updated.wallet.parse().map_err(LedgerError::Internal)?;
            let currency: Currency = updated.currency.parse().map_err(LedgerError::Internal)?;

            let change = wallet_ledger::credit(
                &*tx,
                &LedgerEntry {
                    user_id: updated.user_id,
                    wallet,
                    currency,
                    amount: updated.amount,
                    reason: "withdrawal_reversal",
                    reference_id: Some(updated.id),
                },
            )
            .await?;
            queries::adjust_total_withdrawals(&*tx, updated.user_id, -updated.amount).await?;
            wallet_balance = Some(change.new_balance);
        }

        tx.commit().await?;

        match next {
            WithdrawalStatus::Rejected => warn!(
                "Withdrawal {} rejected, {} {} returned to {}",
                id, updated.amount, updated.currency, updated.user_id
            ),
            _ => info!("✅ Withdrawal {} {}", id, next.as_str()),
        }
        Ok(WithdrawalOutcome {
            withdrawal: updated,
            wallet_balance,
        })
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRecord>, LedgerError> {
        let client = self.db.client().await?;
        Ok(queries::list_user_withdrawals(&**client, user_id, limit, offset).await?)
    }

    /// Oldest pending withdrawals first.
    pub async fn list_pending(&self, limit: i64, offset: i64) -> Result<Vec<WithdrawalRecord>, LedgerError> {
        let client = self.db.client().await?;
        Ok(queries::list_withdrawals_by_status(&**client, WithdrawalStatus::Pending, limit, offset).await?)
    }

    /// Create or replace the window for one weekday (0 = Sunday).
    pub async fn upsert_config(
        &self,
        day_of_week: i32,
        request: UpsertWithdrawalConfigRequest,
    ) -> Result<WithdrawalConfigRecord, LedgerError> {
        let config = build_config(day_of_week, request, Utc::now())?;
        let client = self.db.client().await?;
        Ok(queries::upsert_withdrawal_config(&**client, &config).await?)
    }

    pub async fn list_configs(&self) -> Result<Vec<WithdrawalConfigRecord>, LedgerError> {
        let client = self.db.client().await?;
        Ok(queries::list_withdrawal_configs(&**client).await?)
    }
}

fn build_config(
    day_of_week: i32,
    request: UpsertWithdrawalConfigRequest,
    now: DateTime<Utc>,
) -> Result<WithdrawalConfigRecord, LedgerError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(LedgerError::Validation(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }

    let start = parse_hhmm(&request.start_time)
        .ok_or_else(|| LedgerError::Validation(format!("Invalid start time: {}", request.start_time)))?;
    let end = parse_hhmm(&request.end_time)
        .ok_or_else(|| LedgerError::Validation(format!("Invalid end time: {}", request.end_time)))?;
    if start > end {
        return Err(LedgerError::Validation("Start time must not be after end time".to_string()));
    }

    let mut allowed_levels = request.allowed_levels;
    if allowed_levels.iter().any(|level| *level < 0) {
        return Err(LedgerError::Validation("Level numbers must not be negative".to_string()));
    }
    allowed_levels.sort_unstable();
    allowed_levels.dedup();

    Ok(WithdrawalConfigRecord {
        day_of_week,
        allowed_levels,
        is_active: request.is_active,
        start_time: request.start_time.trim().to_string(),
        end_time: request.end_time.trim().to_string(),
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start: &str, end: &str, levels: Vec<i32>) -> UpsertWithdrawalConfigRequest {
        UpsertWithdrawalConfigRequest {
            allowed_levels: levels,
            is_active: true,
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn test_build_config_normalizes_levels() {
        let config = build_config(1, request("08:30", "17:00", vec![3, 1, 3, 2]), Utc::now()).unwrap();
        assert_eq!(config.allowed_levels, vec![1, 2, 3]);
        assert_eq!(config.start_time, "08:30");
    }

    #[test]
    fn test_build_config_rejects_bad_input() {
        assert!(build_config(7, request("08:30", "17:00", vec![1]), Utc::now()).is_err());
        assert!(build_config(0, request("8:30", "17:00", vec![1]), Utc::now()).is_err());
        assert!(build_config(0, request("18:00", "17:00", vec![1]), Utc::now()).is_err());
        assert!(build_config(0, request("08:30", "17:00", vec![-1]), Utc::now()).is_err());
    }

    #[test]
    fn test_single_minute_window_is_valid() {
        assert!(build_config(3, request("12:00", "12:00", vec![]), Utc::now()).is_ok());
    }
}
