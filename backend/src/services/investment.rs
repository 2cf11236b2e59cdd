//! # Investment Service
//!
//! Buying a subscription level with the main wallet.
//!
//! The price is debited atomically, the level is recorded on the user and
//! up to three ancestors receive `investment_commission`, all in one
//! transaction. Commissions use the same rule as at signup.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db::queries;
use crate::db::{CommissionType, Currency, Database, WalletKind};
use crate::error::LedgerError;
use crate::models::{LevelPurchaseResponse, PurchaseLevelRequest};
use crate::utils::format_inr;

use super::commission;
use super::referral_graph::{plan_edges, walk_upline};
use super::wallet_ledger::{self, LedgerEntry};

#[derive(Clone)]
pub struct InvestmentService {
    db: Database,
}

impl InvestmentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Purchase a level for `user_id`.
    ///
    /// ## Errors
    ///
    /// - `NotFound` - unknown user or level
    /// - `InsufficientBalance` - main wallet below the level price
    pub async fn purchase_level(
        &self,
        user_id: Uuid,
        request: PurchaseLevelRequest,
    ) -> Result<LevelPurchaseResponse, LedgerError> {
        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        let user = queries::lock_user(&*tx, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", user_id)))?;

        let level = queries::get_level(&*tx, request.level_number, &request.level_name)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "Level not found: {} {}",
                    request.level_number, request.level_name
                ))
            })?;

        if level.investment_amount > rust_decimal::Decimal::ZERO {
            wallet_ledger::debit(
                &*tx,
                &LedgerEntry {
                    user_id,
                    wallet: WalletKind::Main,
                    currency: Currency::Inr,
                    amount: level.investment_amount,
                    reason: "level_purchase",
                    reference_id: Some(level.id),
                },
            )
            .await?;
        }

        let updated = queries::set_user_level(&*tx, user_id, level.level_number, &level.level_name).await?;

        let commissions = match user.referred_by {
            Some(referrer_id) => {
                let upline = walk_upline(&*tx, user_id, referrer_id).await?;
                let edges = plan_edges(user_id, &upline);
                commission::distribute(
                    &*tx,
                    user_id,
                    &user.name,
                    &edges,
                    CommissionType::InvestmentCommission,
                    Utc::now(),
                )
                .await?
            }
            None => Vec::new(),
        };

        tx.commit().await?;

        info!(
            "✅ User {} purchased level {} {} for {} ({} commissions)",
            user_id,
            level.level_number,
            level.level_name,
            format_inr(level.investment_amount),
            commissions.len()
        );

        Ok(LevelPurchaseResponse {
            user: updated.into(),
            level,
            commissions,
        })
    }
}
