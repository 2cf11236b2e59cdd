//! # Commission Calculator
//!
//! Computes and pays referral commissions.
//!
//! ## Rule
//!
//! ```text
//! commission = round(receiver_level.investment_amount * rate(edge_tier) / 100, 2)
//! ```
//!
//! The rate is picked by the tier of the edge (A for the direct referrer,
//! B one step up, C two steps up) and applied to the **receiving**
//! ancestor's own level, never to the level of the user who triggered it.
//! An ancestor without a resolvable level is skipped without error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::GenericClient;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::db::{CommissionType, Currency, LevelRecord, ReferralTier, TeamReferralHistoryRecord, WalletKind};
use crate::error::LedgerError;
use crate::models::CommissionPayout;
use crate::utils::{format_inr, round_money};

use super::referral_graph::PlannedEdge;
use super::wallet_ledger::{self, LedgerEntry};

/// Commission owed to the holder of `level` for an edge at `tier`.
///
/// ## Example
///
/// ```rust,ignore
/// // investment 1000, rates A=10 B=5 C=2
/// assert_eq!(compute_commission(ReferralTier::A, &level), dec!(100));
/// assert_eq!(compute_commission(ReferralTier::C, &level), dec!(20));
/// ```
pub fn compute_commission(tier: ReferralTier, level: &LevelRecord) -> Decimal {
    let rate = match tier {
        ReferralTier::A => level.a_level_commission_rate,
        ReferralTier::B => level.b_level_commission_rate,
        ReferralTier::C => level.c_level_commission_rate,
    };

    round_money(level.investment_amount * rate / Decimal::ONE_HUNDRED)
}

/// Pay every planned edge its commission inside the caller's transaction.
///
/// For each paid edge this writes the commission wallet credit and its
/// journal row, one `team_referral_history` row carrying the walked chain,
/// and bumps the edge's `total_earnings`. Zero amounts and ancestors
/// without a level are logged and skipped.
pub async fn distribute<C: GenericClient + Sync>(
    client: &C,
    trigger_user_id: Uuid,
    trigger_name: &str,
    edges: &[PlannedEdge],
    kind: CommissionType,
    now: DateTime<Utc>,
) -> Result<Vec<CommissionPayout>, LedgerError> {
    let mut payouts = Vec::with_capacity(edges.len());

    for edge in edges {
        let Some(ancestor) = queries::get_user(client, edge.ancestor_id).await? else {
            warn!("Commission skipped: ancestor {} not found", edge.ancestor_id);
            continue;
        };

        let level = match (ancestor.current_level_number, ancestor.current_level.as_deref()) {
            (Some(number), Some(name)) => queries::get_level(client, number, name).await?,
            _ => None,
        };

        let Some(level) = level else {
            info!(
                "Commission skipped: {} (tier {}) has no resolvable level",
                ancestor.id, edge.tier
            );
            continue;
        };

        let amount = compute_commission(edge.tier, &level);
        if amount <= Decimal::ZERO {
            info!(
                "Commission skipped: zero amount for {} at tier {} (level {})",
                ancestor.id, edge.tier, level.level_name
            );
            continue;
        }

        let change = wallet_ledger::credit(
            client,
            &LedgerEntry {
                user_id: ancestor.id,
                wallet: WalletKind::Commission,
                currency: Currency::Inr,
                amount,
                reason: kind.as_str(),
                reference_id: Some(trigger_user_id),
            },
        )
        .await?;

        let description = match kind {
            CommissionType::SignupBonus => format!(
                "Tier {} signup commission of {} for {} joining your team",
                edge.tier, format_inr(amount), trigger_name
            ),
            CommissionType::InvestmentCommission => format!(
                "Tier {} investment commission of {} from {}",
                edge.tier, format_inr(amount), trigger_name
            ),
        };

        queries::insert_referral_history(
            client,
            &TeamReferralHistoryRecord {
                id: Uuid::new_v4(),
                user_id: ancestor.id,
                referred_user_id: trigger_user_id,
                tier: edge.tier.as_str().to_string(),
                amount,
                transaction_type: kind.as_str().to_string(),
                status: "completed".to_string(),
                description,
                referral_chain: edge.chain.clone(),
                created_at: now,
            },
        )
        .await?;

        queries::add_team_referral_earnings(client, ancestor.id, trigger_user_id, edge.tier, amount)
            .await?;

        info!(
            "💰 Commission paid: {} -> {} tier {} {} ({})",
            trigger_user_id, ancestor.id, edge.tier, format_inr(amount), kind.as_str()
        );

        payouts.push(CommissionPayout {
            receiver_id: ancestor.id,
            tier: edge.tier.as_str().to_string(),
            amount,
            new_commission_balance: change.new_balance,
        });
    }

    Ok(payouts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(investment: Decimal, a: Decimal, b: Decimal, c: Decimal) -> LevelRecord {
        LevelRecord {
            id: Uuid::new_v4(),
            level_number: 1,
            level_name: "Silver".to_string(),
            investment_amount: investment,
            reward_per_task: dec!(10),
            daily_task_limit: 5,
            a_level_commission_rate: a,
            b_level_commission_rate: b,
            c_level_commission_rate: c,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_rate_follows_edge_tier() {
        let silver = level(dec!(1000), dec!(10), dec!(5), dec!(2));
        assert_eq!(compute_commission(ReferralTier::A, &silver), dec!(100));
        assert_eq!(compute_commission(ReferralTier::B, &silver), dec!(50));
        assert_eq!(compute_commission(ReferralTier::C, &silver), dec!(20));
    }

    #[test]
    fn test_commission_rounds_half_away_from_zero() {
        // 333.33 * 1.5% = 4.99995
        let odd = level(dec!(333.33), dec!(1.5), dec!(0), dec!(0));
        assert_eq!(compute_commission(ReferralTier::A, &odd), dec!(5.00));

        // 1.25 * 50% = 0.625
        let tiny = level(dec!(1.25), dec!(50), dec!(0), dec!(0));
        assert_eq!(compute_commission(ReferralTier::A, &tiny), dec!(0.63));
    }

    #[test]
    fn test_zero_rate_gives_zero() {
        let free = level(dec!(5000), dec!(0), dec!(0), dec!(0));
        assert_eq!(compute_commission(ReferralTier::B, &free), Decimal::ZERO);
    }
}
