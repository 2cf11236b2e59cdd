//! # Database Models
//!
//! This module defines the data structures that map to database tables.
//! Each struct represents a row in a table.
//!
//! ## Table Overview
//!
//! | Table | Description |
//! |-------|-------------|
//! | `users` | Identity, wallet balances, counters, referral parent pointer |
//! | `levels` | Subscription tier catalog (investment, reward, commission rates) |
//! | `team_referrals` | One edge per (ancestor, new user, tier) |
//! | `team_referral_history` | Append-only commission payments |
//! | `tasks` / `task_completions` | Task catalog and the unique (user, task) claim |
//! | `wallet_transactions` | Journal of every credit and debit |
//! | `withdrawals` / `withdrawal_configs` | Withdrawal requests and weekday windows |
//! | `bank_accounts` | Payout destinations, max 4 active per user |
//! | `recharges` | Wallet top-ups awaiting completion |
//!
//! ## Relationship Diagram
//!
//! ```text
//! ┌─────────────┐ referred_by ┌─────────────┐
//! │    users    │────────────>│    users    │
//! │             │             └─────────────┘
//! │ id (PK)     │       ┌──────────────────────┐
//! │ main_wallet │──────<│  wallet_transactions │
//! │ ...         │       └──────────────────────┘
//! └─────────────┘
//!        │       ┌──────────────────┐     ┌────────────────────────┐
//!        ├──────<│  team_referrals  │     │ team_referral_history  │
//!        │       └──────────────────┘     │ (chain snapshot)       │
//!        │                                └────────────────────────┘
//!        │       ┌──────────────────┐
//!        └──────<│   withdrawals    │  (bank details snapshotted)
//!                └──────────────────┘
//! ```
//!
//! ## Money
//!
//! All amounts are `rust_decimal::Decimal` mapped to PostgreSQL `NUMERIC`.
//! INR columns keep 2 decimal places, USDT columns keep 6.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A platform user.
///
/// Wallet balances are only ever mutated through the wallet ledger
/// (`services::wallet_ledger`), which applies conditional atomic updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Unique user ID (UUID v4).
    pub id: Uuid,

    /// Phone number used to sign up. Unique.
    pub phone: String,

    /// Display name.
    pub name: String,

    /// Code other users enter at signup. Globally unique.
    pub referral_code: String,

    /// The user whose code was used at signup (parent pointer).
    pub referred_by: Option<Uuid>,

    /// Main INR wallet.
    pub main_wallet: Decimal,

    /// Commission INR wallet.
    pub commission_wallet: Decimal,

    /// Main USDT wallet.
    pub main_wallet_usdt: Decimal,

    /// Commission USDT wallet.
    pub commission_wallet_usdt: Decimal,

    /// Number of the subscribed level, if any.
    pub current_level_number: Option<i32>,

    /// Name of the subscribed level, if any.
    pub current_level: Option<String>,

    /// Team classification derived from direct referrals ("B" or "C").
    pub team_level: Option<String>,

    pub total_tasks_completed: i64,
    pub today_tasks_completed: i32,
    pub today_income: Decimal,
    pub monthly_income: Decimal,
    pub total_revenue: Decimal,
    pub total_profit: Decimal,

    /// Sum of all pending and completed withdrawals.
    pub total_withdrawals: Decimal,

    pub last_income_reset_date: Option<DateTime<Utc>>,
    pub last_monthly_reset_date: Option<DateTime<Utc>>,
    pub last_task_completed_at: Option<DateTime<Utc>>,

    /// Tier-A referrals.
    pub direct_referrals_count: i32,

    pub total_referrals: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
}

/// Daily and monthly task counters after one reward, already rolled over
/// for the business-local day and month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCounters {
    pub today_tasks_completed: i32,
    pub today_income: Decimal,
    pub monthly_income: Decimal,
    pub last_income_reset_date: DateTime<Utc>,
    pub last_monthly_reset_date: DateTime<Utc>,
}

/// A subscription level from the catalog.
///
/// Keyed by `(level_number, level_name)`. Commission rates are
/// percentages between 0 and 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRecord {
    pub id: Uuid,
    pub level_number: i32,
    pub level_name: String,

    /// Price of the level, also the base for commissions paid to its owner.
    pub investment_amount: Decimal,

    pub reward_per_task: Decimal,
    pub daily_task_limit: i32,
    pub a_level_commission_rate: Decimal,
    pub b_level_commission_rate: Decimal,
    pub c_level_commission_rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Referral tier letter.
///
/// `A` is a direct referral, `B` the referral of a referral,
/// `C` one step further. Team classification reuses the same letters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReferralTier {
    A,
    B,
    C,
}

impl ReferralTier {
    /// Tiers in upline order: index 0 is the direct referrer.
    pub const UPLINE: [ReferralTier; 3] = [ReferralTier::A, ReferralTier::B, ReferralTier::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralTier::A => "A",
            ReferralTier::B => "B",
            ReferralTier::C => "C",
        }
    }
}

impl fmt::Display for ReferralTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One referral edge: `user_id` earns from `referred_user_id` at `tier`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamReferralRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub referred_user_id: Uuid,
    pub tier: String,
    pub is_active: bool,

    /// Rollup of every commission paid along this edge.
    pub total_earnings: Decimal,

    pub created_at: DateTime<Utc>,
}

/// Why a commission was paid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    /// A new user joined somewhere below the receiver.
    SignupBonus,
    /// A user below the receiver bought a level.
    InvestmentCommission,
}

impl CommissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionType::SignupBonus => "signup_bonus",
            CommissionType::InvestmentCommission => "investment_commission",
        }
    }
}

/// Immutable audit record of one commission payment.
///
/// `referral_chain` is the upline walked at payment time, ordered from
/// the receiving ancestor down to the triggering user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamReferralHistoryRecord {
    pub id: Uuid,

    /// Who received the commission.
    pub user_id: Uuid,

    /// Who triggered it (new signup or investing user).
    pub referred_user_id: Uuid,

    pub tier: String,
    pub amount: Decimal,
    pub transaction_type: String,
    pub status: String,
    pub description: String,
    pub referral_chain: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A task from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: Uuid,
    pub title: String,
    pub video_url: String,
    pub reward_price: Decimal,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// A claimed task reward. `(user_id, task_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub reward_amount: Decimal,
    pub completed_at: DateTime<Utc>,
}

/// Which named balance on the user row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    Main,
    Commission,
}

impl WalletKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletKind::Main => "main",
            WalletKind::Commission => "commission",
        }
    }
}

impl FromStr for WalletKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(WalletKind::Main),
            "commission" => Ok(WalletKind::Commission),
            other => Err(format!("Invalid wallet: {}", other)),
        }
    }
}

/// Currency of a wallet. USDT selects the `*_usdt` columns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Inr,
    Usdt,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usdt => "USDT",
        }
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INR" => Ok(Currency::Inr),
            "USDT" => Ok(Currency::Usdt),
            other => Err(format!("Invalid currency: {}", other)),
        }
    }
}

/// Returns the `users` column holding the given balance.
///
/// Only these four static names are ever interpolated into SQL.
pub fn wallet_column(wallet: WalletKind, currency: Currency) -> &'static str {
    match (wallet, currency) {
        (WalletKind::Main, Currency::Inr) => "main_wallet",
        (WalletKind::Commission, Currency::Inr) => "commission_wallet",
        (WalletKind::Main, Currency::Usdt) => "main_wallet_usdt",
        (WalletKind::Commission, Currency::Usdt) => "commission_wallet_usdt",
    }
}

/// Direction of a journal entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerDirection {
    Credit,
    Debit,
}

impl LedgerDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerDirection::Credit => "credit",
            LedgerDirection::Debit => "debit",
        }
    }
}

/// One row of the wallet journal.
///
/// Written in the same database transaction as the balance change it
/// describes, so the journal always replays to the current balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransactionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet: String,
    pub currency: String,
    pub direction: String,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,

    /// Short machine tag: "task_reward", "signup_bonus", "withdrawal", ...
    pub reason: String,

    /// Task, withdrawal, recharge or triggering user this entry belongs to.
    pub reference_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

/// Withdrawal lifecycle.
///
/// ```text
/// pending --approve--> completed
/// pending --reject---> rejected   (amount credited back)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
}

/// Admin decision on a pending withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalAction {
    Approve,
    Reject,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    /// Applies an admin action, returning the next status.
    ///
    /// Only `pending` accepts actions; both outcomes are terminal.
    pub fn apply(self, action: WithdrawalAction) -> Result<WithdrawalStatus, WithdrawalStatus> {
        match (self, action) {
            (WithdrawalStatus::Pending, WithdrawalAction::Approve) => Ok(WithdrawalStatus::Completed),
            (WithdrawalStatus::Pending, WithdrawalAction::Reject) => Ok(WithdrawalStatus::Rejected),
            (terminal, _) => Err(terminal),
        }
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "completed" => Ok(WithdrawalStatus::Completed),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            other => Err(format!("Invalid withdrawal status: {}", other)),
        }
    }
}

/// A withdrawal request.
///
/// Payout details are copied from the bank account at submission time so
/// later edits to the account never change a pending request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub wallet: String,
    pub currency: String,
    pub account_type: String,
    pub account_holder_name: String,
    pub account_number: Option<String>,
    pub ifsc_code: Option<String>,
    pub bank_name: Option<String>,
    pub upi_id: Option<String>,
    pub qr_code_url: Option<String>,
    pub status: String,
    pub admin_remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Withdrawal window for one weekday (0 = Sunday .. 6 = Saturday).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalConfigRecord {
    pub day_of_week: i32,

    /// Level numbers permitted to withdraw on this day.
    pub allowed_levels: Vec<i32>,

    pub is_active: bool,

    /// "HH:MM", inclusive.
    pub start_time: String,

    /// "HH:MM", inclusive.
    pub end_time: String,

    pub updated_at: DateTime<Utc>,
}

/// A payout destination. `account_type` is "bank" or "qr".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_type: String,
    pub account_holder_name: String,
    pub account_number: Option<String>,
    pub ifsc_code: Option<String>,
    pub bank_name: Option<String>,
    pub upi_id: Option<String>,
    pub qr_code_url: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A wallet top-up. Status is "processing" until the sweeper completes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RechargeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdrawal_transitions() {
        assert_eq!(
            WithdrawalStatus::Pending.apply(WithdrawalAction::Approve),
            Ok(WithdrawalStatus::Completed)
        );
        assert_eq!(
            WithdrawalStatus::Pending.apply(WithdrawalAction::Reject),
            Ok(WithdrawalStatus::Rejected)
        );
        assert_eq!(
            WithdrawalStatus::Completed.apply(WithdrawalAction::Reject),
            Err(WithdrawalStatus::Completed)
        );
        assert_eq!(
            WithdrawalStatus::Rejected.apply(WithdrawalAction::Approve),
            Err(WithdrawalStatus::Rejected)
        );
    }

    #[test]
    fn test_wallet_columns() {
        assert_eq!(wallet_column(WalletKind::Main, Currency::Inr), "main_wallet");
        assert_eq!(wallet_column(WalletKind::Commission, Currency::Usdt), "commission_wallet_usdt");
    }

    #[test]
    fn test_string_tags_parse_back() {
        assert_eq!("commission".parse::<WalletKind>(), Ok(WalletKind::Commission));
        assert_eq!("USDT".parse::<Currency>(), Ok(Currency::Usdt));
        assert!("EUR".parse::<Currency>().is_err());
    }
}
