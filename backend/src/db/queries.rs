//! # Database Queries
//!
//! This module contains all the SQL queries for interacting with the database.
//! Each function performs a specific database operation.
//!
//! ## Query Organization
//!
//! Queries are grouped by the table they operate on:
//! - users and wallet balances
//! - `wallet_transactions` - the journal
//! - `levels`, `team_referrals`, `team_referral_history`
//! - `tasks`, `task_completions`
//! - `withdrawal_configs`, `withdrawals`, `bank_accounts`
//! - `recharges`
//!
//! Every function takes any [`GenericClient`], so callers decide whether it
//! runs on a pooled connection or inside their transaction.
//!
//! ## Error Handling
//!
//! All queries return `Result<T, DatabaseError>`. Common errors:
//! - `UniqueViolation` - A unique constraint rejected the write
//! - `QueryError` - SQL execution failed
//!
//! Lookups return `Option` instead of `NotFound`; the service layer decides
//! which absence is an error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::{GenericClient, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::*;
use super::DatabaseError;

// ============================================
// HELPER FUNCTIONS
// ============================================

const USER_COLUMNS: &str = r#"
    id, phone, name, referral_code, referred_by,
    main_wallet, commission_wallet, main_wallet_usdt, commission_wallet_usdt,
    current_level_number, current_level, team_level,
    total_tasks_completed, today_tasks_completed, today_income, monthly_income,
    total_revenue, total_profit, total_withdrawals,
    last_income_reset_date, last_monthly_reset_date, last_task_completed_at,
    direct_referrals_count, total_referrals, created_at, updated_at
"#;

const WITHDRAWAL_COLUMNS: &str = r#"
    id, user_id, amount, wallet, currency,
    account_type, account_holder_name, account_number, ifsc_code,
    bank_name, upi_id, qr_code_url,
    status, admin_remark, created_at, processed_at
"#;

const BANK_ACCOUNT_COLUMNS: &str = r#"
    id, user_id, account_type, account_holder_name, account_number,
    ifsc_code, bank_name, upi_id, qr_code_url, is_default, is_active, created_at
"#;

/// Helper to convert a database row to UserRecord
fn row_to_user(row: &Row) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        phone: row.get("phone"),
        name: row.get("name"),
        referral_code: row.get("referral_code"),
        referred_by: row.get("referred_by"),
        main_wallet: row.get("main_wallet"),
        commission_wallet: row.get("commission_wallet"),
        main_wallet_usdt: row.get("main_wallet_usdt"),
        commission_wallet_usdt: row.get("commission_wallet_usdt"),
        current_level_number: row.get("current_level_number"),
        current_level: row.get("current_level"),
        team_level: row.get("team_level"),
        total_tasks_completed: row.get("total_tasks_completed"),
        today_tasks_completed: row.get("today_tasks_completed"),
        today_income: row.get("today_income"),
        monthly_income: row.get("monthly_income"),
        total_revenue: row.get("total_revenue"),
        total_profit: row.get("total_profit"),
        total_withdrawals: row.get("total_withdrawals"),
        last_income_reset_date: row.get("last_income_reset_date"),
        last_monthly_reset_date: row.get("last_monthly_reset_date"),
        last_task_completed_at: row.get("last_task_completed_at"),
        direct_referrals_count: row.get("direct_referrals_count"),
        total_referrals: row.get("total_referrals"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_level(row: &Row) -> LevelRecord {
    LevelRecord {
        id: row.get("id"),
        level_number: row.get("level_number"),
        level_name: row.get("level_name"),
        investment_amount: row.get("investment_amount"),
        reward_per_task: row.get("reward_per_task"),
        daily_task_limit: row.get("daily_task_limit"),
        a_level_commission_rate: row.get("a_level_commission_rate"),
        b_level_commission_rate: row.get("b_level_commission_rate"),
        c_level_commission_rate: row.get("c_level_commission_rate"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_referral_history(row: &Row) -> TeamReferralHistoryRecord {
    TeamReferralHistoryRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        referred_user_id: row.get("referred_user_id"),
        tier: row.get("tier"),
        amount: row.get("amount"),
        transaction_type: row.get("transaction_type"),
        status: row.get("status"),
        description: row.get("description"),
        referral_chain: row.get("referral_chain"),
        created_at: row.get("created_at"),
    }
}

fn row_to_task(row: &Row) -> TaskRecord {
    TaskRecord {
        id: row.get("id"),
        title: row.get("title"),
        video_url: row.get("video_url"),
        reward_price: row.get("reward_price"),
        is_active: row.get("is_active"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
    }
}

fn row_to_wallet_transaction(row: &Row) -> WalletTransactionRecord {
    WalletTransactionRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        wallet: row.get("wallet"),
        currency: row.get("currency"),
        direction: row.get("direction"),
        amount: row.get("amount"),
        balance_before: row.get("balance_before"),
        balance_after: row.get("balance_after"),
        reason: row.get("reason"),
        reference_id: row.get("reference_id"),
        created_at: row.get("created_at"),
    }
}

fn row_to_withdrawal(row: &Row) -> WithdrawalRecord {
    WithdrawalRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        wallet: row.get("wallet"),
        currency: row.get("currency"),
        account_type: row.get("account_type"),
        account_holder_name: row.get("account_holder_name"),
        account_number: row.get("account_number"),
        ifsc_code: row.get("ifsc_code"),
        bank_name: row.get("bank_name"),
        upi_id: row.get("upi_id"),
        qr_code_url: row.get("qr_code_url"),
        status: row.get("status"),
        admin_remark: row.get("admin_remark"),
        created_at: row.get("created_at"),
        processed_at: row.get("processed_at"),
    }
}

fn row_to_withdrawal_config(row: &Row) -> WithdrawalConfigRecord {
    WithdrawalConfigRecord {
        day_of_week: row.get("day_of_week"),
        allowed_levels: row.get("allowed_levels"),
        is_active: row.get("is_active"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_bank_account(row: &Row) -> BankAccountRecord {
    BankAccountRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        account_type: row.get("account_type"),
        account_holder_name: row.get("account_holder_name"),
        account_number: row.get("account_number"),
        ifsc_code: row.get("ifsc_code"),
        bank_name: row.get("bank_name"),
        upi_id: row.get("upi_id"),
        qr_code_url: row.get("qr_code_url"),
        is_default: row.get("is_default"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn row_to_recharge(row: &Row) -> RechargeRecord {
    RechargeRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    }
}

// ============================================
// USER QUERIES
// ============================================

/// Insert a new user with zero balances and counters.
///
/// Fails with `UniqueViolation` on a duplicate phone or referral code.
pub async fn insert_user<C: GenericClient + Sync>(
    client: &C,
    user: &NewUser,
) -> Result<UserRecord, DatabaseError> {
    debug!("Inserting user: {}", user.id);

    let sql = format!(
        r#"
        INSERT INTO users (id, phone, name, referral_code, referred_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        USER_COLUMNS
    );

    let row = client
        .query_one(
            sql.as_str(),
            &[&user.id, &user.phone, &user.name, &user.referral_code, &user.referred_by],
        )
        .await?;

    info!("User created: {} ({})", user.id, user.referral_code);
    Ok(row_to_user(&row))
}

/// Get a user by ID.
pub async fn get_user<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
) -> Result<Option<UserRecord>, DatabaseError> {
    let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    let row = client.query_opt(sql.as_str(), &[&id]).await?;
    Ok(row.as_ref().map(row_to_user))
}

/// Get a user by ID and hold its row lock until the transaction ends.
///
/// Serializes concurrent counter updates on the same user.
pub async fn lock_user<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
) -> Result<Option<UserRecord>, DatabaseError> {
    let sql = format!("SELECT {} FROM users WHERE id = $1 FOR UPDATE", USER_COLUMNS);
    let row = client.query_opt(sql.as_str(), &[&id]).await?;
    Ok(row.as_ref().map(row_to_user))
}

/// Get a user by referral code.
pub async fn get_user_by_referral_code<C: GenericClient + Sync>(
    client: &C,
    code: &str,
) -> Result<Option<UserRecord>, DatabaseError> {
    let sql = format!("SELECT {} FROM users WHERE referral_code = $1", USER_COLUMNS);
    let row = client.query_opt(sql.as_str(), &[&code]).await?;
    Ok(row.as_ref().map(row_to_user))
}

/// Parent pointer of a user. `None` when the user does not exist.
pub async fn get_referrer<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
) -> Result<Option<Option<Uuid>>, DatabaseError> {
    let row = client
        .query_opt("SELECT referred_by FROM users WHERE id = $1", &[&id])
        .await?;
    Ok(row.map(|r| r.get("referred_by")))
}

pub async fn referral_code_exists<C: GenericClient + Sync>(
    client: &C,
    code: &str,
) -> Result<bool, DatabaseError> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM users WHERE referral_code = $1) AS taken",
            &[&code],
        )
        .await?;
    Ok(row.get("taken"))
}

pub async fn phone_exists<C: GenericClient + Sync>(
    client: &C,
    phone: &str,
) -> Result<bool, DatabaseError> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM users WHERE phone = $1) AS taken",
            &[&phone],
        )
        .await?;
    Ok(row.get("taken"))
}

/// Count a new direct referral on the referrer.
///
/// Only tier-A edges reach here; deeper ancestors keep their counters.
/// Returns the updated direct count.
pub async fn increment_referral_counters<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
) -> Result<i32, DatabaseError> {
    let row = client
        .query_opt(
            r#"
            UPDATE users
            SET
                total_referrals = total_referrals + 1,
                direct_referrals_count = direct_referrals_count + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING direct_referrals_count
            "#,
            &[&user_id],
        )
        .await?;

    row.map(|r| r.get("direct_referrals_count"))
        .ok_or_else(|| DatabaseError::NotFound(format!("User not found: {}", user_id)))
}

pub async fn set_team_level<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    team_level: Option<&str>,
) -> Result<(), DatabaseError> {
    client
        .execute(
            "UPDATE users SET team_level = $2, updated_at = NOW() WHERE id = $1",
            &[&user_id, &team_level],
        )
        .await?;
    Ok(())
}

/// Record the level a user subscribed to.
pub async fn set_user_level<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    level_number: i32,
    level_name: &str,
) -> Result<UserRecord, DatabaseError> {
    let sql = format!(
        r#"
        UPDATE users
        SET current_level_number = $2, current_level = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        USER_COLUMNS
    );
    let row = client
        .query_opt(sql.as_str(), &[&user_id, &level_number, &level_name])
        .await?;

    row.as_ref()
        .map(row_to_user)
        .ok_or_else(|| DatabaseError::NotFound(format!("User not found: {}", user_id)))
}

/// Write rolled-over task counters and add one reward to the lifetime totals.
pub async fn apply_task_counters<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    counters: &TaskCounters,
    reward: Decimal,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            UPDATE users
            SET
                today_tasks_completed = $2,
                today_income = $3,
                monthly_income = $4,
                last_income_reset_date = $5,
                last_monthly_reset_date = $6,
                total_tasks_completed = total_tasks_completed + 1,
                total_revenue = total_revenue + $7,
                total_profit = total_profit + $7,
                last_task_completed_at = $8,
                updated_at = NOW()
            WHERE id = $1
            "#,
            &[
                &user_id,
                &counters.today_tasks_completed,
                &counters.today_income,
                &counters.monthly_income,
                &counters.last_income_reset_date,
                &counters.last_monthly_reset_date,
                &reward,
                &now,
            ],
        )
        .await?;
    Ok(())
}

/// Add `delta` (negative to reverse) to `total_withdrawals`.
pub async fn adjust_total_withdrawals<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    delta: Decimal,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            UPDATE users
            SET total_withdrawals = GREATEST(total_withdrawals + $2, 0), updated_at = NOW()
            WHERE id = $1
            "#,
            &[&user_id, &delta],
        )
        .await?;
    Ok(())
}

// ============================================
// WALLET QUERIES
// ============================================

/// Add `amount` to one wallet. Returns the new balance, `None` if the user
/// does not exist.
pub async fn credit_wallet<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    wallet: WalletKind,
    currency: Currency,
    amount: Decimal,
) -> Result<Option<Decimal>, DatabaseError> {
    let column = wallet_column(wallet, currency);
    let sql = format!(
        "UPDATE users SET {col} = {col} + $2, updated_at = NOW() WHERE id = $1 RETURNING {col} AS balance",
        col = column
    );
    let row = client.query_opt(sql.as_str(), &[&user_id, &amount]).await?;
    Ok(row.map(|r| r.get("balance")))
}

/// Subtract `amount` only if the balance covers it.
///
/// The check and the write are one statement, so two concurrent debits
/// can never both pass against the same funds. `None` means the user is
/// missing or the balance is too low.
pub async fn debit_wallet<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    wallet: WalletKind,
    currency: Currency,
    amount: Decimal,
) -> Result<Option<Decimal>, DatabaseError> {
    let column = wallet_column(wallet, currency);
    let sql = format!(
        r#"
        UPDATE users SET {col} = {col} - $2, updated_at = NOW()
        WHERE id = $1 AND {col} >= $2
        RETURNING {col} AS balance
        "#,
        col = column
    );
    let row = client.query_opt(sql.as_str(), &[&user_id, &amount]).await?;
    Ok(row.map(|r| r.get("balance")))
}

pub async fn wallet_balance<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    wallet: WalletKind,
    currency: Currency,
) -> Result<Option<Decimal>, DatabaseError> {
    let sql = format!(
        "SELECT {} AS balance FROM users WHERE id = $1",
        wallet_column(wallet, currency)
    );
    let row = client.query_opt(sql.as_str(), &[&user_id]).await?;
    Ok(row.map(|r| r.get("balance")))
}

/// Append one journal entry.
pub async fn insert_wallet_transaction<C: GenericClient + Sync>(
    client: &C,
    entry: &WalletTransactionRecord,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            INSERT INTO wallet_transactions (
                id, user_id, wallet, currency, direction, amount,
                balance_before, balance_after, reason, reference_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
            &[
                &entry.id,
                &entry.user_id,
                &entry.wallet,
                &entry.currency,
                &entry.direction,
                &entry.amount,
                &entry.balance_before,
                &entry.balance_after,
                &entry.reason,
                &entry.reference_id,
                &entry.created_at,
            ],
        )
        .await?;
    Ok(())
}

/// Journal entries for a user, newest first.
pub async fn list_wallet_transactions<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<WalletTransactionRecord>, DatabaseError> {
    debug!("Fetching wallet transactions for user: {}", user_id);

    let rows = client
        .query(
            r#"
            SELECT
                id, user_id, wallet, currency, direction, amount,
                balance_before, balance_after, reason, reference_id, created_at
            FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
            &[&user_id, &limit, &offset],
        )
        .await?;

    Ok(rows.iter().map(row_to_wallet_transaction).collect())
}

// ============================================
// LEVEL QUERIES
// ============================================

/// Get a catalog level by its (number, name) key.
pub async fn get_level<C: GenericClient + Sync>(
    client: &C,
    level_number: i32,
    level_name: &str,
) -> Result<Option<LevelRecord>, DatabaseError> {
    let row = client
        .query_opt(
            r#"
            SELECT
                id, level_number, level_name, investment_amount, reward_per_task,
                daily_task_limit, a_level_commission_rate, b_level_commission_rate,
                c_level_commission_rate, created_at, updated_at
            FROM levels
            WHERE level_number = $1 AND level_name = $2
            "#,
            &[&level_number, &level_name],
        )
        .await?;
    Ok(row.as_ref().map(row_to_level))
}

/// Create or update a catalog level. The existing ID is kept on update.
pub async fn upsert_level<C: GenericClient + Sync>(
    client: &C,
    level: &LevelRecord,
) -> Result<LevelRecord, DatabaseError> {
    debug!("Upserting level {} {}", level.level_number, level.level_name);

    let row = client
        .query_one(
            r#"
            INSERT INTO levels (
                id, level_number, level_name, investment_amount, reward_per_task,
                daily_task_limit, a_level_commission_rate, b_level_commission_rate,
                c_level_commission_rate, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ON CONFLICT (level_number, level_name) DO UPDATE SET
                investment_amount = EXCLUDED.investment_amount,
                reward_per_task = EXCLUDED.reward_per_task,
                daily_task_limit = EXCLUDED.daily_task_limit,
                a_level_commission_rate = EXCLUDED.a_level_commission_rate,
                b_level_commission_rate = EXCLUDED.b_level_commission_rate,
                c_level_commission_rate = EXCLUDED.c_level_commission_rate,
                updated_at = EXCLUDED.updated_at
            RETURNING
                id, level_number, level_name, investment_amount, reward_per_task,
                daily_task_limit, a_level_commission_rate, b_level_commission_rate,
                c_level_commission_rate, created_at, updated_at
            "#,
            &[
                &level.id,
                &level.level_number,
                &level.level_name,
                &level.investment_amount,
                &level.reward_per_task,
                &level.daily_task_limit,
                &level.a_level_commission_rate,
                &level.b_level_commission_rate,
                &level.c_level_commission_rate,
                &level.updated_at,
            ],
        )
        .await?;

    info!("Level upserted: {} {}", level.level_number, level.level_name);
    Ok(row_to_level(&row))
}

// ============================================
// REFERRAL QUERIES
// ============================================

/// Create one referral edge.
///
/// Fails with `UniqueViolation` if the new user already has an edge at
/// this tier.
pub async fn insert_team_referral<C: GenericClient + Sync>(
    client: &C,
    edge: &TeamReferralRecord,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            INSERT INTO team_referrals (
                id, user_id, referred_user_id, tier, is_active, total_earnings, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            &[
                &edge.id,
                &edge.user_id,
                &edge.referred_user_id,
                &edge.tier,
                &edge.is_active,
                &edge.total_earnings,
                &edge.created_at,
            ],
        )
        .await?;
    Ok(())
}

/// Roll a paid commission into the edge's `total_earnings`.
pub async fn add_team_referral_earnings<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    referred_user_id: Uuid,
    tier: ReferralTier,
    amount: Decimal,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            UPDATE team_referrals
            SET total_earnings = total_earnings + $4
            WHERE user_id = $1 AND referred_user_id = $2 AND tier = $3
            "#,
            &[&user_id, &referred_user_id, &tier.as_str(), &amount],
        )
        .await?;
    Ok(())
}

/// Append one commission audit row.
pub async fn insert_referral_history<C: GenericClient + Sync>(
    client: &C,
    entry: &TeamReferralHistoryRecord,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            INSERT INTO team_referral_history (
                id, user_id, referred_user_id, tier, amount, transaction_type,
                status, description, referral_chain, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            &[
                &entry.id,
                &entry.user_id,
                &entry.referred_user_id,
                &entry.tier,
                &entry.amount,
                &entry.transaction_type,
                &entry.status,
                &entry.description,
                &entry.referral_chain,
                &entry.created_at,
            ],
        )
        .await?;
    Ok(())
}

/// Commission history received by a user, newest first.
pub async fn list_referral_history<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<TeamReferralHistoryRecord>, DatabaseError> {
    let rows = client
        .query(
            r#"
            SELECT
                id, user_id, referred_user_id, tier, amount, transaction_type,
                status, description, referral_chain, created_at
            FROM team_referral_history
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
            &[&user_id, &limit, &offset],
        )
        .await?;

    Ok(rows.iter().map(row_to_referral_history).collect())
}

/// Members and earnings per tier below a user, as `(tier, members, earnings)`.
pub async fn referral_tier_summary<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
) -> Result<Vec<(String, i64, Decimal)>, DatabaseError> {
    let rows = client
        .query(
            r#"
            SELECT tier, COUNT(*) AS members, COALESCE(SUM(total_earnings), 0) AS earnings
            FROM team_referrals
            WHERE user_id = $1 AND is_active
            GROUP BY tier
            ORDER BY tier
            "#,
            &[&user_id],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|r| (r.get("tier"), r.get("members"), r.get("earnings")))
        .collect())
}

/// Sum of every commission a user has received.
pub async fn total_commission_earned<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
) -> Result<Decimal, DatabaseError> {
    let row = client
        .query_one(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM team_referral_history WHERE user_id = $1",
            &[&user_id],
        )
        .await?;
    Ok(row.get("total"))
}

// ============================================
// TASK QUERIES
// ============================================

pub async fn get_task<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
) -> Result<Option<TaskRecord>, DatabaseError> {
    let row = client
        .query_opt(
            r#"
            SELECT id, title, video_url, reward_price, is_active, sort_order, created_at
            FROM tasks WHERE id = $1
            "#,
            &[&id],
        )
        .await?;
    Ok(row.as_ref().map(row_to_task))
}

pub async fn insert_task<C: GenericClient + Sync>(
    client: &C,
    task: &TaskRecord,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            INSERT INTO tasks (id, title, video_url, reward_price, is_active, sort_order, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            &[
                &task.id,
                &task.title,
                &task.video_url,
                &task.reward_price,
                &task.is_active,
                &task.sort_order,
                &task.created_at,
            ],
        )
        .await?;

    info!("Task created: {} ({})", task.id, task.title);
    Ok(())
}

pub async fn set_task_active<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
    is_active: bool,
) -> Result<Option<TaskRecord>, DatabaseError> {
    let row = client
        .query_opt(
            r#"
            UPDATE tasks SET is_active = $2 WHERE id = $1
            RETURNING id, title, video_url, reward_price, is_active, sort_order, created_at
            "#,
            &[&id, &is_active],
        )
        .await?;
    Ok(row.as_ref().map(row_to_task))
}

/// Active tasks in display order, each with whether `user_id` has claimed it.
pub async fn list_tasks_for_user<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
) -> Result<Vec<(TaskRecord, bool)>, DatabaseError> {
    let rows = client
        .query(
            r#"
            SELECT
                t.id, t.title, t.video_url, t.reward_price, t.is_active, t.sort_order, t.created_at,
                (c.id IS NOT NULL) AS completed
            FROM tasks t
            LEFT JOIN task_completions c ON c.task_id = t.id AND c.user_id = $1
            WHERE t.is_active
            ORDER BY t.sort_order, t.created_at
            "#,
            &[&user_id],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|r| (row_to_task(r), r.get("completed")))
        .collect())
}

pub async fn task_completion_exists<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    task_id: Uuid,
) -> Result<bool, DatabaseError> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM task_completions WHERE user_id = $1 AND task_id = $2) AS done",
            &[&user_id, &task_id],
        )
        .await?;
    Ok(row.get("done"))
}

/// Claim a task for a user. Returns `false` if it was already claimed.
pub async fn insert_task_completion<C: GenericClient + Sync>(
    client: &C,
    completion: &TaskCompletionRecord,
) -> Result<bool, DatabaseError> {
    let inserted = client
        .execute(
            r#"
            INSERT INTO task_completions (id, user_id, task_id, reward_amount, completed_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT task_completions_user_task_key DO NOTHING
            "#,
            &[
                &completion.id,
                &completion.user_id,
                &completion.task_id,
                &completion.reward_amount,
                &completion.completed_at,
            ],
        )
        .await?;
    Ok(inserted == 1)
}

// ============================================
// WITHDRAWAL CONFIG QUERIES
// ============================================

pub async fn get_withdrawal_config<C: GenericClient + Sync>(
    client: &C,
    day_of_week: i32,
) -> Result<Option<WithdrawalConfigRecord>, DatabaseError> {
    let row = client
        .query_opt(
            r#"
            SELECT day_of_week, allowed_levels, is_active, start_time, end_time, updated_at
            FROM withdrawal_configs WHERE day_of_week = $1
            "#,
            &[&day_of_week],
        )
        .await?;
    Ok(row.as_ref().map(row_to_withdrawal_config))
}

pub async fn list_withdrawal_configs<C: GenericClient + Sync>(
    client: &C,
) -> Result<Vec<WithdrawalConfigRecord>, DatabaseError> {
    let rows = client
        .query(
            r#"
            SELECT day_of_week, allowed_levels, is_active, start_time, end_time, updated_at
            FROM withdrawal_configs ORDER BY day_of_week
            "#,
            &[],
        )
        .await?;
    Ok(rows.iter().map(row_to_withdrawal_config).collect())
}

pub async fn upsert_withdrawal_config<C: GenericClient + Sync>(
    client: &C,
    config: &WithdrawalConfigRecord,
) -> Result<WithdrawalConfigRecord, DatabaseError> {
    let row = client
        .query_one(
            r#"
            INSERT INTO withdrawal_configs (
                day_of_week, allowed_levels, is_active, start_time, end_time, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (day_of_week) DO UPDATE SET
                allowed_levels = EXCLUDED.allowed_levels,
                is_active = EXCLUDED.is_active,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                updated_at = EXCLUDED.updated_at
            RETURNING day_of_week, allowed_levels, is_active, start_time, end_time, updated_at
            "#,
            &[
                &config.day_of_week,
                &config.allowed_levels,
                &config.is_active,
                &config.start_time,
                &config.end_time,
                &config.updated_at,
            ],
        )
        .await?;

    info!("Withdrawal config updated for day {}", config.day_of_week);
    Ok(row_to_withdrawal_config(&row))
}

// ============================================
// WITHDRAWAL QUERIES
// ============================================

pub async fn insert_withdrawal<C: GenericClient + Sync>(
    client: &C,
    withdrawal: &WithdrawalRecord,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            INSERT INTO withdrawals (
                id, user_id, amount, wallet, currency,
                account_type, account_holder_name, account_number, ifsc_code,
                bank_name, upi_id, qr_code_url, status, admin_remark, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
            &[
                &withdrawal.id,
                &withdrawal.user_id,
                &withdrawal.amount,
                &withdrawal.wallet,
                &withdrawal.currency,
                &withdrawal.account_type,
                &withdrawal.account_holder_name,
                &withdrawal.account_number,
                &withdrawal.ifsc_code,
                &withdrawal.bank_name,
                &withdrawal.upi_id,
                &withdrawal.qr_code_url,
                &withdrawal.status,
                &withdrawal.admin_remark,
                &withdrawal.created_at,
            ],
        )
        .await?;

    info!("Withdrawal created: {} for user {}", withdrawal.id, withdrawal.user_id);
    Ok(())
}

pub async fn get_withdrawal<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
) -> Result<Option<WithdrawalRecord>, DatabaseError> {
    let sql = format!("SELECT {} FROM withdrawals WHERE id = $1", WITHDRAWAL_COLUMNS);
    let row = client.query_opt(sql.as_str(), &[&id]).await?;
    Ok(row.as_ref().map(row_to_withdrawal))
}

/// Move a withdrawal from `from` to `to` if it is still in `from`.
///
/// Returns `None` when another request already moved it, which is how a
/// second approve/reject of the same withdrawal is detected.
pub async fn transition_withdrawal<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
    from: WithdrawalStatus,
    to: WithdrawalStatus,
    admin_remark: Option<&str>,
    processed_at: DateTime<Utc>,
) -> Result<Option<WithdrawalRecord>, DatabaseError> {
    let sql = format!(
        r#"
        UPDATE withdrawals
        SET status = $3, admin_remark = COALESCE($4, admin_remark), processed_at = $5
        WHERE id = $1 AND status = $2
        RETURNING {}
        "#,
        WITHDRAWAL_COLUMNS
    );
    let row = client
        .query_opt(
            sql.as_str(),
            &[&id, &from.as_str(), &to.as_str(), &admin_remark, &processed_at],
        )
        .await?;
    Ok(row.as_ref().map(row_to_withdrawal))
}

pub async fn list_user_withdrawals<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<WithdrawalRecord>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {} FROM withdrawals
        WHERE user_id = $1
        ORDER BY created_at DESC, id
        LIMIT $2 OFFSET $3
        "#,
        WITHDRAWAL_COLUMNS
    );
    let rows = client.query(sql.as_str(), &[&user_id, &limit, &offset]).await?;
    Ok(rows.iter().map(row_to_withdrawal).collect())
}

/// Withdrawals in one status, oldest first (admin review queue).
pub async fn list_withdrawals_by_status<C: GenericClient + Sync>(
    client: &C,
    status: WithdrawalStatus,
    limit: i64,
    offset: i64,
) -> Result<Vec<WithdrawalRecord>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {} FROM withdrawals
        WHERE status = $1
        ORDER BY created_at, id
        LIMIT $2 OFFSET $3
        "#,
        WITHDRAWAL_COLUMNS
    );
    let rows = client
        .query(sql.as_str(), &[&status.as_str(), &limit, &offset])
        .await?;
    Ok(rows.iter().map(row_to_withdrawal).collect())
}

// ============================================
// BANK ACCOUNT QUERIES
// ============================================

pub async fn count_active_bank_accounts<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
) -> Result<i64, DatabaseError> {
    let row = client
        .query_one(
            "SELECT COUNT(*) AS n FROM bank_accounts WHERE user_id = $1 AND is_active",
            &[&user_id],
        )
        .await?;
    Ok(row.get("n"))
}

pub async fn insert_bank_account<C: GenericClient + Sync>(
    client: &C,
    account: &BankAccountRecord,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            INSERT INTO bank_accounts (
                id, user_id, account_type, account_holder_name, account_number,
                ifsc_code, bank_name, upi_id, qr_code_url, is_default, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
            &[
                &account.id,
                &account.user_id,
                &account.account_type,
                &account.account_holder_name,
                &account.account_number,
                &account.ifsc_code,
                &account.bank_name,
                &account.upi_id,
                &account.qr_code_url,
                &account.is_default,
                &account.is_active,
                &account.created_at,
            ],
        )
        .await?;
    Ok(())
}

/// Active accounts of a user, default first.
pub async fn list_bank_accounts<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
) -> Result<Vec<BankAccountRecord>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {} FROM bank_accounts
        WHERE user_id = $1 AND is_active
        ORDER BY is_default DESC, created_at
        "#,
        BANK_ACCOUNT_COLUMNS
    );
    let rows = client.query(sql.as_str(), &[&user_id]).await?;
    Ok(rows.iter().map(row_to_bank_account).collect())
}

/// An active account, only if it belongs to `user_id`.
pub async fn get_active_bank_account<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<BankAccountRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM bank_accounts WHERE id = $1 AND user_id = $2 AND is_active",
        BANK_ACCOUNT_COLUMNS
    );
    let row = client.query_opt(sql.as_str(), &[&id, &user_id]).await?;
    Ok(row.as_ref().map(row_to_bank_account))
}

/// Soft-delete an account.
///
/// The returned record carries the `is_default` flag it had before the
/// update, so the caller knows whether a new default is needed.
pub async fn deactivate_bank_account<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<BankAccountRecord>, DatabaseError> {
    let row = client
        .query_opt(
            r#"
            SELECT is_default FROM bank_accounts
            WHERE id = $1 AND user_id = $2 AND is_active
            FOR UPDATE
            "#,
            &[&id, &user_id],
        )
        .await?;
    let was_default: bool = match row {
        Some(row) => row.get("is_default"),
        None => return Ok(None),
    };

    let sql = format!(
        r#"
        UPDATE bank_accounts SET is_active = FALSE, is_default = FALSE
        WHERE id = $1 AND user_id = $2 AND is_active
        RETURNING {}
        "#,
        BANK_ACCOUNT_COLUMNS
    );
    let row = client.query_opt(sql.as_str(), &[&id, &user_id]).await?;
    Ok(row.as_ref().map(|r| BankAccountRecord {
        is_default: was_default,
        ..row_to_bank_account(r)
    }))
}

pub async fn clear_default_bank_account<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
) -> Result<(), DatabaseError> {
    client
        .execute(
            "UPDATE bank_accounts SET is_default = FALSE WHERE user_id = $1 AND is_default",
            &[&user_id],
        )
        .await?;
    Ok(())
}

/// Mark one active account as default. Returns `false` if it is not the
/// user's active account.
pub async fn set_default_bank_account<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
    user_id: Uuid,
) -> Result<bool, DatabaseError> {
    let updated = client
        .execute(
            "UPDATE bank_accounts SET is_default = TRUE WHERE id = $1 AND user_id = $2 AND is_active",
            &[&id, &user_id],
        )
        .await?;
    Ok(updated == 1)
}

/// Make the oldest remaining active account the default.
pub async fn promote_oldest_bank_account<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            UPDATE bank_accounts SET is_default = TRUE
            WHERE id = (
                SELECT id FROM bank_accounts
                WHERE user_id = $1 AND is_active
                ORDER BY created_at, id
                LIMIT 1
            )
            "#,
            &[&user_id],
        )
        .await?;
    Ok(())
}

// ============================================
// RECHARGE QUERIES
// ============================================

pub async fn insert_recharge<C: GenericClient + Sync>(
    client: &C,
    recharge: &RechargeRecord,
) -> Result<(), DatabaseError> {
    client
        .execute(
            r#"
            INSERT INTO recharges (id, user_id, amount, currency, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            &[
                &recharge.id,
                &recharge.user_id,
                &recharge.amount,
                &recharge.currency,
                &recharge.status,
                &recharge.created_at,
            ],
        )
        .await?;
    Ok(())
}

/// IDs of `processing` recharges created at or before `cutoff`, oldest first.
pub async fn list_stale_recharges<C: GenericClient + Sync>(
    client: &C,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Uuid>, DatabaseError> {
    let rows = client
        .query(
            r#"
            SELECT id FROM recharges
            WHERE status = 'processing' AND created_at <= $1
            ORDER BY created_at
            LIMIT $2
            "#,
            &[&cutoff, &limit],
        )
        .await?;
    Ok(rows.iter().map(|r| r.get("id")).collect())
}

/// Flip a recharge to `completed` if it is still `processing`.
///
/// `None` means another sweeper (or an earlier pass) already completed it.
pub async fn complete_recharge<C: GenericClient + Sync>(
    client: &C,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<RechargeRecord>, DatabaseError> {
    let row = client
        .query_opt(
            r#"
            UPDATE recharges SET status = 'completed', completed_at = $2
            WHERE id = $1 AND status = 'processing'
            RETURNING id, user_id, amount, currency, status, created_at, completed_at
            "#,
            &[&id, &now],
        )
        .await?;
    Ok(row.as_ref().map(row_to_recharge))
}

pub async fn list_user_recharges<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<RechargeRecord>, DatabaseError> {
    let rows = client
        .query(
            r#"
            SELECT id, user_id, amount, currency, status, created_at, completed_at
            FROM recharges
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
            &[&user_id, &limit, &offset],
        )
        .await?;
    Ok(rows.iter().map(row_to_recharge).collect())
}
