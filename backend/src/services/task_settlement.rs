//! # Task Service
//!
//! Task reward settlement plus the small task/level catalog admin.
//!
//! ## Completion Flow
//!
//! ```text
//! 1. Lock the user row (serializes this user's completions)
//!              ↓
//! 2. Already claimed?            -> Conflict
//!              ↓
//! 3. Task missing or inactive?   -> NotFound
//!              ↓
//! 4. Roll day/month counters in business-local time
//!              ↓
//! 5. Daily limit reached?        -> Conflict
//!              ↓
//! 6. Insert completion (unique (user, task) is the final guard)
//!              ↓
//! 7. Credit reward to main wallet + journal, write counters
//! ```
//!
//! Everything happens in one transaction, so a lost race on step 6 leaves
//! no trace.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::queries;
use crate::db::{Currency, Database, LevelRecord, TaskCompletionRecord, TaskCounters, TaskRecord, UserRecord, WalletKind};
use crate::error::LedgerError;
use crate::models::{CreateTaskRequest, TaskListItem, TaskRewardResponse, UpsertLevelRequest};
use crate::utils::{format_inr, to_local};

use super::wallet_ledger::{self, LedgerEntry};

/// Counters as they stand at `now`, before this completion is added.
///
/// The day resets when the last reset happened on an earlier local date,
/// the month when it happened in an earlier local month.
pub fn rollover(user: &UserRecord, now: DateTime<Utc>, offset: FixedOffset) -> TaskCounters {
    let local_now = to_local(now, offset);

    let day_anchor = user.last_income_reset_date.or(user.last_task_completed_at);
    let same_day = day_anchor
        .map(|t| to_local(t, offset).date_naive() == local_now.date_naive())
        .unwrap_or(false);

    let month_anchor = user.last_monthly_reset_date.or(user.last_task_completed_at);
    let same_month = month_anchor
        .map(|t| {
            let local = to_local(t, offset);
            (local.year(), local.month()) == (local_now.year(), local_now.month())
        })
        .unwrap_or(false);

    let (today_tasks_completed, today_income, last_income_reset_date) = match (same_day, day_anchor) {
        (true, Some(anchor)) => (user.today_tasks_completed, user.today_income, anchor),
        _ => (0, Decimal::ZERO, now),
    };

    let (monthly_income, last_monthly_reset_date) = match (same_month, month_anchor) {
        (true, Some(anchor)) => (user.monthly_income, anchor),
        _ => (Decimal::ZERO, now),
    };

    TaskCounters {
        today_tasks_completed,
        today_income,
        monthly_income,
        last_income_reset_date,
        last_monthly_reset_date,
    }
}

fn add_reward(counters: TaskCounters, reward: Decimal) -> TaskCounters {
    TaskCounters {
        today_tasks_completed: counters.today_tasks_completed + 1,
        today_income: counters.today_income + reward,
        monthly_income: counters.monthly_income + reward,
        ..counters
    }
}

/// Task completion and catalog administration.
#[derive(Clone)]
pub struct TaskService {
    db: Database,
    config: AppConfig,
}

impl TaskService {
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self { db, config }
    }

    /// Claim the reward of `task_id` for `user_id`, at most once.
    pub async fn complete_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TaskRewardResponse, LedgerError> {
        debug!("User {} completing task {}", user_id, task_id);

        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        let user = queries::lock_user(&*tx, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", user_id)))?;

        if queries::task_completion_exists(&*tx, user_id, task_id).await? {
            return Err(LedgerError::Conflict("Task already completed".to_string()));
        }

        let task = queries::get_task(&*tx, task_id)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| LedgerError::NotFound(format!("Task not found or inactive: {}", task_id)))?;

        let level = match (user.current_level_number, user.current_level.as_deref()) {
            (Some(number), Some(name)) => queries::get_level(&*tx, number, name).await?,
            _ => None,
        }
        .ok_or_else(|| {
            LedgerError::Validation("Purchase a level before completing tasks".to_string())
        })?;

        let counters = rollover(&user, now, self.config.business_offset);
        if counters.today_tasks_completed >= level.daily_task_limit {
            return Err(LedgerError::Conflict("Daily task limit reached".to_string()));
        }

        let reward = task.reward_price;
        let claimed = queries::insert_task_completion(
            &*tx,
            &TaskCompletionRecord {
                id: Uuid::new_v4(),
                user_id,
                task_id,
                reward_amount: reward,
                completed_at: now,
            },
        )
        .await?;
        if !claimed {
            return Err(LedgerError::Conflict("Task already completed".to_string()));
        }

        let new_balance = if reward > Decimal::ZERO {
            wallet_ledger::credit(
                &*tx,
                &LedgerEntry {
                    user_id,
                    wallet: WalletKind::Main,
                    currency: Currency::Inr,
                    amount: reward,
                    reason: "task_reward",
                    reference_id: Some(task_id),
                },
            )
            .await?
            .new_balance
        } else {
            user.main_wallet
        };

        let counters = add_reward(counters, reward);
        queries::apply_task_counters(&*tx, user_id, &counters, reward, now).await?;

        tx.commit().await?;

        info!(
            "✅ Task {} completed by {}: {} (today {}/{})",
            task_id,
            user_id,
            format_inr(reward),
            counters.today_tasks_completed,
            level.daily_task_limit
        );

        Ok(TaskRewardResponse {
            task_id,
            reward_amount: reward,
            new_balance,
            today_tasks_completed: counters.today_tasks_completed,
            today_income: counters.today_income,
            monthly_income: counters.monthly_income,
        })
    }

    /// Active tasks with the caller's completion flag.
    pub async fn list_tasks(&self, user_id: Uuid) -> Result<Vec<TaskListItem>, LedgerError> {
        let client = self.db.client().await?;
        let tasks = queries::list_tasks_for_user(&**client, user_id).await?;
        Ok(tasks
            .into_iter()
            .map(|(task, completed)| TaskListItem { task, completed })
            .collect())
    }

    pub async fn create_task(&self, request: CreateTaskRequest) -> Result<TaskRecord, LedgerError> {
        if request.title.trim().is_empty() {
            return Err(LedgerError::Validation("Task title is required".to_string()));
        }
        if request.video_url.trim().is_empty() {
            return Err(LedgerError::Validation("Video URL is required".to_string()));
        }
        if request.reward_price < Decimal::ZERO || request.reward_price.normalize().scale() > 2 {
            return Err(LedgerError::Validation(
                "Reward must be a non-negative amount with at most 2 decimals".to_string(),
            ));
        }

        let task = TaskRecord {
            id: Uuid::new_v4(),
            title: request.title.trim().to_string(),
            video_url: request.video_url.trim().to_string(),
            reward_price: request.reward_price,
            is_active: true,
            sort_order: request.sort_order,
            created_at: Utc::now(),
        };

        let client = self.db.client().await?;
        queries::insert_task(&**client, &task).await?;
        Ok(task)
    }

    pub async fn set_task_active(&self, task_id: Uuid, is_active: bool) -> Result<TaskRecord, LedgerError> {
        let client = self.db.client().await?;
        let task = queries::set_task_active(&**client, task_id, is_active)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Task not found: {}", task_id)))?;
        info!("Task {} active = {}", task_id, is_active);
        Ok(task)
    }

    /// Create or update a level. Rate changes only affect later commissions.
    pub async fn upsert_level(&self, request: UpsertLevelRequest) -> Result<LevelRecord, LedgerError> {
        validate_level(&request)?;

        let now = Utc::now();
        let level = LevelRecord {
            id: Uuid::new_v4(),
            level_number: request.level_number,
            level_name: request.level_name.trim().to_string(),
            investment_amount: request.investment_amount,
            reward_per_task: request.reward_per_task,
            daily_task_limit: request.daily_task_limit,
            a_level_commission_rate: request.a_level_commission_rate,
            b_level_commission_rate: request.b_level_commission_rate,
            c_level_commission_rate: request.c_level_commission_rate,
            created_at: now,
            updated_at: now,
        };

        let client = self.db.client().await?;
        Ok(queries::upsert_level(&**client, &level).await?)
    }
}

fn validate_level(request: &UpsertLevelRequest) -> Result<(), LedgerError> {
    if request.level_name.trim().is_empty() {
        return Err(LedgerError::Validation("Level name is required".to_string()));
    }
    if request.level_number < 0 || request.daily_task_limit < 0 {
        return Err(LedgerError::Validation(
            "Level number and daily task limit must not be negative".to_string(),
        ));
    }
    if request.investment_amount < Decimal::ZERO || request.reward_per_task < Decimal::ZERO {
        return Err(LedgerError::Validation("Amounts must not be negative".to_string()));
    }

    let hundred = Decimal::ONE_HUNDRED;
    for (label, rate) in [
        ("A", request.a_level_commission_rate),
        ("B", request.b_level_commission_rate),
        ("C", request.c_level_commission_rate),
    ] {
        if rate < Decimal::ZERO || rate > hundred {
            return Err(LedgerError::Validation(format!(
                "Tier {} commission rate must be between 0 and 100",
                label
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn user_with(last: Option<DateTime<Utc>>, today: i32, today_income: Decimal, monthly: Decimal) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            phone: "+910000000000".to_string(),
            name: "Test".to_string(),
            referral_code: "ABCDEFGH".to_string(),
            referred_by: None,
            main_wallet: Decimal::ZERO,
            commission_wallet: Decimal::ZERO,
            main_wallet_usdt: Decimal::ZERO,
            commission_wallet_usdt: Decimal::ZERO,
            current_level_number: Some(1),
            current_level: Some("Silver".to_string()),
            team_level: None,
            total_tasks_completed: 0,
            today_tasks_completed: today,
            today_income,
            monthly_income: monthly,
            total_revenue: Decimal::ZERO,
            total_profit: Decimal::ZERO,
            total_withdrawals: Decimal::ZERO,
            last_income_reset_date: last,
            last_monthly_reset_date: last,
            last_task_completed_at: last,
            direct_referrals_count: 0,
            total_referrals: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_same_local_day_keeps_counters() {
        let last = Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).unwrap(); // 09:30 IST
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(); // 17:30 IST
        let user = user_with(Some(last), 3, dec!(30), dec!(300));

        let rolled = rollover(&user, now, ist());
        assert_eq!(rolled.today_tasks_completed, 3);
        assert_eq!(rolled.today_income, dec!(30));
        assert_eq!(rolled.monthly_income, dec!(300));
        assert_eq!(rolled.last_income_reset_date, last);
    }

    #[test]
    fn test_local_midnight_resets_day_not_month() {
        // 18:00 UTC on the 10th is 23:30 IST; 19:00 UTC is 00:30 IST on the 11th
        let last = Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 19, 0, 0).unwrap();
        let user = user_with(Some(last), 5, dec!(50), dec!(400));

        let rolled = rollover(&user, now, ist());
        assert_eq!(rolled.today_tasks_completed, 0);
        assert_eq!(rolled.today_income, Decimal::ZERO);
        assert_eq!(rolled.last_income_reset_date, now);
        assert_eq!(rolled.monthly_income, dec!(400));
    }

    #[test]
    fn test_new_month_resets_both() {
        let last = Utc.with_ymd_and_hms(2024, 6, 30, 10, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
        let user = user_with(Some(last), 2, dec!(20), dec!(900));

        let rolled = rollover(&user, now, ist());
        assert_eq!(rolled.today_tasks_completed, 0);
        assert_eq!(rolled.monthly_income, Decimal::ZERO);
        assert_eq!(rolled.last_monthly_reset_date, now);
    }

    #[test]
    fn test_first_task_ever() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let rolled = add_reward(rollover(&user_with(None, 0, dec!(0), dec!(0)), now, ist()), dec!(12.50));
        assert_eq!(rolled.today_tasks_completed, 1);
        assert_eq!(rolled.today_income, dec!(12.50));
        assert_eq!(rolled.monthly_income, dec!(12.50));
    }

    #[test]
    fn test_level_validation() {
        let mut request = UpsertLevelRequest {
            level_number: 1,
            level_name: "Silver".to_string(),
            investment_amount: dec!(1000),
            reward_per_task: dec!(10),
            daily_task_limit: 5,
            a_level_commission_rate: dec!(10),
            b_level_commission_rate: dec!(5),
            c_level_commission_rate: dec!(2),
        };
        assert!(validate_level(&request).is_ok());

        request.c_level_commission_rate = dec!(100.01);
        assert!(matches!(validate_level(&request), Err(LedgerError::Validation(_))));
    }
}
