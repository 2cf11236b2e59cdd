//! # API Response Models
//!
//! Structures for outgoing API response bodies.
//! All responses are wrapped in a standard envelope.

use actix_web::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{LevelRecord, TaskRecord, UserRecord, WithdrawalConfigRecord};

/// Standard API response envelope.
///
/// ## Success Response
///
/// ```json
/// {
///     "status": "success",
///     "statusCode": 200,
///     "title": "Task Completed",
///     "message": "Reward credited to your main wallet",
///     "data": { ... }
/// }
/// ```
///
/// ## Error Response
///
/// ```json
/// {
///     "status": "error",
///     "statusCode": 400,
///     "title": "Insufficient Balance",
///     "message": "Insufficient balance: available 10.00, requested 50"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// "success" or "error".
    pub status: String,

    /// HTTP status code, repeated for clients that only see the body.
    pub status_code: u16,

    /// Short human title.
    pub title: String,

    /// Human-readable message.
    pub message: String,

    /// Payload, omitted on errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a 200 response with data.
    pub fn success(title: &str, message: &str, data: T) -> Self {
        Self::with_status(StatusCode::OK, title, message, data)
    }

    /// Create a successful response with an explicit status (e.g. 201).
    pub fn with_status(status: StatusCode, title: &str, message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            status_code: status.as_u16(),
            title: title.to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }

    /// Create an error response.
    pub fn error(status: StatusCode, title: &str, message: &str) -> Self {
        Self {
            status: "error".to_string(),
            status_code: status.as_u16(),
            title: title.to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

/// Profile and balances of the calling user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub main_wallet: Decimal,
    pub commission_wallet: Decimal,
    pub main_wallet_usdt: Decimal,
    pub commission_wallet_usdt: Decimal,
    pub current_level_number: Option<i32>,
    pub current_level: Option<String>,
    pub team_level: Option<String>,
    pub total_tasks_completed: i64,
    pub today_tasks_completed: i32,
    pub today_income: Decimal,
    pub monthly_income: Decimal,
    pub total_revenue: Decimal,
    pub total_withdrawals: Decimal,
    pub direct_referrals_count: i32,
    pub total_referrals: i32,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserProfileResponse {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            name: u.name,
            phone: u.phone,
            referral_code: u.referral_code,
            referred_by: u.referred_by,
            main_wallet: u.main_wallet,
            commission_wallet: u.commission_wallet,
            main_wallet_usdt: u.main_wallet_usdt,
            commission_wallet_usdt: u.commission_wallet_usdt,
            current_level_number: u.current_level_number,
            current_level: u.current_level,
            team_level: u.team_level,
            total_tasks_completed: u.total_tasks_completed,
            today_tasks_completed: u.today_tasks_completed,
            today_income: u.today_income,
            monthly_income: u.monthly_income,
            total_revenue: u.total_revenue,
            total_withdrawals: u.total_withdrawals,
            direct_referrals_count: u.direct_referrals_count,
            total_referrals: u.total_referrals,
            created_at: u.created_at,
        }
    }
}

/// One commission paid as a side effect of signup or level purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionPayout {
    pub receiver_id: Uuid,
    pub tier: String,
    pub amount: Decimal,
    pub new_commission_balance: Decimal,
}

/// Returned by `POST /auth/signup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user: UserProfileResponse,

    /// Referral edges created (0 to 3).
    pub tiers_created: usize,

    pub commissions: Vec<CommissionPayout>,
}

/// Returned by `POST /levels/purchase`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelPurchaseResponse {
    pub user: UserProfileResponse,
    pub level: LevelRecord,
    pub commissions: Vec<CommissionPayout>,
}

/// Returned by `POST /tasks/{id}/complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRewardResponse {
    pub task_id: Uuid,
    pub reward_amount: Decimal,
    pub new_balance: Decimal,
    pub today_tasks_completed: i32,
    pub today_income: Decimal,
    pub monthly_income: Decimal,
}

/// A task with the caller's completion flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListItem {
    #[serde(flatten)]
    pub task: TaskRecord,
    pub completed: bool,
}

/// Outcome of the withdrawal window check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalWindowResponse {
    pub allowed: bool,
    pub reason: Option<String>,
    pub day_of_week: i32,
    pub config: Option<WithdrawalConfigRecord>,
}

/// Per-tier rollup for referral statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSummary {
    pub tier: String,
    pub members: i64,
    pub earnings: Decimal,
}

/// Returned by `GET /referrals/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStatsResponse {
    pub referral_code: String,
    pub team_level: Option<String>,
    pub direct_referrals_count: i32,
    pub total_referrals: i32,
    pub total_commission: Decimal,
    pub tiers: Vec<TierSummary>,
}

/// Paginated list wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub limit: i64,
    pub offset: i64,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status: "healthy" or "unhealthy".
    pub status: String,

    /// Database connection status.
    pub database: bool,

    /// Open WebSocket connections.
    pub websocket_connections: usize,

    /// Service version.
    pub version: String,

    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::with_status(
            StatusCode::CREATED,
            "Created",
            "done",
            serde_json::json!({ "id": 1 }),
        ))
        .unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["statusCode"], 201);
        assert_eq!(body["data"]["id"], 1);
    }
}
