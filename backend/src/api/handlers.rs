//! # API Request Handlers
//!
//! This module contains the handler functions for each API endpoint.
//! Each handler:
//! 1. Extracts the caller and request data
//! 2. Calls the appropriate service
//! 3. Pushes WebSocket events once the ledger transaction has committed
//! 4. Returns the response envelope
//!
//! ## Error Handling
//!
//! Handlers return `Result<HttpResponse, LedgerError>`; errors render as:
//!
//! ```json
//! {
//!     "status": "error",
//!     "statusCode": 400,
//!     "title": "Insufficient Balance",
//!     "message": "Insufficient balance: available 10.00, requested 50"
//! }
//! ```

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db::{WalletKind, WithdrawalRecord};
use crate::error::LedgerError;
use crate::models::{
    AddBankAccountRequest, ApiResponse, CommissionPayout, CreateTaskRequest, HealthResponse,
    PageQuery, PageResponse, ProcessWithdrawalRequest, PurchaseLevelRequest, RechargeRequest,
    SetTaskActiveRequest, SignupRequest, UpsertLevelRequest, UpsertWithdrawalConfigRequest,
    WithdrawRequest,
};
use crate::services::WithdrawalOutcome;
use crate::websocket::{
    CommissionCreditedData, WalletUpdateData, WithdrawalProcessedData, WsEventType,
};
use crate::AppState;

use super::extractors::{AdminGuard, AuthUser};

type AppData = web::Data<Arc<AppState>>;

fn ok<T: serde::Serialize>(title: &str, message: &str, data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(title, message, data))
}

fn created<T: serde::Serialize>(title: &str, message: &str, data: T) -> HttpResponse {
    HttpResponse::Created().json(ApiResponse::with_status(StatusCode::CREATED, title, message, data))
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> PageResponse<T> {
    PageResponse { items, limit, offset }
}

async fn notify_commissions(state: &AppState, from_user_id: Uuid, payouts: &[CommissionPayout]) {
    for payout in payouts {
        let _ = state
            .ws_registry
            .send_to_user(
                payout.receiver_id,
                WsEventType::CommissionCredited,
                CommissionCreditedData {
                    from_user_id,
                    tier: payout.tier.clone(),
                    amount: payout.amount,
                    new_commission_balance: payout.new_commission_balance,
                },
            )
            .await;
    }
}

/// Health check endpoint.
///
/// ## Endpoint
///
/// `GET /health`
///
/// ## Response
///
/// ```json
/// {
///     "status": "success",
///     "statusCode": 200,
///     "title": "Healthy",
///     "message": "Service is running",
///     "data": {
///         "status": "healthy",
///         "database": true,
///         "websocketConnections": 3,
///         "version": "0.1.0",
///         "timestamp": "2025-12-08T12:00:00Z"
///     }
/// }
/// ```
pub async fn health_check(state: AppData) -> HttpResponse {
    let db_healthy = match state.db.client().await {
        Ok(client) => client.query_one("SELECT 1", &[]).await.is_ok(),
        Err(_) => false,
    };

    let response = HealthResponse {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        database: db_healthy,
        websocket_connections: state.ws_registry.total_connections().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    };

    if db_healthy {
        ok("Healthy", "Service is running", response)
    } else {
        HttpResponse::ServiceUnavailable().json(ApiResponse::with_status(
            StatusCode::SERVICE_UNAVAILABLE,
            "Unhealthy",
            "Database unreachable",
            response,
        ))
    }
}

/// Register a user, optionally under a referral code.
///
/// ## Endpoint
///
/// `POST /auth/signup`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/auth/signup \
///   -H "Content-Type: application/json" \
///   -d '{"phone": "9876543210", "name": "Asha", "referralCode": "K7M2Q9XA"}'
/// ```
pub async fn signup(
    state: AppData,
    body: web::Json<SignupRequest>,
) -> Result<HttpResponse, LedgerError> {
    let response = state.referrals.signup(body.into_inner()).await?;
    notify_commissions(&state, response.user.id, &response.commissions).await;

    Ok(created("Signup Successful", "Account created", response))
}

/// Profile and wallet balances of the caller.
///
/// `GET /me`
pub async fn get_profile(user: AuthUser, state: AppData) -> Result<HttpResponse, LedgerError> {
    let profile = state.wallets.profile(user.0).await?;
    Ok(ok("Profile", "Profile fetched", profile))
}

/// Buy a level with the main wallet.
///
/// ## Endpoint
///
/// `POST /levels/purchase`
///
/// ```json
/// { "levelNumber": 2, "levelName": "Silver" }
/// ```
///
/// Up to three ancestors receive `investment_commission`.
pub async fn purchase_level(
    user: AuthUser,
    state: AppData,
    body: web::Json<PurchaseLevelRequest>,
) -> Result<HttpResponse, LedgerError> {
    let response = state.investments.purchase_level(user.0, body.into_inner()).await?;

    let _ = state
        .ws_registry
        .send_to_user(
            user.0,
            WsEventType::WalletUpdate,
            WalletUpdateData {
                wallet: WalletKind::Main.as_str().to_string(),
                currency: "INR".to_string(),
                balance: response.user.main_wallet,
                reason: "level_purchase".to_string(),
            },
        )
        .await;
    notify_commissions(&state, user.0, &response.commissions).await;

    Ok(ok("Level Purchased", "Level activated", response))
}

/// Active tasks with the caller's completion flag.
///
/// `GET /tasks`
pub async fn list_tasks(user: AuthUser, state: AppData) -> Result<HttpResponse, LedgerError> {
    let tasks = state.tasks.list_tasks(user.0).await?;
    Ok(ok("Tasks", "Tasks fetched", tasks))
}

/// Complete a task and collect its reward.
///
/// ## Endpoint
///
/// `POST /tasks/{task_id}/complete`
///
/// A second completion of the same task returns 409.
pub async fn complete_task(
    user: AuthUser,
    state: AppData,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, LedgerError> {
    let task_id = path.into_inner();
    let reward = state.tasks.complete_task(user.0, task_id, Utc::now()).await?;

    let _ = state
        .ws_registry
        .send_to_user(user.0, WsEventType::TaskCompleted, &reward)
        .await;
    let _ = state
        .ws_registry
        .send_to_user(
            user.0,
            WsEventType::WalletUpdate,
            WalletUpdateData {
                wallet: WalletKind::Main.as_str().to_string(),
                currency: "INR".to_string(),
                balance: reward.new_balance,
                reason: "task_reward".to_string(),
            },
        )
        .await;

    Ok(ok("Task Completed", "Reward credited to your main wallet", reward))
}

/// Wallet journal of the caller.
///
/// `GET /wallet/transactions?limit=20&offset=0`
pub async fn list_wallet_transactions(
    user: AuthUser,
    state: AppData,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, LedgerError> {
    let (limit, offset) = query.clamped();
    let items = state.wallets.transactions(user.0, limit, offset).await?;
    Ok(ok("Wallet Transactions", "Transactions fetched", page(items, limit, offset)))
}

/// Start a top-up. The sweeper completes it later.
///
/// `POST /wallet/recharge`
pub async fn create_recharge(
    user: AuthUser,
    state: AppData,
    body: web::Json<RechargeRequest>,
) -> Result<HttpResponse, LedgerError> {
    let recharge = state.recharges.create(user.0, body.into_inner()).await?;
    Ok(created("Recharge Created", "Recharge is processing", recharge))
}

/// `GET /wallet/recharges`
pub async fn list_recharges(
    user: AuthUser,
    state: AppData,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, LedgerError> {
    let (limit, offset) = query.clamped();
    let items = state.recharges.list_for_user(user.0, limit, offset).await?;
    Ok(ok("Recharges", "Recharges fetched", page(items, limit, offset)))
}

/// `GET /bank-accounts`
pub async fn list_bank_accounts(user: AuthUser, state: AppData) -> Result<HttpResponse, LedgerError> {
    let accounts = state.bank_accounts.list(user.0).await?;
    Ok(ok("Bank Accounts", "Bank accounts fetched", accounts))
}

/// Add a payout destination.
///
/// ## Endpoint
///
/// `POST /bank-accounts`
///
/// ```json
/// {
///     "accountType": "bank",
///     "accountHolderName": "Asha Rao",
///     "accountNumber": "001122334455",
///     "ifscCode": "HDFC0001234",
///     "bankName": "HDFC Bank"
/// }
/// ```
pub async fn add_bank_account(
    user: AuthUser,
    state: AppData,
    body: web::Json<AddBankAccountRequest>,
) -> Result<HttpResponse, LedgerError> {
    let account = state.bank_accounts.add(user.0, body.into_inner()).await?;
    Ok(created("Bank Account Added", "Bank account saved", account))
}

/// `DELETE /bank-accounts/{id}`
pub async fn remove_bank_account(
    user: AuthUser,
    state: AppData,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, LedgerError> {
    let account_id = path.into_inner();
    state.bank_accounts.remove(user.0, account_id).await?;
    Ok(ok("Bank Account Removed", "Bank account removed", serde_json::json!({ "id": account_id })))
}

/// `POST /bank-accounts/{id}/default`
pub async fn set_default_bank_account(
    user: AuthUser,
    state: AppData,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, LedgerError> {
    let account_id = path.into_inner();
    state.bank_accounts.set_default(user.0, account_id).await?;
    Ok(ok("Default Updated", "Default bank account updated", serde_json::json!({ "id": account_id })))
}

/// Whether the caller may withdraw right now, and why not.
///
/// `GET /withdrawal/window`
pub async fn withdrawal_window(user: AuthUser, state: AppData) -> Result<HttpResponse, LedgerError> {
    let window = state.withdrawals.window_status(user.0, Utc::now()).await?;
    Ok(ok("Withdrawal Window", "Withdrawal window evaluated", window))
}

/// Request a withdrawal.
///
/// ## Endpoint
///
/// `POST /withdrawals`
///
/// ```json
/// {
///     "amount": "500.00",
///     "wallet": "commission",
///     "currency": "INR",
///     "bankAccountId": "3f0c..."
/// }
/// ```
///
/// The amount leaves the wallet immediately and stays out unless an admin
/// rejects the withdrawal.
pub async fn request_withdrawal(
    user: AuthUser,
    state: AppData,
    body: web::Json<WithdrawRequest>,
) -> Result<HttpResponse, LedgerError> {
    let outcome = state
        .withdrawals
        .request_withdrawal(user.0, body.into_inner(), Utc::now())
        .await?;
    notify_withdrawal_balance(&state, &outcome, "withdrawal").await;

    Ok(created("Withdrawal Requested", "Withdrawal is pending review", outcome.withdrawal))
}

/// `GET /withdrawals`
pub async fn list_withdrawals(
    user: AuthUser,
    state: AppData,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, LedgerError> {
    let (limit, offset) = query.clamped();
    let items = state.withdrawals.list_for_user(user.0, limit, offset).await?;
    Ok(ok("Withdrawals", "Withdrawals fetched", page(items, limit, offset)))
}

/// `GET /referrals/stats`
pub async fn referral_stats(user: AuthUser, state: AppData) -> Result<HttpResponse, LedgerError> {
    let stats = state.referrals.referral_stats(user.0).await?;
    Ok(ok("Referral Stats", "Referral statistics fetched", stats))
}

/// `GET /referrals/history`
pub async fn referral_history(
    user: AuthUser,
    state: AppData,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, LedgerError> {
    let (limit, offset) = query.clamped();
    let items = state.referrals.history(user.0, limit, offset).await?;
    Ok(ok("Referral History", "Commission history fetched", page(items, limit, offset)))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// `PUT /admin/levels`
pub async fn upsert_level(
    _admin: AdminGuard,
    state: AppData,
    body: web::Json<UpsertLevelRequest>,
) -> Result<HttpResponse, LedgerError> {
    let level = state.tasks.upsert_level(body.into_inner()).await?;
    info!("Level {} {} saved", level.level_number, level.level_name);
    Ok(ok("Level Saved", "Level saved", level))
}

/// `POST /admin/tasks`
pub async fn create_task(
    _admin: AdminGuard,
    state: AppData,
    body: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, LedgerError> {
    let task = state.tasks.create_task(body.into_inner()).await?;
    Ok(created("Task Created", "Task created", task))
}

/// `POST /admin/tasks/{id}/active`
pub async fn set_task_active(
    _admin: AdminGuard,
    state: AppData,
    path: web::Path<Uuid>,
    body: web::Json<SetTaskActiveRequest>,
) -> Result<HttpResponse, LedgerError> {
    let task = state
        .tasks
        .set_task_active(path.into_inner(), body.is_active)
        .await?;
    Ok(ok("Task Updated", "Task updated", task))
}

/// `GET /admin/withdrawal-config`
pub async fn list_withdrawal_configs(
    _admin: AdminGuard,
    state: AppData,
) -> Result<HttpResponse, LedgerError> {
    let configs = state.withdrawals.list_configs().await?;
    Ok(ok("Withdrawal Config", "Withdrawal windows fetched", configs))
}

/// Create or replace one weekday's window (0 = Sunday).
///
/// ## Endpoint
///
/// `PUT /admin/withdrawal-config/{day}`
///
/// ```json
/// { "allowedLevels": [1, 2], "isActive": true, "startTime": "08:30", "endTime": "17:00" }
/// ```
pub async fn upsert_withdrawal_config(
    _admin: AdminGuard,
    state: AppData,
    path: web::Path<i32>,
    body: web::Json<UpsertWithdrawalConfigRequest>,
) -> Result<HttpResponse, LedgerError> {
    let config = state
        .withdrawals
        .upsert_config(path.into_inner(), body.into_inner())
        .await?;
    Ok(ok("Withdrawal Config Saved", "Withdrawal window saved", config))
}

/// `GET /admin/withdrawals/pending`
pub async fn list_pending_withdrawals(
    _admin: AdminGuard,
    state: AppData,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, LedgerError> {
    let (limit, offset) = query.clamped();
    let items = state.withdrawals.list_pending(limit, offset).await?;
    Ok(ok("Pending Withdrawals", "Pending withdrawals fetched", page(items, limit, offset)))
}

/// `POST /admin/withdrawals/{id}/approve`
pub async fn approve_withdrawal(
    _admin: AdminGuard,
    state: AppData,
    path: web::Path<Uuid>,
    body: Option<web::Json<ProcessWithdrawalRequest>>,
) -> Result<HttpResponse, LedgerError> {
    let remark = body.and_then(|b| b.into_inner().remark);
    let outcome = state
        .withdrawals
        .approve(path.into_inner(), remark, Utc::now())
        .await?;
    notify_processed(&state, &outcome.withdrawal).await;

    Ok(ok("Withdrawal Approved", "Withdrawal approved", outcome.withdrawal))
}

/// Reject a pending withdrawal and return the funds to the wallet.
///
/// `POST /admin/withdrawals/{id}/reject`
pub async fn reject_withdrawal(
    _admin: AdminGuard,
    state: AppData,
    path: web::Path<Uuid>,
    body: Option<web::Json<ProcessWithdrawalRequest>>,
) -> Result<HttpResponse, LedgerError> {
    let remark = body.and_then(|b| b.into_inner().remark);
    let outcome = state
        .withdrawals
        .reject(path.into_inner(), remark, Utc::now())
        .await?;
    notify_withdrawal_balance(&state, &outcome, "withdrawal_reversal").await;
    notify_processed(&state, &outcome.withdrawal).await;

    Ok(ok("Withdrawal Rejected", "Withdrawal rejected and refunded", outcome.withdrawal))
}

/// Wallet event for a withdrawal that moved money; `None` when it didn't.
fn withdrawal_wallet_update(outcome: &WithdrawalOutcome, reason: &str) -> Option<WalletUpdateData> {
    outcome.wallet_balance.map(|balance| WalletUpdateData {
        wallet: outcome.withdrawal.wallet.clone(),
        currency: outcome.withdrawal.currency.clone(),
        balance,
        reason: reason.to_string(),
    })
}

async fn notify_withdrawal_balance(state: &AppState, outcome: &WithdrawalOutcome, reason: &str) {
    if let Some(update) = withdrawal_wallet_update(outcome, reason) {
        let _ = state
            .ws_registry
            .send_to_user(outcome.withdrawal.user_id, WsEventType::WalletUpdate, update)
            .await;
    }
}

async fn notify_processed(state: &AppState, withdrawal: &WithdrawalRecord) {
    let _ = state
        .ws_registry
        .send_to_user(
            withdrawal.user_id,
            WsEventType::WithdrawalProcessed,
            WithdrawalProcessedData {
                withdrawal_id: withdrawal.id,
                status: withdrawal.status.clone(),
                amount: withdrawal.amount,
                admin_remark: withdrawal.admin_remark.clone(),
            },
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn outcome(wallet_balance: Option<rust_decimal::Decimal>) -> WithdrawalOutcome {
        WithdrawalOutcome {
            withdrawal: WithdrawalRecord {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                amount: dec!(200),
                wallet: "commission".to_string(),
                currency: "INR".to_string(),
                account_type: "upi".to_string(),
                account_holder_name: "Test User".to_string(),
                account_number: None,
                ifsc_code: None,
                bank_name: None,
                upi_id: Some("test@upi".to_string()),
                qr_code_url: None,
                status: "rejected".to_string(),
                admin_remark: None,
                created_at: Utc::now(),
                processed_at: Some(Utc::now()),
            },
            wallet_balance,
        }
    }

    #[test]
    fn test_withdrawal_wallet_update_uses_withdrawn_wallet() {
        let update = withdrawal_wallet_update(&outcome(Some(dec!(450))), "withdrawal_reversal").unwrap();
        assert_eq!(update.wallet, "commission");
        assert_eq!(update.currency, "INR");
        assert_eq!(update.balance, dec!(450));
        assert_eq!(update.reason, "withdrawal_reversal");
    }

    #[test]
    fn test_approval_sends_no_wallet_update() {
        assert!(withdrawal_wallet_update(&outcome(None), "withdrawal").is_none());
    }
}
