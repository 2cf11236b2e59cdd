//! # API Request Models
//!
//! Structures for incoming API request bodies.
//! Each struct represents the expected JSON body for an endpoint.
//!
//! Money fields accept either JSON numbers or decimal strings
//! (`100`, `"100.50"`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Currency, WalletKind};

/// Request to create an account.
///
/// ## Example JSON
///
/// ```json
/// {
///     "phone": "+919800000001",
///     "name": "Asha",
///     "referralCode": "K3D9QX2A"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub phone: String,
    pub name: String,

    /// Code of the referring user. Unknown codes are ignored.
    pub referral_code: Option<String>,
}

/// Request to buy a subscription level with the main wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLevelRequest {
    pub level_number: i32,
    pub level_name: String,
}

/// Request to withdraw from a wallet to a saved bank account.
///
/// ## Example JSON
///
/// ```json
/// {
///     "amount": "500",
///     "wallet": "commission",
///     "currency": "INR",
///     "bankAccountId": "2f1c..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub amount: Decimal,
    pub wallet: WalletKind,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    pub bank_account_id: Uuid,
}

/// Request to top up the main wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RechargeRequest {
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: Currency,
}

fn default_currency() -> Currency {
    Currency::Inr
}

/// Request to save a payout destination.
///
/// `accountType` is `bank` (needs number, IFSC and bank name) or `qr`
/// (needs a UPI id or QR image URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBankAccountRequest {
    pub account_type: String,
    pub account_holder_name: String,
    pub account_number: Option<String>,
    pub ifsc_code: Option<String>,
    pub bank_name: Option<String>,
    pub upi_id: Option<String>,
    pub qr_code_url: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Admin decision body for approve/reject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessWithdrawalRequest {
    pub remark: Option<String>,
}

/// Admin upsert of a catalog level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertLevelRequest {
    pub level_number: i32,
    pub level_name: String,
    pub investment_amount: Decimal,
    pub reward_per_task: Decimal,
    pub daily_task_limit: i32,
    pub a_level_commission_rate: Decimal,
    pub b_level_commission_rate: Decimal,
    pub c_level_commission_rate: Decimal,
}

/// Admin creation of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub video_url: String,
    pub reward_price: Decimal,
    #[serde(default)]
    pub sort_order: i32,
}

/// Admin toggle of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTaskActiveRequest {
    pub is_active: bool,
}

/// Admin upsert of one weekday's withdrawal window.
///
/// ## Example JSON
///
/// ```json
/// {
///     "allowedLevels": [1, 2, 3],
///     "isActive": true,
///     "startTime": "08:30",
///     "endTime": "17:00"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertWithdrawalConfigRequest {
    pub allowed_levels: Vec<i32>,
    pub is_active: bool,
    pub start_time: String,
    pub end_time: String,
}

/// Query parameters for paginated lists.
///
/// ## Example URL
///
/// ```text
/// GET /wallet/transactions?limit=20&offset=40
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// Default: 20, Max: 100
    #[serde(default = "default_limit")]
    pub limit: i64,

    /// Default: 0
    #[serde(default)]
    pub offset: i64,
}

impl PageQuery {
    /// Limit and offset clamped to sane bounds.
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}

fn default_limit() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_withdraw_request_accepts_string_and_number_amounts() {
        let id = Uuid::new_v4();
        let from_str: WithdrawRequest = serde_json::from_value(serde_json::json!({
            "amount": "150.50",
            "wallet": "main",
            "bankAccountId": id,
        }))
        .unwrap();
        assert_eq!(from_str.amount, dec!(150.50));
        assert_eq!(from_str.currency, Currency::Inr);

        let from_num: WithdrawRequest = serde_json::from_value(serde_json::json!({
            "amount": 200,
            "wallet": "commission",
            "currency": "USDT",
            "bankAccountId": id,
        }))
        .unwrap();
        assert_eq!(from_num.amount, dec!(200));
        assert_eq!(from_num.wallet, WalletKind::Commission);
        assert_eq!(from_num.currency, Currency::Usdt);
    }

    #[test]
    fn test_page_query_clamps() {
        let q = PageQuery { limit: 1000, offset: -5 };
        assert_eq!(q.clamped(), (100, 0));
    }
}
