//! # Bank Account Service
//!
//! Payout destinations for withdrawals.
//!
//! - At most [`MAX_ACTIVE_ACCOUNTS`] active accounts (bank or QR) per user
//! - At most one default; the first account added becomes the default
//! - Removal is a soft delete; removing the default promotes the oldest
//!   remaining account

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db::queries;
use crate::db::{BankAccountRecord, Database};
use crate::error::LedgerError;
use crate::models::AddBankAccountRequest;

pub const MAX_ACTIVE_ACCOUNTS: i64 = 4;

#[derive(Clone)]
pub struct BankAccountService {
    db: Database,
}

impl BankAccountService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn add(
        &self,
        user_id: Uuid,
        request: AddBankAccountRequest,
    ) -> Result<BankAccountRecord, LedgerError> {
        let mut account = build_account(user_id, request)?;

        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        // Serializes concurrent adds for the same user.
        queries::lock_user(&*tx, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", user_id)))?;

        let active = queries::count_active_bank_accounts(&*tx, user_id).await?;
        if active >= MAX_ACTIVE_ACCOUNTS {
            return Err(LedgerError::Validation(format!(
                "A maximum of {} bank accounts is allowed",
                MAX_ACTIVE_ACCOUNTS
            )));
        }

        if active == 0 {
            account.is_default = true;
        }
        if account.is_default {
            queries::clear_default_bank_account(&*tx, user_id).await?;
        }

        queries::insert_bank_account(&*tx, &account).await?;
        tx.commit().await?;

        info!("Bank account {} added for {} (default: {})", account.id, user_id, account.is_default);
        Ok(account)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<BankAccountRecord>, LedgerError> {
        let client = self.db.client().await?;
        Ok(queries::list_bank_accounts(&**client, user_id).await?)
    }

    pub async fn remove(&self, user_id: Uuid, account_id: Uuid) -> Result<(), LedgerError> {
        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        let removed = queries::deactivate_bank_account(&*tx, account_id, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Bank account not found: {}", account_id)))?;

        if removed.is_default {
            queries::promote_oldest_bank_account(&*tx, user_id).await?;
        }

        tx.commit().await?;
        info!("Bank account {} removed for {}", account_id, user_id);
        Ok(())
    }

    pub async fn set_default(&self, user_id: Uuid, account_id: Uuid) -> Result<(), LedgerError> {
        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        queries::get_active_bank_account(&*tx, account_id, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Bank account not found: {}", account_id)))?;

        queries::clear_default_bank_account(&*tx, user_id).await?;
        if !queries::set_default_bank_account(&*tx, account_id, user_id).await? {
            return Err(LedgerError::NotFound(format!("Bank account not found: {}", account_id)));
        }

        tx.commit().await?;
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn build_account(user_id: Uuid, request: AddBankAccountRequest) -> Result<BankAccountRecord, LedgerError> {
    let holder = request.account_holder_name.trim().to_string();
    if holder.is_empty() {
        return Err(LedgerError::Validation("Account holder name is required".to_string()));
    }

    let account_number = non_empty(request.account_number);
    let ifsc_code = non_empty(request.ifsc_code).map(|c| c.to_uppercase());
    let bank_name = non_empty(request.bank_name);
    let upi_id = non_empty(request.upi_id);
    let qr_code_url = non_empty(request.qr_code_url);

    match request.account_type.as_str() {
        "bank" => {
            if account_number.is_none() || ifsc_code.is_none() || bank_name.is_none() {
                return Err(LedgerError::Validation(
                    "Bank accounts need an account number, IFSC code and bank name".to_string(),
                ));
            }
        }
        "qr" => {
            if upi_id.is_none() && qr_code_url.is_none() {
                return Err(LedgerError::Validation(
                    "QR accounts need a UPI id or a QR code image".to_string(),
                ));
            }
        }
        other => {
            return Err(LedgerError::Validation(format!(
                "Account type must be 'bank' or 'qr', got '{}'",
                other
            )))
        }
    }

    Ok(BankAccountRecord {
        id: Uuid::new_v4(),
        user_id,
        account_type: request.account_type,
        account_holder_name: holder,
        account_number,
        ifsc_code,
        bank_name,
        upi_id,
        qr_code_url,
        is_default: request.is_default,
        is_active: true,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_request() -> AddBankAccountRequest {
        AddBankAccountRequest {
            account_type: "bank".to_string(),
            account_holder_name: "Asha Rao".to_string(),
            account_number: Some("001122334455".to_string()),
            ifsc_code: Some("sbin0001234".to_string()),
            bank_name: Some("SBI".to_string()),
            upi_id: None,
            qr_code_url: None,
            is_default: false,
        }
    }

    #[test]
    fn test_bank_account_requires_details() {
        let account = build_account(Uuid::new_v4(), bank_request()).unwrap();
        assert_eq!(account.ifsc_code.as_deref(), Some("SBIN0001234"));

        let mut missing = bank_request();
        missing.bank_name = Some("  ".to_string());
        assert!(matches!(build_account(Uuid::new_v4(), missing), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_qr_account_needs_upi_or_image() {
        let mut qr = bank_request();
        qr.account_type = "qr".to_string();
        qr.account_number = None;
        assert!(build_account(Uuid::new_v4(), qr.clone()).is_err());

        qr.upi_id = Some("asha@upi".to_string());
        assert!(build_account(Uuid::new_v4(), qr).is_ok());
    }

    #[test]
    fn test_unknown_account_type() {
        let mut request = bank_request();
        request.account_type = "card".to_string();
        assert!(build_account(Uuid::new_v4(), request).is_err());
    }
}
