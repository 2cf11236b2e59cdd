//! # Recharge Service
//!
//! Wallet top-ups and the background sweeper that completes them.
//!
//! ## Sweep Flow
//!
//! ```text
//! Every RECHARGE_SWEEP_INTERVAL seconds:
//! 1. Find `processing` recharges older than RECHARGE_AUTO_COMPLETE_AFTER
//!               ↓
//! 2. For each one, in its own transaction:
//!    a. UPDATE ... SET status = 'completed' WHERE status = 'processing'
//!    b. 0 rows -> someone else completed it, skip
//!    c. 1 row  -> credit main wallet + journal, commit
//!               ↓
//! 3. Notify connected clients
//! ```
//!
//! Finding nothing is the common case and only logged at debug level.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::queries;
use crate::db::{Currency, Database, RechargeRecord, WalletKind};
use crate::error::LedgerError;
use crate::models::RechargeRequest;
use crate::websocket::{WalletUpdateData, WsEventType, WsRegistry};

use super::wallet_ledger::{self, LedgerEntry};

/// Stale recharges handled per sweep.
const SWEEP_BATCH: i64 = 100;

#[derive(Clone)]
pub struct RechargeService {
    db: Database,
    config: AppConfig,
    ws_registry: WsRegistry,
}

impl RechargeService {
    pub fn new(db: Database, config: AppConfig, ws_registry: WsRegistry) -> Self {
        Self { db, config, ws_registry }
    }

    /// Record a top-up awaiting completion.
    pub async fn create(&self, user_id: Uuid, request: RechargeRequest) -> Result<RechargeRecord, LedgerError> {
        wallet_ledger::validate_amount(request.amount, request.currency)?;

        let client = self.db.client().await?;
        queries::get_user(&**client, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", user_id)))?;

        let recharge = RechargeRecord {
            id: Uuid::new_v4(),
            user_id,
            amount: request.amount,
            currency: request.currency.as_str().to_string(),
            status: "processing".to_string(),
            created_at: Utc::now(),
            completed_at: None,
        };
        queries::insert_recharge(&**client, &recharge).await?;

        info!(
            "Recharge {} created for {}: {} {}",
            recharge.id, user_id, recharge.amount, recharge.currency
        );
        Ok(recharge)
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RechargeRecord>, LedgerError> {
        let client = self.db.client().await?;
        Ok(queries::list_user_recharges(&**client, user_id, limit, offset).await?)
    }

    /// Run the sweeper forever.
    ///
    /// Spawn it as a background task:
    ///
    /// ```rust,ignore
    /// let sweeper = recharges.clone();
    /// tokio::spawn(async move { sweeper.start_sweep_loop().await });
    /// ```
    pub async fn start_sweep_loop(&self) {
        info!(
            "Starting recharge sweeper (interval: {}s, auto-complete after: {}s)",
            self.config.recharge_sweep_interval, self.config.recharge_auto_complete_after
        );

        let mut ticker = interval(Duration::from_secs(self.config.recharge_sweep_interval.max(1)));

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep_once(Utc::now()).await {
                error!("Recharge sweep failed: {}", e);
            }
        }
    }

    /// Complete every stale recharge once. Returns how many were completed.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        let max_age = chrono::Duration::seconds(self.config.recharge_auto_complete_after as i64);
        let cutoff = now - max_age;

        let candidates = {
            let client = self.db.client().await?;
            queries::list_stale_recharges(&**client, cutoff, SWEEP_BATCH).await?
        };

        if candidates.is_empty() {
            debug!("Recharge sweep: nothing to complete");
            return Ok(0);
        }

        let mut completed = 0;
        for id in candidates {
            match self.complete_one(id, now).await {
                Ok(Some((recharge, balance))) => {
                    completed += 1;
                    self.notify(&recharge, balance).await;
                }
                Ok(None) => debug!("Recharge {} already completed elsewhere", id),
                Err(e) => warn!("Failed to complete recharge {}: {}", id, e),
            }
        }

        info!("Recharge sweep completed {} recharge(s)", completed);
        Ok(completed)
    }

    async fn complete_one(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<(RechargeRecord, Decimal)>, LedgerError> {
        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        let Some(recharge) = queries::complete_recharge(&*tx, id, now).await? else {
            return Ok(None);
        };

        let currency: Currency = recharge.currency.parse().map_err(LedgerError::Internal)?;
        let change = wallet_ledger::credit(
            &*tx,
            &LedgerEntry {
                user_id: recharge.user_id,
                wallet: WalletKind::Main,
                currency,
                amount: recharge.amount,
                reason: "recharge",
                reference_id: Some(recharge.id),
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            "✅ Recharge {} completed: {} {} credited to {}",
            recharge.id, recharge.amount, recharge.currency, recharge.user_id
        );
        Ok(Some((recharge, change.new_balance)))
    }

    async fn notify(&self, recharge: &RechargeRecord, balance: Decimal) {
        let _ = self
            .ws_registry
            .send_to_user(recharge.user_id, WsEventType::RechargeCompleted, recharge)
            .await;
        let _ = self
            .ws_registry
            .send_to_user(
                recharge.user_id,
                WsEventType::WalletUpdate,
                WalletUpdateData {
                    wallet: WalletKind::Main.as_str().to_string(),
                    currency: recharge.currency.clone(),
                    balance,
                    reason: "recharge".to_string(),
                },
            )
            .await;
    }
}
