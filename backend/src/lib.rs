//! # Referral Ledger Backend
//!
//! Multi-tier referral commissions and a wallet ledger over PostgreSQL.
//!
//! - REST API for signup, tasks, levels, wallets, bank accounts,
//!   withdrawals and referral statistics
//! - Admin API for the task/level catalog, withdrawal windows and
//!   withdrawal review
//! - WebSocket push of ledger events
//! - Background sweeper completing stale recharges
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BACKEND SERVICE                           │
//! │                                                                  │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  REST API   │  │  WebSocket  │  │   Background Services   │  │
//! │  │  (Actix)    │  │  /ws/{id}   │  │  • Recharge sweeper     │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! │         │                │                     │                 │
//! │  ┌──────┴────────────────┴─────────────────────┴─────────────┐  │
//! │  │                    SERVICE LAYER                           │  │
//! │  │  Referral · Investment · Task · Withdrawal · Bank · Recharge│ │
//! │  │            commission · wallet_ledger · withdrawal_gate     │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                          │                                       │
//! │                   ┌──────┴──────┐                                │
//! │                   │  PostgreSQL │                                │
//! │                   └─────────────┘                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod websocket;

use config::AppConfig;
use db::Database;
use services::{
    BankAccountService, InvestmentService, RechargeService, ReferralService, TaskService,
    WalletService, WithdrawalService,
};
use websocket::WsRegistry;

/// Application state shared across all handlers.
///
/// Wrapped in `Arc` and handed to actix as `web::Data<Arc<AppState>>`.
/// Every service holds a clone of the same connection pool.
pub struct AppState {
    /// Database connection pool for PostgreSQL
    pub db: Database,

    /// Application configuration
    pub config: AppConfig,

    pub referrals: ReferralService,
    pub investments: InvestmentService,
    pub tasks: TaskService,
    pub withdrawals: WithdrawalService,
    pub bank_accounts: BankAccountService,
    pub recharges: RechargeService,
    pub wallets: WalletService,

    /// WebSocket connection registry for real-time updates
    pub ws_registry: WsRegistry,
}

impl AppState {
    /// Build every service over one pool and registry.
    pub fn new(db: Database, config: AppConfig, ws_registry: WsRegistry) -> Self {
        Self {
            referrals: ReferralService::new(db.clone()),
            investments: InvestmentService::new(db.clone()),
            tasks: TaskService::new(db.clone(), config.clone()),
            withdrawals: WithdrawalService::new(db.clone(), config.clone()),
            bank_accounts: BankAccountService::new(db.clone()),
            recharges: RechargeService::new(db.clone(), config.clone(), ws_registry.clone()),
            wallets: WalletService::new(db.clone()),
            db,
            config,
            ws_registry,
        }
    }
}
