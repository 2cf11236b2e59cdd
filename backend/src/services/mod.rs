//! # Services Module
//!
//! This module contains the business logic of the referral ledger.
//! Each service handles a specific domain.
//!
//! ## Services Overview
//!
//! | Service | Responsibility |
//! |---------|---------------|
//! | `ReferralService` | Signup, referral edges, referral stats |
//! | `InvestmentService` | Level purchase and investment commissions |
//! | `TaskService` | Task reward settlement, task/level catalog |
//! | `WithdrawalService` | Withdrawal gate, requests, approval, window config |
//! | `BankAccountService` | Payout destinations |
//! | `RechargeService` | Top-ups and the background sweeper |
//! | `WalletService` | Profile balances and the wallet journal |
//!
//! ## Service Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SERVICES LAYER                            │
//! │                                                                  │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐    │
//! │  │  Referral  │ │ Investment │ │    Task    │ │ Withdrawal │    │
//! │  └─────┬──────┘ └─────┬──────┘ └─────┬──────┘ └─────┬──────┘    │
//! │        │              │              │              │            │
//! │        ▼              ▼              │              │            │
//! │  ┌──────────────────────────┐        │      ┌───────┴──────┐     │
//! │  │       commission         │        │      │ withdrawal   │     │
//! │  │ compute + distribute     │        │      │ gate         │     │
//! │  └────────────┬─────────────┘        │      └──────────────┘     │
//! │               ▼                      ▼                           │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │   wallet_ledger: atomic credit/debit + journal row        │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod bank_accounts;
pub mod commission;
pub mod investment;
pub mod recharge;
pub mod referral_graph;
pub mod task_settlement;
pub mod wallet_ledger;
pub mod withdrawal_gate;
pub mod withdrawal_manager;

pub use bank_accounts::BankAccountService;
pub use investment::InvestmentService;
pub use recharge::RechargeService;
pub use referral_graph::ReferralService;
pub use task_settlement::TaskService;
pub use wallet_ledger::WalletService;
pub use withdrawal_manager::{WithdrawalOutcome, WithdrawalService};
