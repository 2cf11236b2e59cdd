//! # REST API Module
//!
//! This module defines all HTTP endpoints of the referral ledger.
//!
//! ## Endpoint Overview
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/auth/signup` | Create user, referral edges, signup commissions |
//! | GET | `/me` | Profile and balances |
//! | POST | `/levels/purchase` | Buy a level |
//! | POST | `/tasks/{id}/complete` | Claim a task reward |
//! | POST | `/withdrawals` | Request a withdrawal |
//! | GET | `/referrals/stats` | Team and commission summary |
//! | GET | `/health` | Health check |
//!
//! The full tree is in [`routes::configure_routes`].
//!
//! ## Request/Response Format
//!
//! All requests and responses use camelCase JSON:
//!
//! ```json
//! // Success response
//! {
//!     "status": "success",
//!     "statusCode": 200,
//!     "title": "Task Completed",
//!     "message": "Reward credited to your main wallet",
//!     "data": { ... }
//! }
//!
//! // Error response
//! {
//!     "status": "error",
//!     "statusCode": 409,
//!     "title": "Conflict",
//!     "message": "Task already completed"
//! }
//! ```

pub mod extractors;
pub mod handlers;
pub mod routes;

pub use routes::configure_routes;
