//! # API Route Configuration
//!
//! This module sets up all the HTTP routes for the API.

use actix_web::{error, web, HttpRequest};

use crate::error::LedgerError;

use super::handlers;

/// Body, query and path parse failures render as the envelope, not as
/// actix's plain-text 400.
fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    LedgerError::Validation(format!("Invalid request body: {}", err)).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    LedgerError::Validation(format!("Invalid query string: {}", err)).into()
}

fn path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    LedgerError::Validation(format!("Invalid path parameter: {}", err)).into()
}

/// Configure all API routes.
///
/// ## Route Structure
///
/// ```text
/// /
/// ├── /health                          GET
/// ├── /auth/signup                     POST
/// ├── /me                              GET
/// ├── /levels/purchase                 POST
/// ├── /tasks                           GET
/// │   └── /{task_id}/complete          POST
/// ├── /wallet
/// │   ├── /transactions                GET
/// │   ├── /recharge                    POST
/// │   └── /recharges                   GET
/// ├── /bank-accounts                   GET, POST
/// │   ├── /{id}                        DELETE
/// │   └── /{id}/default                POST
/// ├── /withdrawal/window               GET
/// ├── /withdrawals                     GET, POST
/// ├── /referrals
/// │   ├── /stats                       GET
/// │   └── /history                     GET
/// └── /admin                           (X-Admin-Key)
///     ├── /levels                      PUT
///     ├── /tasks                       POST
///     │   └── /{id}/active             POST
///     ├── /withdrawal-config           GET
///     │   └── /{day}                   PUT
///     └── /withdrawals
///         ├── /pending                 GET
///         ├── /{id}/approve            POST
///         └── /{id}/reject             POST
/// ```
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .route("/health", web::get().to(handlers::health_check))
        .route("/auth/signup", web::post().to(handlers::signup))
        .route("/me", web::get().to(handlers::get_profile))
        .route("/levels/purchase", web::post().to(handlers::purchase_level))
        .route("/tasks", web::get().to(handlers::list_tasks))
        .route("/tasks/{task_id}/complete", web::post().to(handlers::complete_task))
        .service(
            web::scope("/wallet")
                .route("/transactions", web::get().to(handlers::list_wallet_transactions))
                .route("/recharge", web::post().to(handlers::create_recharge))
                .route("/recharges", web::get().to(handlers::list_recharges)),
        )
        .service(
            web::resource("/bank-accounts")
                .route(web::get().to(handlers::list_bank_accounts))
                .route(web::post().to(handlers::add_bank_account)),
        )
        .route("/bank-accounts/{id}", web::delete().to(handlers::remove_bank_account))
        .route(
            "/bank-accounts/{id}/default",
            web::post().to(handlers::set_default_bank_account),
        )
        .route("/withdrawal/window", web::get().to(handlers::withdrawal_window))
        .service(
            web::resource("/withdrawals")
                .route(web::get().to(handlers::list_withdrawals))
                .route(web::post().to(handlers::request_withdrawal)),
        )
        .service(
            web::scope("/referrals")
                .route("/stats", web::get().to(handlers::referral_stats))
                .route("/history", web::get().to(handlers::referral_history)),
        )
        .service(
            web::scope("/admin")
                .route("/levels", web::put().to(handlers::upsert_level))
                .route("/tasks", web::post().to(handlers::create_task))
                .route("/tasks/{id}/active", web::post().to(handlers::set_task_active))
                .route(
                    "/withdrawal-config",
                    web::get().to(handlers::list_withdrawal_configs),
                )
                .route(
                    "/withdrawal-config/{day}",
                    web::put().to(handlers::upsert_withdrawal_config),
                )
                .route(
                    "/withdrawals/pending",
                    web::get().to(handlers::list_pending_withdrawals),
                )
                .route(
                    "/withdrawals/{id}/approve",
                    web::post().to(handlers::approve_withdrawal),
                )
                .route(
                    "/withdrawals/{id}/reject",
                    web::post().to(handlers::reject_withdrawal),
                ),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    #[actix_rt::test]
    async fn test_user_routes_require_identity() {
        let app = test::init_service(App::new().configure(configure_routes)).await;

        for uri in ["/me", "/tasks", "/withdrawals", "/referrals/stats", "/wallet/transactions"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);

            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["status"], "error");
            assert_eq!(body["statusCode"], 401);
            assert_eq!(body["title"], "Unauthorized");
            assert!(body.get("data").is_none());
        }
    }

    #[actix_rt::test]
    async fn test_malformed_identity_is_rejected() {
        let app = test::init_service(App::new().configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/tasks/00000000-0000-0000-0000-000000000001/complete")
            .insert_header(("X-User-Id", "12345"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
