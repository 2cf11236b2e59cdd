//! # Request Extractors
//!
//! Caller identity is established upstream. Handlers receive it through
//! two extractors:
//!
//! | Extractor | Header | Failure |
//! |-----------|--------|---------|
//! | [`AuthUser`] | `X-User-Id: <uuid>` | 401 |
//! | [`AdminGuard`] | `X-Admin-Key: <ADMIN_API_KEY>` | 401 |

use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl FromRequest for AuthUser {
    type Error = LedgerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = req
            .headers()
            .get(USER_ID_HEADER)
            .ok_or_else(|| LedgerError::Unauthorized("Missing X-User-Id header".to_string()))
            .and_then(|value| {
                value
                    .to_str()
                    .ok()
                    .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
                    .ok_or_else(|| LedgerError::Unauthorized("Invalid X-User-Id header".to_string()))
            })
            .map(AuthUser);

        ready(user)
    }
}

/// Present on admin handlers; construction proves the admin key matched.
#[derive(Debug, Clone, Copy)]
pub struct AdminGuard;

impl FromRequest for AdminGuard {
    type Error = LedgerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<Arc<AppState>>>() else {
            return ready(Err(LedgerError::Internal("Application state missing".to_string())));
        };

        let supplied = req
            .headers()
            .get(ADMIN_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        let outcome = match supplied {
            Some(key) if key == state.config.admin_api_key => Ok(AdminGuard),
            Some(_) => Err(LedgerError::Unauthorized("Invalid admin key".to_string())),
            None => Err(LedgerError::Unauthorized("Missing X-Admin-Key header".to_string())),
        };
        ready(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_rt::test]
    async fn test_auth_user_header() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, id.to_string()))
            .to_http_request();
        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.0, id);
    }

    #[actix_rt::test]
    async fn test_auth_user_rejects_missing_and_malformed() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(AuthUser::extract(&req).await, Err(LedgerError::Unauthorized(_))));

        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(matches!(AuthUser::extract(&req).await, Err(LedgerError::Unauthorized(_))));
    }
}
