//! `AuthUser` extractor: reads the identity headers injected by the
//! upstream gateway.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use movehub_core::error::AppError;
use movehub_core::types::UserId;
use movehub_entity::user::UserRole;
use movehub_service::RequestContext;

use crate::error::ApiError;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Authenticated caller context available in handlers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub RequestContext);

impl AuthUser {
    /// Returns the inner `RequestContext`.
    pub fn context(&self) -> &RequestContext {
        &self.0
    }
}

impl std::ops::Deref for AuthUser {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| AppError::unauthorized("Missing x-user-id header"))?
            .parse::<Uuid>()
            .map_err(|_| AppError::unauthorized("Invalid x-user-id header"))?;
        let role = header(USER_ROLE_HEADER)
            .ok_or_else(|| AppError::unauthorized("Missing x-user-role header"))?
            .parse::<UserRole>()
            .map_err(|_| AppError::unauthorized("Invalid x-user-role header"))?;

        Ok(AuthUser(RequestContext::new(UserId::from_uuid(user_id), role)))
    }
}
