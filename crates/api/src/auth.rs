//! Caller identity extracted from headers set by the upstream gateway.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use store::Role;

use crate::error::ApiError;

/// Header carrying the authenticated user's ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's role. Absent means `user`.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: Role,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("Malformed {USER_ID_HEADER} header")))?;
        let user_id = raw_id
            .parse::<UserId>()
            .map_err(|e| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER}: {e}")))?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            None => Role::User,
            Some(value) => value
                .to_str()
                .map_err(|_| ApiError::Unauthorized(format!("Malformed {USER_ROLE_HEADER} header")))?
                .parse::<Role>()
                .map_err(ApiError::Unauthorized)?,
        };

        Ok(AuthUser { user_id, role })
    }
}

/// An authenticated caller with the admin role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminUser(pub AuthUser);

impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin role required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
