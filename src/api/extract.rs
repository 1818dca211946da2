//! Request extractors.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::ShiftFlexError;
use crate::service::Actor;

/// Header carrying the authenticated user id, set by the auth proxy in
/// front of the service.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Optional header carrying the authenticated user's email address. When
/// present it is stored as the user's notification address.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Header carrying the shared admin secret.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// The calling user, read from [`USER_ID_HEADER`] and
/// [`USER_EMAIL_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    /// Authenticated user.
    pub id: UserId,
    /// Address supplied by the auth provider, if any.
    pub email: Option<String>,
}

impl ActingUser {
    /// As a service actor.
    #[must_use]
    pub const fn actor(&self) -> Actor {
        Actor::User(self.id)
    }

    /// Reads the user from request headers without touching the store.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::Forbidden`] without a user id,
    /// [`ShiftFlexError::InvalidRequest`] for a malformed id or address.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ShiftFlexError> {
        let raw = headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ShiftFlexError::Forbidden(format!("missing {USER_ID_HEADER} header")))?
            .to_str()
            .map_err(|_| ShiftFlexError::InvalidRequest(format!("{USER_ID_HEADER} is not text")))?;
        let uuid = raw.trim().parse::<uuid::Uuid>().map_err(|_| {
            ShiftFlexError::InvalidRequest(format!("{USER_ID_HEADER} is not a UUID"))
        })?;

        let email = match headers.get(USER_EMAIL_HEADER) {
            None => None,
            Some(value) => {
                let text = value.to_str().map_err(|_| {
                    ShiftFlexError::InvalidRequest(format!("{USER_EMAIL_HEADER} is not text"))
                })?;
                let address = text.trim().parse::<lettre::Address>().map_err(|e| {
                    ShiftFlexError::InvalidRequest(format!("{USER_EMAIL_HEADER}: {e}"))
                })?;
                Some(address.to_string())
            }
        };

        Ok(Self {
            id: UserId::from_uuid(uuid),
            email,
        })
    }
}

impl<S> FromRequestParts<S> for ActingUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ShiftFlexError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = Self::from_headers(&parts.headers)?;
        if let Some(email) = user.email.as_deref() {
            AppState::from_ref(state)
                .match_service
                .record_user_email(user.id, email)
                .await?;
        }
        Ok(user)
    }
}

/// Proof that the caller presented the configured admin token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminAccess;

impl AdminAccess {
    /// Checks `headers` against the configured token.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::Forbidden`] when no token is configured or the
    /// header is missing or wrong.
    pub fn check(expected: Option<&str>, headers: &HeaderMap) -> Result<Self, ShiftFlexError> {
        let Some(expected) = expected else {
            return Err(ShiftFlexError::Forbidden(
                "admin routes are disabled; set ADMIN_TOKEN".to_string(),
            ));
        };
        let presented = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim);
        if presented != Some(expected) {
            return Err(ShiftFlexError::Forbidden(format!(
                "missing or wrong {ADMIN_TOKEN_HEADER} header"
            )));
        }
        Ok(Self)
    }
}

impl<S> FromRequestParts<S> for AdminAccess
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ShiftFlexError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Self::check(state.admin_token.as_deref(), &parts.headers)
    }
}
