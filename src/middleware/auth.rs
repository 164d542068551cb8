use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    auth::extract_bearer_token,
    errors::AppError,
    handlers::AppState,
    models::User,
};

/// The caller, resolved from the bearer token to a stored user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Auth("Authentication required".to_string()))?;

        let token = extract_bearer_token(header_value)?;
        let firebase_uid = state.identity.verify(token).await?;

        match state.users.get_user_by_firebase_uid(&firebase_uid).await? {
            Some(user) => Ok(AuthenticatedUser(user)),
            None => {
                tracing::debug!(firebase_uid = %firebase_uid, "token resolved to unknown user");
                Err(AppError::Auth("User not found".to_string()))
            }
        }
    }
}
