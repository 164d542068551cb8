use axum::{extract::State, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    errors::Result,
    handlers::{AppJson, AppState},
    middleware::AuthenticatedUser,
    models::{NewUser, SubscriptionPlan, SubscriptionRequest, User},
    services::QuotaStatus,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentUserResponse {
    pub user: User,
    pub quota: QuotaStatus,
}

/// Register a user, or return the existing one for a known identity
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = NewUser,
    responses(
        (status = 200, description = "Registered or existing user", body = User),
        (status = 400, description = "Invalid user data")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(new_user): AppJson<NewUser>,
) -> Result<Json<User>> {
    new_user.validate()?;

    if let Some(existing) = state
        .users
        .get_user_by_firebase_uid(&new_user.firebase_uid)
        .await?
    {
        return Ok(Json(existing));
    }

    let user = state.users.create_user(new_user).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok(Json(user))
}

/// The authenticated user and their generation quota
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = CurrentUserResponse),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn current_user(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<CurrentUserResponse>> {
    let quota = state.quota.quota_status(&user);
    Ok(Json(CurrentUserResponse { user, quota }))
}

/// Change subscription plan; resets the generation counter
#[utoipa::path(
    post,
    path = "/api/subscription",
    tag = "users",
    request_body = SubscriptionRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Invalid subscription plan"),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_subscription(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(request): AppJson<SubscriptionRequest>,
) -> Result<Json<User>> {
    let plan: SubscriptionPlan = request.plan.parse()?;
    let updated = state.quota.change_plan(user.id, plan).await?;
    Ok(Json(updated))
}
