use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    database::UserStore,
    errors::{AppError, Result},
    models::{SubscriptionPlan, User},
};

/// Per-user generation counter checked against the plan ceiling.
///
/// The check and the increment are separate calls with no locking between
/// them, so concurrent submissions from one user can both pass the check.
#[derive(Clone)]
pub struct QuotaLedger {
    users: Arc<dyn UserStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaCheckResult {
    pub allowed: bool,
    pub used: u32,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub plan: SubscriptionPlan,
    pub used: u32,
    /// `None` for unbounded plans.
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
}

impl QuotaLedger {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub fn check_generation_quota(&self, user: &User) -> QuotaCheckResult {
        let limit = user.subscription_plan.generation_limit();
        let allowed = limit.map_or(true, |limit| user.generations_used < limit);

        QuotaCheckResult {
            allowed,
            used: user.generations_used,
            limit,
        }
    }

    pub fn ensure_generation_allowed(&self, user: &User) -> Result<()> {
        let check = self.check_generation_quota(user);
        if check.allowed {
            return Ok(());
        }

        tracing::info!(
            user_id = %user.id,
            plan = %user.subscription_plan,
            used = check.used,
            "generation denied by plan ceiling"
        );
        Err(AppError::QuotaExceeded(format!(
            "Generation limit of {} reached for the {} plan",
            check.limit.unwrap_or_default(),
            user.subscription_plan
        )))
    }

    /// Counts one accepted generation against the user's plan.
    pub async fn record_generation(&self, user_id: Uuid) -> Result<User> {
        let user = self.users.get_user(user_id).await?.ok_or(AppError::NotFound)?;
        self.users
            .set_generations_used(user_id, user.generations_used.saturating_add(1))
            .await
    }

    pub async fn change_plan(&self, user_id: Uuid, plan: SubscriptionPlan) -> Result<User> {
        let user = self.users.update_plan(user_id, plan).await?;
        tracing::info!(user_id = %user_id, plan = %plan, "subscription plan changed");
        Ok(user)
    }

    pub fn quota_status(&self, user: &User) -> QuotaStatus {
        let limit = user.subscription_plan.generation_limit();
        QuotaStatus {
            plan: user.subscription_plan,
            used: user.generations_used,
            limit,
            remaining: limit.map(|limit| limit.saturating_sub(user.generations_used)),
        }
    }
}
