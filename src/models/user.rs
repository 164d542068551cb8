use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    #[default]
    Starter,
    Pro,
    Team,
    Enterprise,
}

impl SubscriptionPlan {
    pub const ALL: [SubscriptionPlan; 4] = [
        SubscriptionPlan::Starter,
        SubscriptionPlan::Pro,
        SubscriptionPlan::Team,
        SubscriptionPlan::Enterprise,
    ];

    /// Generations allowed per billing cycle; `None` means unbounded.
    pub fn generation_limit(self) -> Option<u32> {
        match self {
            SubscriptionPlan::Starter => Some(5),
            SubscriptionPlan::Pro => Some(25),
            SubscriptionPlan::Team => Some(100),
            SubscriptionPlan::Enterprise => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionPlan::Starter => "starter",
            SubscriptionPlan::Pro => "pro",
            SubscriptionPlan::Team => "team",
            SubscriptionPlan::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionPlan {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "starter" => Ok(SubscriptionPlan::Starter),
            "pro" => Ok(SubscriptionPlan::Pro),
            "team" => Ok(SubscriptionPlan::Team),
            "enterprise" => Ok(SubscriptionPlan::Enterprise),
            _ => Err(AppError::Validation("Invalid subscription plan".to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            other => Err(AppError::Validation(format!(
                "Invalid subscription status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// External identity key; unique across users.
    pub firebase_uid: String,
    pub subscription_plan: SubscriptionPlan,
    pub subscription_status: SubscriptionStatus,
    pub generations_used: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_new(new_user: NewUser) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: new_user.email,
            name: new_user.name,
            firebase_uid: new_user.firebase_uid,
            subscription_plan: SubscriptionPlan::Starter,
            subscription_status: SubscriptionStatus::Active,
            generations_used: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub firebase_uid: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(AppError::Validation("email is required".to_string()));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => {
                return Err(AppError::Validation(format!(
                    "'{}' is not a valid email address",
                    email
                )))
            }
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if self.firebase_uid.trim().is_empty() {
            return Err(AppError::Validation("firebaseUid is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriptionRequest {
    pub plan: String,
}
