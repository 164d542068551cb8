use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{NewProject, NewUser, Project, ProjectUpdate, SubscriptionPlan, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::Database;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_user_by_firebase_uid(&self, firebase_uid: &str) -> Result<Option<User>>;

    /// Overwrites the generation counter; last writer wins.
    async fn set_generations_used(&self, id: Uuid, generations_used: u32) -> Result<User>;

    /// Switches plan and resets the generation counter to zero.
    async fn update_plan(&self, id: Uuid, plan: SubscriptionPlan) -> Result<User>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Inserts a new record in status `generating`.
    async fn create_project(&self, new_project: NewProject) -> Result<Project>;

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>>;

    /// Projects owned by `user_id`, newest first.
    async fn list_projects_by_user(&self, user_id: Uuid) -> Result<Vec<Project>>;

    /// Merges `update` and touches `updated_at`. `NotFound` if the record is gone.
    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> Result<Project>;

    async fn delete_project(&self, id: Uuid) -> Result<()>;
}
