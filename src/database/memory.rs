use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    database::{ProjectStore, UserStore},
    errors::{AppError, Result},
    models::{NewProject, NewUser, Project, ProjectUpdate, SubscriptionPlan, User},
};

/// Map-backed store for users and projects.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    // Insertion sequence keeps newest-first ordering stable when timestamps tie.
    projects: RwLock<HashMap<Uuid, (u64, Project)>>,
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.firebase_uid == new_user.firebase_uid) {
            return Err(AppError::Validation(
                "A user with this identity already exists".to_string(),
            ));
        }
        if users.values().any(|u| u.email == new_user.email) {
            return Err(AppError::Validation(
                "A user with this email already exists".to_string(),
            ));
        }

        let user = User::from_new(new_user);
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_firebase_uid(&self, firebase_uid: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.firebase_uid == firebase_uid)
            .cloned())
    }

    async fn set_generations_used(&self, id: Uuid, generations_used: u32) -> Result<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(AppError::NotFound)?;
        user.generations_used = generations_used;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_plan(&self, id: Uuid, plan: SubscriptionPlan) -> Result<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(AppError::NotFound)?;
        user.subscription_plan = plan;
        user.generations_used = 0;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project(&self, new_project: NewProject) -> Result<Project> {
        let project = Project::from_new(new_project);
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.projects
            .write()
            .await
            .insert(project.id, (sequence, project.clone()));
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self
            .projects
            .read()
            .await
            .get(&id)
            .map(|(_, project)| project.clone()))
    }

    async fn list_projects_by_user(&self, user_id: Uuid) -> Result<Vec<Project>> {
        let projects = self.projects.read().await;
        let mut owned: Vec<&(u64, Project)> = projects
            .values()
            .filter(|(_, project)| project.user_id == user_id)
            .collect();
        owned.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        Ok(owned.into_iter().map(|(_, project)| project.clone()).collect())
    }

    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> Result<Project> {
        let mut projects = self.projects.write().await;
        let (_, project) = projects.get_mut(&id).ok_or(AppError::NotFound)?;
        project.apply(update)?;
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid) -> Result<()> {
        self.projects.write().await.remove(&id);
        Ok(())
    }
}
