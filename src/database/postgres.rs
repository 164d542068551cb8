use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use uuid::Uuid;

use crate::{
    database::{ProjectStore, UserStore},
    errors::{AppError, Result},
    models::{
        DatabaseIntegration, FirebaseIntegration, GenerationProgress, NewProject, NewUser, Page,
        Project, ProjectUpdate, SubscriptionPlan, User,
    },
};

const USER_COLUMNS: &str = "id, email, name, firebase_uid, subscription_plan, \
     subscription_status, generations_used, created_at, updated_at";

const PROJECT_COLUMNS: &str = "id, user_id, app_name, description, prompt, pages, icon_type, \
     icon_path, firebase_integration, database_integration, include_product_images, \
     product_image_count, generation_progress, status, zip_file_path, created_at, updated_at";

/// Postgres-backed user and project store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.into()))?;
        Ok(())
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    firebase_uid: String,
    subscription_plan: String,
    subscription_status: String,
    generations_used: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            firebase_uid: row.firebase_uid,
            subscription_plan: row.subscription_plan.parse()?,
            subscription_status: row.subscription_status.parse()?,
            generations_used: row.generations_used.max(0) as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ProjectRow {
    id: Uuid,
    user_id: Uuid,
    app_name: String,
    description: Option<String>,
    prompt: String,
    pages: Json<Vec<Page>>,
    icon_type: String,
    icon_path: Option<String>,
    firebase_integration: Json<FirebaseIntegration>,
    database_integration: Json<DatabaseIntegration>,
    include_product_images: bool,
    product_image_count: i16,
    generation_progress: Json<GenerationProgress>,
    status: String,
    zip_file_path: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> Result<Self> {
        Ok(Project {
            id: row.id,
            user_id: row.user_id,
            app_name: row.app_name,
            description: row.description,
            prompt: row.prompt,
            pages: row.pages.0,
            icon_type: row.icon_type.parse()?,
            icon_path: row.icon_path,
            firebase_integration: row.firebase_integration.0,
            database_integration: row.database_integration.0,
            include_product_images: row.include_product_images,
            product_image_count: row.product_image_count.clamp(0, 20) as u8,
            generation_progress: row.generation_progress.0,
            status: row.status.parse()?,
            archive_path: row.zip_file_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_unique_violation(error: sqlx::Error) -> AppError {
    match error {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Validation("A user with this email or identity already exists".to_string())
        }
        other => AppError::Database(other),
    }
}

#[async_trait]
impl UserStore for Database {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let user = User::from_new(new_user);
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.firebase_uid)
        .bind(user.subscription_plan.as_str())
        .bind(user.subscription_status.as_str())
        .bind(user.generations_used as i32)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        row.try_into()
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_user_by_firebase_uid(&self, firebase_uid: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE firebase_uid = $1"
        ))
        .bind(firebase_uid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn set_generations_used(&self, id: Uuid, generations_used: u32) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET generations_used = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(generations_used as i32)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;

        row.try_into()
    }

    async fn update_plan(&self, id: Uuid, plan: SubscriptionPlan) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET subscription_plan = $2, generations_used = 0, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(plan.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;

        row.try_into()
    }
}

#[async_trait]
impl ProjectStore for Database {
    async fn create_project(&self, new_project: NewProject) -> Result<Project> {
        let project = Project::from_new(new_project);
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "INSERT INTO projects ({PROJECT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(project.id)
        .bind(project.user_id)
        .bind(&project.app_name)
        .bind(&project.description)
        .bind(&project.prompt)
        .bind(Json(&project.pages))
        .bind(project.icon_type.as_str())
        .bind(&project.icon_path)
        .bind(Json(&project.firebase_integration))
        .bind(Json(&project.database_integration))
        .bind(project.include_product_images)
        .bind(project.product_image_count as i16)
        .bind(Json(&project.generation_progress))
        .bind(project.status.as_str())
        .bind(&project.archive_path)
        .bind(project.created_at)
        .bind(project.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Project::try_from).transpose()
    }

    async fn list_projects_by_user(&self, user_id: Uuid) -> Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Project::try_from).collect()
    }

    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> Result<Project> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        let mut project = Project::try_from(row)?;
        project.apply(update)?;

        sqlx::query(
            "UPDATE projects SET status = $2, zip_file_path = $3, generation_progress = $4, \
             updated_at = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(project.status.as_str())
        .bind(&project.archive_path)
        .bind(Json(&project.generation_progress))
        .bind(project.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(project)
    }

    async fn delete_project(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
