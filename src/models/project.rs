use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, Result};

pub const MAX_PRODUCT_IMAGE_COUNT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Page {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IconType {
    #[default]
    AiGenerated,
    Uploaded,
}

impl IconType {
    pub fn as_str(self) -> &'static str {
        match self {
            IconType::AiGenerated => "ai_generated",
            IconType::Uploaded => "uploaded",
        }
    }
}

impl FromStr for IconType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "ai_generated" => Ok(IconType::AiGenerated),
            "uploaded" => Ok(IconType::Uploaded),
            other => Err(AppError::Validation(format!("Invalid iconType: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseIntegration {
    pub auth: bool,
    pub firestore: bool,
    pub storage: bool,
    #[serde(default)]
    pub cloud_functions: bool,
}

impl FirebaseIntegration {
    pub fn any_enabled(&self) -> bool {
        self.auth || self.firestore || self.storage || self.cloud_functions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    None,
    Firebase,
    Supabase,
    Mysql,
    Postgresql,
    Mongodb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseFeature {
    Authentication,
    DataStorage,
    RealTime,
    Analytics,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct DatabaseIntegration {
    #[serde(rename = "type")]
    pub kind: DatabaseType,
    #[serde(default)]
    pub features: Vec<DatabaseFeature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Generating,
    Ready,
    Failed,
}

impl ProjectStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProjectStatus::Generating)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Generating => "generating",
            ProjectStatus::Ready => "ready",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "generating" => Ok(ProjectStatus::Generating),
            "ready" => Ok(ProjectStatus::Ready),
            "failed" => Ok(ProjectStatus::Failed),
            other => Err(AppError::Validation(format!("Invalid project status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStep {
    GeneratingSpecification,
    MaterializingProject,
    ArchivingProject,
}

impl GenerationStep {
    pub const ALL: [GenerationStep; 3] = [
        GenerationStep::GeneratingSpecification,
        GenerationStep::MaterializingProject,
        GenerationStep::ArchivingProject,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStep::GeneratingSpecification => "generating_specification",
            GenerationStep::MaterializingProject => "materializing_project",
            GenerationStep::ArchivingProject => "archiving_project",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    pub current_step: Option<GenerationStep>,
    pub completed_steps: Vec<GenerationStep>,
    pub total_steps: u32,
    pub progress_percentage: u32,
}

impl Default for GenerationProgress {
    fn default() -> Self {
        GenerationProgress {
            current_step: None,
            completed_steps: Vec::new(),
            total_steps: GenerationStep::ALL.len() as u32,
            progress_percentage: 0,
        }
    }
}

impl GenerationProgress {
    /// Marks the running step complete and starts `step`.
    pub fn begin(&mut self, step: GenerationStep) {
        self.finish_current();
        self.current_step = Some(step);
    }

    /// Marks the running step complete, leaving nothing in flight.
    pub fn complete(&mut self) {
        self.finish_current();
    }

    fn finish_current(&mut self) {
        if let Some(step) = self.current_step.take() {
            if !self.completed_steps.contains(&step) {
                self.completed_steps.push(step);
            }
        }
        self.progress_percentage = if self.total_steps == 0 {
            100
        } else {
            (self.completed_steps.len() as u32 * 100 / self.total_steps).min(100)
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub app_name: String,
    pub description: Option<String>,
    pub prompt: String,
    pub pages: Vec<Page>,
    pub icon_type: IconType,
    pub icon_path: Option<String>,
    pub firebase_integration: FirebaseIntegration,
    pub database_integration: DatabaseIntegration,
    pub include_product_images: bool,
    pub product_image_count: u8,
    pub generation_progress: GenerationProgress,
    pub status: ProjectStatus,
    /// Set if and only if `status` is `ready`.
    #[serde(rename = "zipFilePath")]
    pub archive_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn from_new(new_project: NewProject) -> Self {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            user_id: new_project.user_id,
            app_name: new_project.app_name,
            description: new_project.description,
            prompt: new_project.prompt,
            pages: new_project.pages,
            icon_type: new_project.icon_type,
            icon_path: new_project.icon_path,
            firebase_integration: new_project.firebase_integration,
            database_integration: new_project.database_integration,
            include_product_images: new_project.include_product_images,
            product_image_count: new_project.product_image_count,
            generation_progress: GenerationProgress::default(),
            status: ProjectStatus::Generating,
            archive_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `update` into the record, enforcing the forward-only status
    /// machine and the archive/ready pairing.
    pub fn apply(&mut self, update: ProjectUpdate) -> Result<()> {
        let next_status = update.status.unwrap_or(self.status);
        if self.status.is_terminal() && update.status.is_some() {
            return Err(AppError::InvalidTransition(format!(
                "project {} is already {}",
                self.id, self.status
            )));
        }

        let next_archive = update.archive_path.or_else(|| self.archive_path.clone());
        match (next_status, next_archive.is_some()) {
            (ProjectStatus::Ready, false) => {
                return Err(AppError::InvalidTransition(format!(
                    "project {} cannot be ready without an archive",
                    self.id
                )))
            }
            (ProjectStatus::Generating | ProjectStatus::Failed, true) => {
                return Err(AppError::InvalidTransition(format!(
                    "project {} can only carry an archive when ready",
                    self.id
                )))
            }
            _ => {}
        }

        self.status = next_status;
        self.archive_path = next_archive;
        if let Some(progress) = update.generation_progress {
            self.generation_progress = progress;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Validated input for a new project record.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub user_id: Uuid,
    pub app_name: String,
    pub description: Option<String>,
    pub prompt: String,
    pub pages: Vec<Page>,
    pub icon_type: IconType,
    pub icon_path: Option<String>,
    pub firebase_integration: FirebaseIntegration,
    pub database_integration: DatabaseIntegration,
    pub include_product_images: bool,
    pub product_image_count: u8,
}

/// Body of `POST /api/generate-app`, shared by the JSON and multipart forms.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateAppPayload {
    pub app_name: String,
    pub description: Option<String>,
    pub prompt: String,
    pub pages: Vec<Page>,
    pub icon_type: IconType,
    pub firebase_integration: FirebaseIntegration,
    pub database_integration: DatabaseIntegration,
    pub include_product_images: bool,
    pub product_image_count: i64,
}

impl GenerateAppPayload {
    /// Validates the request and binds it to its owner and stored icon.
    pub fn into_new_project(self, user_id: Uuid, icon_path: Option<String>) -> Result<NewProject> {
        if self.app_name.trim().is_empty() {
            return Err(AppError::Validation("appName is required".to_string()));
        }
        if self.prompt.trim().is_empty() {
            return Err(AppError::Validation("prompt is required".to_string()));
        }
        if self
            .pages
            .iter()
            .any(|page| page.title.trim().is_empty())
        {
            return Err(AppError::Validation("every page needs a title".to_string()));
        }
        if !(0..=MAX_PRODUCT_IMAGE_COUNT).contains(&self.product_image_count) {
            return Err(AppError::Validation(format!(
                "productImageCount must be between 0 and {}",
                MAX_PRODUCT_IMAGE_COUNT
            )));
        }
        if self.icon_type == IconType::Uploaded && icon_path.is_none() {
            return Err(AppError::Validation(
                "iconType uploaded requires an icon file".to_string(),
            ));
        }

        Ok(NewProject {
            user_id,
            app_name: self.app_name.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            prompt: self.prompt,
            pages: self.pages,
            icon_type: self.icon_type,
            icon_path,
            firebase_integration: self.firebase_integration,
            database_integration: self.database_integration,
            include_product_images: self.include_product_images,
            product_image_count: self.product_image_count as u8,
        })
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub status: Option<ProjectStatus>,
    pub archive_path: Option<String>,
    pub generation_progress: Option<GenerationProgress>,
}

impl ProjectUpdate {
    pub fn progress(progress: GenerationProgress) -> Self {
        ProjectUpdate {
            generation_progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn ready(archive_path: impl Into<String>, progress: GenerationProgress) -> Self {
        ProjectUpdate {
            status: Some(ProjectStatus::Ready),
            archive_path: Some(archive_path.into()),
            generation_progress: Some(progress),
        }
    }

    pub fn failed() -> Self {
        ProjectUpdate {
            status: Some(ProjectStatus::Failed),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project() -> Project {
        Project::from_new(NewProject {
            user_id: Uuid::new_v4(),
            app_name: "Notes".to_string(),
            description: None,
            prompt: "simple note app".to_string(),
            pages: vec![Page {
                title: "Home".to_string(),
                description: "main screen".to_string(),
            }],
            icon_type: IconType::AiGenerated,
            icon_path: None,
            firebase_integration: FirebaseIntegration::default(),
            database_integration: DatabaseIntegration::default(),
            include_product_images: false,
            product_image_count: 0,
        })
    }

    #[test]
    fn new_project_starts_generating_without_archive() {
        let project = sample_project();
        assert_eq!(project.status, ProjectStatus::Generating);
        assert!(project.archive_path.is_none());
        assert_eq!(project.generation_progress.progress_percentage, 0);
    }

    #[test]
    fn ready_requires_archive_location() {
        let mut project = sample_project();
        let update = ProjectUpdate {
            status: Some(ProjectStatus::Ready),
            ..Default::default()
        };
        assert!(matches!(
            project.apply(update),
            Err(AppError::InvalidTransition(_))
        ));
        assert_eq!(project.status, ProjectStatus::Generating);

        project
            .apply(ProjectUpdate::ready("out.zip", GenerationProgress::default()))
            .unwrap();
        assert_eq!(project.status, ProjectStatus::Ready);
        assert_eq!(project.archive_path.as_deref(), Some("out.zip"));
    }

    #[test]
    fn terminal_states_reject_status_changes() {
        let mut project = sample_project();
        project.apply(ProjectUpdate::failed()).unwrap();

        assert!(project.apply(ProjectUpdate::failed()).is_err());
        assert!(project
            .apply(ProjectUpdate {
                status: Some(ProjectStatus::Generating),
                ..Default::default()
            })
            .is_err());
        assert!(project
            .apply(ProjectUpdate::ready("late.zip", GenerationProgress::default()))
            .is_err());
        assert_eq!(project.status, ProjectStatus::Failed);
        assert!(project.archive_path.is_none());
    }

    #[test]
    fn failed_cannot_carry_archive() {
        let mut project = sample_project();
        let update = ProjectUpdate {
            status: Some(ProjectStatus::Failed),
            archive_path: Some("stray.zip".to_string()),
            ..Default::default()
        };
        assert!(project.apply(update).is_err());
    }

    #[test]
    fn progress_tracks_completed_steps() {
        let mut progress = GenerationProgress::default();
        progress.begin(GenerationStep::GeneratingSpecification);
        assert_eq!(progress.progress_percentage, 0);

        progress.begin(GenerationStep::MaterializingProject);
        assert_eq!(progress.completed_steps, vec![GenerationStep::GeneratingSpecification]);
        assert_eq!(progress.progress_percentage, 33);

        progress.begin(GenerationStep::ArchivingProject);
        progress.complete();
        assert_eq!(progress.current_step, None);
        assert_eq!(progress.progress_percentage, 100);
    }

    #[test]
    fn payload_rejects_out_of_range_image_count() {
        for count in [-1, 21, 500] {
            let payload = GenerateAppPayload {
                app_name: "Shop".to_string(),
                prompt: "store".to_string(),
                product_image_count: count,
                ..Default::default()
            };
            assert!(matches!(
                payload.into_new_project(Uuid::new_v4(), None),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn payload_requires_icon_for_uploaded_type() {
        let payload = GenerateAppPayload {
            app_name: "Shop".to_string(),
            prompt: "store".to_string(),
            icon_type: IconType::Uploaded,
            ..Default::default()
        };
        assert!(payload
            .clone()
            .into_new_project(Uuid::new_v4(), None)
            .is_err());

        let project = payload
            .into_new_project(Uuid::new_v4(), Some("icons/a.png".to_string()))
            .unwrap();
        assert_eq!(project.icon_path.as_deref(), Some("icons/a.png"));
    }

    #[test]
    fn payload_decodes_camel_case_json() {
        let payload: GenerateAppPayload = serde_json::from_str(
            r#"{
                "appName": "Shop",
                "prompt": "store",
                "pages": [{"title": "Home", "description": "landing"}],
                "iconType": "ai_generated",
                "firebaseIntegration": {"auth": true, "firestore": false, "storage": false},
                "databaseIntegration": {"type": "firebase", "features": ["real_time"]},
                "includeProductImages": true,
                "productImageCount": 20
            }"#,
        )
        .unwrap();
        let project = payload.into_new_project(Uuid::new_v4(), None).unwrap();
        assert_eq!(project.product_image_count, 20);
        assert_eq!(project.database_integration.kind, DatabaseType::Firebase);
        assert_eq!(project.database_integration.features, vec![DatabaseFeature::RealTime]);
    }

    #[test]
    fn firebase_integration_accepts_missing_cloud_functions() {
        let flags: FirebaseIntegration =
            serde_json::from_str(r#"{"auth":true,"firestore":false,"storage":false}"#).unwrap();
        assert!(flags.auth);
        assert!(!flags.cloud_functions);
        assert!(flags.any_enabled());
        assert!(!FirebaseIntegration::default().any_enabled());
    }
}
