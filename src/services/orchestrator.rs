use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    database::ProjectStore,
    errors::{AppError, Result},
    models::{GenerationProgress, GenerationStep, NewProject, Project, ProjectStatus, ProjectUpdate, User},
    services::{
        archiver::Archiver,
        materializer::ProjectMaterializer,
        metrics::{MetricsService, StepTimer},
        quota_manager::QuotaLedger,
        spec_generator::SpecificationGenerator,
    },
    utils::file::{archive_file_name, delete_file},
};

/// Handle returned to the request that started a generation.
pub struct GenerationTicket {
    /// The record as created, in status `generating`.
    pub project: Project,
    /// Resolves to the terminal status once the detached run finishes.
    pub task: JoinHandle<ProjectStatus>,
}

/// Drives one project from request to archive.
///
/// The synchronous half (`submit`) enforces the quota and creates the record;
/// the rest runs on a detached task that always ends in `ready` or `failed`.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    projects: Arc<dyn ProjectStore>,
    quota: QuotaLedger,
    generator: Arc<SpecificationGenerator>,
    materializer: ProjectMaterializer,
    archiver: Archiver,
    output_dir: PathBuf,
    metrics: MetricsService,
}

impl GenerationOrchestrator {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        quota: QuotaLedger,
        generator: Arc<SpecificationGenerator>,
        materializer: ProjectMaterializer,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            projects,
            quota,
            generator,
            materializer,
            archiver: Archiver::new(),
            output_dir: output_dir.into(),
            metrics: MetricsService::new(),
        }
    }

    /// Checks the quota, persists the record, counts the generation and
    /// starts the pipeline without waiting for it.
    pub async fn submit(&self, user: &User, new_project: NewProject) -> Result<GenerationTicket> {
        if let Err(e) = self.quota.ensure_generation_allowed(user) {
            self.metrics.record_quota_denied();
            return Err(e);
        }

        let project = self.projects.create_project(new_project).await?;
        if let Err(e) = self.quota.record_generation(user.id).await {
            tracing::error!(
                project_id = %project.id,
                user_id = %user.id,
                error = %e,
                "failed to count generation"
            );
            if let Err(update_err) = self
                .projects
                .update_project(project.id, ProjectUpdate::failed())
                .await
            {
                tracing::warn!(
                    project_id = %project.id,
                    error = %update_err,
                    "could not mark project as failed"
                );
            }
            return Err(e);
        }
        self.metrics.record_generation_started();

        tracing::info!(
            project_id = %project.id,
            user_id = %user.id,
            app_name = %project.app_name,
            "generation started"
        );

        let orchestrator = self.clone();
        let detached = project.clone();
        let task = tokio::spawn(async move { orchestrator.process(detached).await });

        Ok(GenerationTicket { project, task })
    }

    /// Runs the pipeline to a terminal status. Errors never escape; they are
    /// logged and recorded as `failed`.
    pub async fn process(&self, project: Project) -> ProjectStatus {
        let project_id = project.id;
        let started = Instant::now();

        let outcome = self.run_pipeline(&project).await;

        if let Err(e) = self.materializer.cleanup(project_id) {
            tracing::warn!(project_id = %project_id, error = %e, "failed to remove scratch directory");
        }

        match outcome {
            Ok(archive_bytes) => {
                self.metrics.record_generation_ready(started.elapsed(), archive_bytes);
                tracing::info!(
                    project_id = %project_id,
                    archive_bytes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "generation ready"
                );
                ProjectStatus::Ready
            }
            Err(e) => {
                tracing::error!(
                    project_id = %project_id,
                    kind = e.kind(),
                    error = %e,
                    "generation failed"
                );
                self.metrics.record_generation_failed(e.kind());
                if let Err(update_err) = self
                    .projects
                    .update_project(project_id, ProjectUpdate::failed())
                    .await
                {
                    tracing::warn!(
                        project_id = %project_id,
                        error = %update_err,
                        "could not mark project as failed"
                    );
                }
                ProjectStatus::Failed
            }
        }
    }

    async fn run_pipeline(&self, project: &Project) -> Result<u64> {
        let mut progress = GenerationProgress::default();

        self.advance(project.id, &mut progress, GenerationStep::GeneratingSpecification)
            .await?;
        let spec = {
            let _timer = StepTimer::new(self.metrics, GenerationStep::GeneratingSpecification);
            self.generator
                .generate(
                    &project.app_name,
                    &project.pages,
                    &project.prompt,
                    project.firebase_integration,
                )
                .await?
        };

        self.advance(project.id, &mut progress, GenerationStep::MaterializingProject)
            .await?;
        let project_dir = {
            let _timer = StepTimer::new(self.metrics, GenerationStep::MaterializingProject);
            let materializer = self.materializer.clone();
            let project_id = project.id;
            tokio::task::spawn_blocking(move || materializer.materialize(project_id, &spec))
                .await
                .map_err(|e| AppError::Filesystem(format!("Materialization task failed: {}", e)))??
        };

        self.advance(project.id, &mut progress, GenerationStep::ArchivingProject)
            .await?;
        let archive_path = self.output_dir.join(archive_file_name(project.id));
        let archive_bytes = {
            let _timer = StepTimer::new(self.metrics, GenerationStep::ArchivingProject);
            self.archiver.archive(&project_dir, &archive_path).await?
        };

        progress.complete();
        let update = ProjectUpdate::ready(archive_path.to_string_lossy(), progress);
        if let Err(e) = self.projects.update_project(project.id, update).await {
            if let Err(cleanup) = delete_file(&archive_path).await {
                tracing::warn!(project_id = %project.id, error = %cleanup, "failed to remove orphaned archive");
            }
            return Err(e);
        }
        Ok(archive_bytes)
    }

    async fn advance(
        &self,
        project_id: Uuid,
        progress: &mut GenerationProgress,
        step: GenerationStep,
    ) -> Result<()> {
        progress.begin(step);
        tracing::debug!(project_id = %project_id, step = step.as_str(), "generation step");
        self.projects
            .update_project(project_id, ProjectUpdate::progress(progress.clone()))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, UserStore};
    use crate::models::{DatabaseIntegration, FirebaseIntegration, IconType, NewUser, Page, SubscriptionPlan};
    use crate::services::model_client::MockModelClient;
    use serde_json::json;
    use tempfile::TempDir;

    struct Harness {
        _temp: TempDir,
        store: Arc<MemoryStore>,
        orchestrator: GenerationOrchestrator,
        scratch: PathBuf,
        output: PathBuf,
        user: User,
    }

    async fn harness(client: MockModelClient) -> Harness {
        let temp = tempfile::tempdir().unwrap();
        let scratch = temp.path().join("temp");
        let output = temp.path().join("generated");
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(NewUser {
                email: "dev@example.com".to_string(),
                name: "Dev".to_string(),
                firebase_uid: "dev-uid".to_string(),
            })
            .await
            .unwrap();

        let orchestrator = GenerationOrchestrator::new(
            store.clone(),
            QuotaLedger::new(store.clone()),
            Arc::new(SpecificationGenerator::new(Arc::new(client))),
            ProjectMaterializer::new(&scratch),
            &output,
        );

        Harness {
            _temp: temp,
            store,
            orchestrator,
            scratch,
            output,
            user,
        }
    }

    fn new_project(user_id: Uuid) -> NewProject {
        NewProject {
            user_id,
            app_name: "Notes".to_string(),
            description: None,
            prompt: "a note taking app".to_string(),
            pages: vec![Page {
                title: "Home".to_string(),
                description: "list of notes".to_string(),
            }],
            icon_type: IconType::AiGenerated,
            icon_path: None,
            firebase_integration: FirebaseIntegration::default(),
            database_integration: DatabaseIntegration::default(),
            include_product_images: false,
            product_image_count: 0,
        }
    }

    fn spec_payload() -> String {
        json!({
            "appName": "Notes",
            "packageName": "com.example.notes",
            "mainActivity": "MainActivity",
            "pages": [{ "name": "Home", "description": "list", "composableFunction": "HomeScreen" }],
            "firebaseIntegration": { "auth": false, "firestore": false, "storage": false },
            "dependencies": [],
            "files": [{ "path": "app/src/main/java/com/example/notes/MainActivity.kt", "content": "class MainActivity" }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn successful_run_ends_ready_with_archive() {
        let mut client = MockModelClient::new();
        client.expect_generate_json().returning(|_| Ok(spec_payload()));
        let h = harness(client).await;

        let ticket = h
            .orchestrator
            .submit(&h.user, new_project(h.user.id))
            .await
            .unwrap();
        assert_eq!(ticket.project.status, ProjectStatus::Generating);
        assert_eq!(ticket.task.await.unwrap(), ProjectStatus::Ready);

        let stored = h.store.get_project(ticket.project.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Ready);
        assert_eq!(stored.generation_progress.progress_percentage, 100);
        assert_eq!(stored.generation_progress.completed_steps.len(), 3);

        let archive = h.output.join(archive_file_name(stored.id));
        assert_eq!(stored.archive_path.as_deref(), Some(archive.to_string_lossy().as_ref()));
        assert!(archive.is_file());
        assert!(!h.scratch.join(stored.id.to_string()).exists());

        let user = h.store.get_user(h.user.id).await.unwrap().unwrap();
        assert_eq!(user.generations_used, 1);
    }

    #[tokio::test]
    async fn upstream_failure_ends_failed_without_leaks() {
        let mut client = MockModelClient::new();
        client
            .expect_generate_json()
            .returning(|_| Err(AppError::UpstreamGeneration("unavailable".to_string())));
        let h = harness(client).await;

        let ticket = h
            .orchestrator
            .submit(&h.user, new_project(h.user.id))
            .await
            .unwrap();
        assert_eq!(ticket.task.await.unwrap(), ProjectStatus::Failed);

        let stored = h.store.get_project(ticket.project.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Failed);
        assert!(stored.archive_path.is_none());
        assert!(!h.output.join(archive_file_name(stored.id)).exists());
        assert!(!h.scratch.join(stored.id.to_string()).exists());

        let user = h.store.get_user(h.user.id).await.unwrap().unwrap();
        assert_eq!(user.generations_used, 1);
    }

    #[tokio::test]
    async fn traversal_in_generated_files_fails_run() {
        let mut client = MockModelClient::new();
        client.expect_generate_json().returning(|_| {
            let mut payload: serde_json::Value = serde_json::from_str(&spec_payload()).unwrap();
            payload["files"] = json!([{ "path": "../../escape.kt", "content": "x" }]);
            Ok(payload.to_string())
        });
        let h = harness(client).await;

        let ticket = h
            .orchestrator
            .submit(&h.user, new_project(h.user.id))
            .await
            .unwrap();
        assert_eq!(ticket.task.await.unwrap(), ProjectStatus::Failed);
        assert!(!h.scratch.join(ticket.project.id.to_string()).exists());
    }

    #[tokio::test]
    async fn quota_denial_creates_nothing() {
        let client = MockModelClient::new();
        let h = harness(client).await;
        h.store.update_plan(h.user.id, SubscriptionPlan::Starter).await.unwrap();
        let user = h.store.set_generations_used(h.user.id, 5).await.unwrap();

        let result = h.orchestrator.submit(&user, new_project(user.id)).await;
        assert!(matches!(result, Err(AppError::QuotaExceeded(_))));

        assert!(h.store.list_projects_by_user(user.id).await.unwrap().is_empty());
        let user = h.store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.generations_used, 5);
    }

    #[tokio::test]
    async fn project_deleted_mid_run_leaves_no_archive() {
        let mut client = MockModelClient::new();
        client.expect_generate_json().returning(|_| Ok(spec_payload()));
        let h = harness(client).await;

        let project = h.store.create_project(new_project(h.user.id)).await.unwrap();
        h.store.delete_project(project.id).await.unwrap();

        let status = h.orchestrator.process(project.clone()).await;
        assert_eq!(status, ProjectStatus::Failed);
        assert!(!h.output.join(archive_file_name(project.id)).exists());
    }

    #[tokio::test]
    async fn uncounted_generation_is_marked_failed() {
        let h = harness(MockModelClient::new()).await;
        // The ledger's user store does not know the user, so counting fails.
        let orchestrator = GenerationOrchestrator::new(
            h.store.clone(),
            QuotaLedger::new(Arc::new(MemoryStore::new())),
            Arc::new(SpecificationGenerator::new(Arc::new(MockModelClient::new()))),
            ProjectMaterializer::new(&h.scratch),
            &h.output,
        );

        let result = orchestrator.submit(&h.user, new_project(h.user.id)).await;
        assert!(matches!(result, Err(AppError::NotFound)));

        let projects = h.store.list_projects_by_user(h.user.id).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].status, ProjectStatus::Failed);
        assert!(projects[0].archive_path.is_none());
    }

    #[tokio::test]
    async fn payload_without_files_fails_cleanly() {
        let mut client = MockModelClient::new();
        client.expect_generate_json().returning(|_| {
            let mut payload: serde_json::Value = serde_json::from_str(&spec_payload()).unwrap();
            payload.as_object_mut().unwrap().remove("files");
            Ok(payload.to_string())
        });
        let h = harness(client).await;

        let ticket = h
            .orchestrator
            .submit(&h.user, new_project(h.user.id))
            .await
            .unwrap();
        assert_eq!(ticket.task.await.unwrap(), ProjectStatus::Failed);

        let stored = h.store.get_project(ticket.project.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Failed);
        assert!(stored.archive_path.is_none());
        assert!(!h.output.join(archive_file_name(stored.id)).exists());
        assert!(!h.scratch.join(stored.id.to_string()).exists());
    }

    #[tokio::test]
    async fn archive_failure_leaves_no_partial_archive() {
        let mut client = MockModelClient::new();
        client.expect_generate_json().returning(|_| Ok(spec_payload()));
        let h = harness(client).await;

        let project = h.store.create_project(new_project(h.user.id)).await.unwrap();
        let archive = h.output.join(archive_file_name(project.id));
        std::fs::create_dir_all(archive.join("occupied")).unwrap();

        let status = h.orchestrator.process(project.clone()).await;
        assert_eq!(status, ProjectStatus::Failed);

        let stored = h.store.get_project(project.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Failed);
        assert!(stored.archive_path.is_none());
        let entries: Vec<_> = std::fs::read_dir(&h.output)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries, vec![archive.clone()]);
        assert!(archive.is_dir());
        assert!(!h.scratch.join(project.id.to_string()).exists());
    }
}
