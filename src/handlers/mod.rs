use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::{
    auth::{IdentityVerifier, TokenIdentityVerifier},
    config::Config,
    database::{ProjectStore, UserStore},
    errors::{AppError, Result},
    services::{
        GenerationOrchestrator, MetricsService, ModelClient, ProjectMaterializer, QuotaLedger,
        SpecificationGenerator,
    },
    storage::LocalStorage,
};

pub mod docs;
pub mod generate;
pub mod health;
pub mod metrics;
pub mod projects;
pub mod users;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub quota: QuotaLedger,
    pub orchestrator: GenerationOrchestrator,
    pub identity: Arc<dyn IdentityVerifier>,
    pub icons: LocalStorage,
    pub metrics: MetricsService,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Wires the pipeline services over the given stores and model client,
    /// creating the output, scratch and upload directories.
    pub fn new(
        config: Config,
        users: Arc<dyn UserStore>,
        projects: Arc<dyn ProjectStore>,
        model_client: Arc<dyn ModelClient>,
    ) -> Result<Self> {
        for dir in [&config.output_dir, &config.scratch_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                AppError::Filesystem(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        let icons = LocalStorage::new(&config.upload_dir)?;

        let quota = QuotaLedger::new(users.clone());
        let orchestrator = GenerationOrchestrator::new(
            projects.clone(),
            quota.clone(),
            Arc::new(SpecificationGenerator::new(model_client)),
            ProjectMaterializer::new(&config.scratch_dir),
            &config.output_dir,
        );

        Ok(Self {
            config: Arc::new(config),
            users,
            projects,
            quota,
            orchestrator,
            identity: Arc::new(TokenIdentityVerifier),
            icons,
            metrics: MetricsService::new(),
            metrics_handle: None,
        })
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityVerifier>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// JSON body extractor whose rejections render as validation errors.
#[derive(Debug)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(AppJson(value))
    }
}
