use axum::Router;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::users::create_user,
        crate::handlers::users::current_user,
        crate::handlers::users::change_subscription,
        crate::handlers::generate::generate_app,
        crate::handlers::projects::list_projects,
        crate::handlers::projects::download_project,
        crate::handlers::projects::delete_project,
    ),
    components(
        schemas(
            crate::models::User,
            crate::models::NewUser,
            crate::models::SubscriptionPlan,
            crate::models::SubscriptionStatus,
            crate::models::SubscriptionRequest,
            crate::models::Project,
            crate::models::Page,
            crate::models::IconType,
            crate::models::FirebaseIntegration,
            crate::models::DatabaseIntegration,
            crate::models::DatabaseType,
            crate::models::DatabaseFeature,
            crate::models::ProjectStatus,
            crate::models::GenerationStep,
            crate::models::GenerationProgress,
            crate::models::GenerateAppPayload,
            crate::services::QuotaStatus,
            crate::handlers::users::CurrentUserResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "projects", description = "Android project generation and downloads"),
        (name = "users", description = "Registration and subscription plans"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "App Forge API",
        version = "0.1.0",
        description = "Generates buildable Android Studio projects from natural-language app descriptions"
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

pub fn create_docs_router() -> Router<AppState> {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
