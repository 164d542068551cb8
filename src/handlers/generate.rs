use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    response::Json,
};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    handlers::{AppJson, AppState},
    middleware::AuthenticatedUser,
    models::{GenerateAppPayload, Project},
    utils::file::{delete_file, validate_icon},
};

/// Icon file attached to a multipart generation request.
#[derive(Debug)]
pub struct IconUpload {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// The two accepted body shapes of `POST /api/generate-app`.
#[derive(Debug)]
pub enum GenerateAppForm {
    Json(GenerateAppPayload),
    Multipart {
        payload: GenerateAppPayload,
        icon: Option<IconUpload>,
    },
}

impl GenerateAppForm {
    pub fn into_parts(self) -> (GenerateAppPayload, Option<IconUpload>) {
        match self {
            GenerateAppForm::Json(payload) => (payload, None),
            GenerateAppForm::Multipart { payload, icon } => (payload, icon),
        }
    }
}

#[async_trait]
impl FromRequest<AppState> for GenerateAppForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            let (payload, icon) = read_multipart(multipart).await?;
            Ok(GenerateAppForm::Multipart { payload, icon })
        } else {
            let AppJson(payload) = AppJson::<GenerateAppPayload>::from_request(req, state).await?;
            Ok(GenerateAppForm::Json(payload))
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<(GenerateAppPayload, Option<IconUpload>)> {
    let mut payload = GenerateAppPayload::default();
    let mut icon = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::Validation(format!("Failed to parse multipart data: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "icon" {
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read icon: {}", e)))?;
            icon = Some(IconUpload { data, content_type });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read field {}: {}", name, e)))?;

        match name.as_str() {
            "appName" => payload.app_name = value,
            "description" => payload.description = Some(value),
            "prompt" => payload.prompt = value,
            "pages" => payload.pages = parse_field(&name, &value)?,
            "iconType" => payload.icon_type = value.parse()?,
            "firebaseIntegration" => payload.firebase_integration = parse_field(&name, &value)?,
            "databaseIntegration" => payload.database_integration = parse_field(&name, &value)?,
            "includeProductImages" => payload.include_product_images = parse_field(&name, &value)?,
            "productImageCount" => payload.product_image_count = parse_field(&name, &value)?,
            _ => tracing::debug!(field = %name, "ignoring unknown form field"),
        }
    }

    Ok((payload, icon))
}

/// Structured multipart fields arrive as JSON text.
fn parse_field<T: DeserializeOwned>(name: &str, value: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| AppError::Validation(format!("Invalid value for {}: {}", name, e)))
}

/// Start generating an Android project
#[utoipa::path(
    post,
    path = "/api/generate-app",
    tag = "projects",
    request_body = GenerateAppPayload,
    responses(
        (status = 200, description = "Generation started", body = Project),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Generation limit reached")
    ),
    security(("bearer_auth" = []))
)]
pub async fn generate_app(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    form: GenerateAppForm,
) -> Result<Json<Project>> {
    let (payload, icon) = form.into_parts();

    let icon_file = match icon {
        Some(upload) => {
            let extension = validate_icon(
                &upload.data,
                upload.content_type.as_deref(),
                state.config.max_icon_size,
                &state.config.allowed_icon_mime_types,
            )?;
            Some((format!("icons/{}.{}", Uuid::new_v4(), extension), upload.data))
        }
        None => None,
    };

    let icon_path = icon_file
        .as_ref()
        .map(|(relative, _)| state.icons.full_path(relative).to_string_lossy().into_owned());
    let new_project = payload.into_new_project(user.id, icon_path)?;

    let mut stored_icon: Option<PathBuf> = None;
    if let Some((relative, data)) = &icon_file {
        stored_icon = Some(state.icons.store_bytes(relative, data).await?);
    }

    match state.orchestrator.submit(&user, new_project).await {
        Ok(ticket) => Ok(Json(ticket.project)),
        Err(e) => {
            if let Some(path) = stored_icon {
                if let Err(cleanup) = delete_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove icon");
                }
            }
            Err(e)
        }
    }
}
