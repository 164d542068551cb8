use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::path::Path as FsPath;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{Project, ProjectStatus, User},
    utils::file::{archive_file_name, delete_file},
};

/// Loads a project and checks that `user` owns it.
async fn owned_project(state: &AppState, user: &User, id: Uuid) -> Result<Project> {
    let project = state.projects.get_project(id).await?.ok_or(AppError::NotFound)?;
    if project.user_id != user.id {
        tracing::warn!(project_id = %id, user_id = %user.id, "project access denied");
        return Err(AppError::Forbidden);
    }
    Ok(project)
}

/// List the caller's projects, newest first
#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "projects",
    responses(
        (status = 200, description = "Projects owned by the caller", body = [Project]),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Project>>> {
    let projects = state.projects.list_projects_by_user(user.id).await?;
    Ok(Json(projects))
}

/// Download a ready project archive
#[utoipa::path(
    get,
    path = "/api/projects/{id}/download",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project archive (application/zip)"),
        (status = 400, description = "Project not ready"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Project or archive not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_project(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let project = owned_project(&state, &user, id).await?;

    let archive_path = match (&project.status, &project.archive_path) {
        (ProjectStatus::Ready, Some(path)) => path.clone(),
        _ => {
            return Err(AppError::Validation(
                "Project not ready for download".to_string(),
            ))
        }
    };

    let file = match tokio::fs::File::open(&archive_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(project_id = %id, path = %archive_path, "archive missing on disk");
            return Err(AppError::NotFound);
        }
        Err(e) => {
            return Err(AppError::Filesystem(format!(
                "Failed to open {}: {}",
                archive_path, e
            )))
        }
    };
    let size = file
        .metadata()
        .await
        .map_err(|e| AppError::Filesystem(e.to_string()))?
        .len();

    state.metrics.record_download(size);
    tracing::info!(project_id = %id, size, "serving project archive");

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", archive_file_name(project.id)),
        ),
        (header::CONTENT_LENGTH, size.to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((headers, body).into_response())
}

/// Delete a project and its archive
#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project deleted"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let project = owned_project(&state, &user, id).await?;

    if let Some(archive_path) = &project.archive_path {
        delete_file(FsPath::new(archive_path)).await?;
    }
    if let Some(icon_path) = &project.icon_path {
        delete_file(FsPath::new(icon_path)).await?;
    }
    state.projects.delete_project(id).await?;

    tracing::info!(project_id = %id, user_id = %user.id, "project deleted");
    Ok(Json(json!({ "message": "Project deleted successfully" })))
}
