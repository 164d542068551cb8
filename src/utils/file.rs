use image::ImageFormat;
use std::path::Path;
use uuid::Uuid;

use crate::errors::{AppError, Result};

pub const FALLBACK_APP_NAME: &str = "GeneratedApp";
const MAX_SANITIZED_LEN: usize = 50;

/// Identifier-safe form of a user supplied name: ASCII alphanumerics only,
/// no leading digits, at most 50 characters, never empty.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .skip_while(|c| c.is_ascii_digit())
        .take(MAX_SANITIZED_LEN)
        .collect();

    if sanitized.is_empty() {
        FALLBACK_APP_NAME.to_string()
    } else {
        sanitized
    }
}

/// File name of the downloadable archive for a project.
pub fn archive_file_name(project_id: Uuid) -> String {
    format!("android-project-{}.zip", project_id)
}

pub fn validate_mime_type(mime_type: &str, allowed_types: &[String]) -> Result<()> {
    let essence = mime_type
        .parse::<mime::Mime>()
        .map(|m| m.essence_str().to_string())
        .map_err(|_| AppError::Validation(format!("Invalid content type: {}", mime_type)))?;

    if !allowed_types.iter().any(|allowed| allowed == &essence) {
        return Err(AppError::Validation(format!(
            "Icon type {} is not allowed; expected one of {}",
            essence,
            allowed_types.join(", ")
        )));
    }
    Ok(())
}

/// Validates an uploaded icon and returns the file extension to store it under.
pub fn validate_icon(
    data: &[u8],
    declared_type: Option<&str>,
    max_size: usize,
    allowed_types: &[String],
) -> Result<&'static str> {
    if data.is_empty() {
        return Err(AppError::Validation("Icon file is empty".to_string()));
    }
    if data.len() > max_size {
        return Err(AppError::Validation(format!(
            "Icon size {} bytes exceeds limit of {} bytes",
            data.len(),
            max_size
        )));
    }
    if let Some(declared) = declared_type {
        validate_mime_type(declared, allowed_types)?;
    }

    let (sniffed_mime, extension) = match image::guess_format(data) {
        Ok(ImageFormat::Png) => ("image/png", "png"),
        Ok(ImageFormat::Jpeg) => ("image/jpeg", "jpg"),
        Ok(ImageFormat::WebP) => ("image/webp", "webp"),
        _ => {
            return Err(AppError::Validation(
                "Icon must be a PNG, JPEG or WebP image".to_string(),
            ))
        }
    };
    validate_mime_type(sniffed_mime, allowed_types)?;

    Ok(extension)
}

pub async fn delete_file(file_path: &Path) -> Result<()> {
    match tokio::fs::remove_file(file_path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::Filesystem(format!(
            "Failed to delete {}: {}",
            file_path.display(),
            e
        ))),
    }
}
