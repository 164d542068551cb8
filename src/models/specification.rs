use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};
use crate::models::FirebaseIntegration;

/// Project description produced by the generative model for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSpecification {
    pub app_name: String,
    pub package_name: String,
    pub main_activity: String,
    pub pages: Vec<GeneratedPage>,
    pub firebase_integration: FirebaseIntegration,
    pub dependencies: Vec<String>,
    pub files: Vec<GeneratedFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPage {
    pub name: String,
    pub description: String,
    pub composable_function: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

impl GeneratedSpecification {
    /// Checks the fields the materializer depends on beyond their JSON shape.
    pub fn validate(&self) -> Result<()> {
        if self.package_name.trim().is_empty() {
            return Err(AppError::MalformedSpecification(
                "packageName is empty".to_string(),
            ));
        }
        let valid_package = self.package_name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
        if !valid_package {
            return Err(AppError::MalformedSpecification(format!(
                "packageName '{}' is not a reverse-domain identifier",
                self.package_name
            )));
        }
        if self.main_activity.trim().is_empty() {
            return Err(AppError::MalformedSpecification(
                "mainActivity is empty".to_string(),
            ));
        }
        if !self.main_activity.split('.').all(is_java_identifier) {
            return Err(AppError::MalformedSpecification(format!(
                "mainActivity '{}' is not a class name",
                self.main_activity
            )));
        }
        if let Some(file) = self.files.iter().find(|f| f.path.trim().is_empty()) {
            return Err(AppError::MalformedSpecification(format!(
                "file entry with empty path ({} bytes of content)",
                file.content.len()
            )));
        }
        Ok(())
    }

    /// Source root segments derived from the package identifier.
    pub fn package_segments(&self) -> impl Iterator<Item = &str> {
        self.package_name.split('.').filter(|s| !s.is_empty())
    }
}

fn is_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}
