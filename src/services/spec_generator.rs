use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    errors::{AppError, Result},
    models::{FirebaseIntegration, GeneratedSpecification, Page},
    services::model_client::{string_properties, ModelClient, ModelRequest},
};

const ARCHITECTURE_INSTRUCTIONS: &str = "You are an expert Android developer who generates complete Android Studio projects using Kotlin and Jetpack Compose.

Generate a complete Android project structure based on the user's requirements. The project should:
1. Use modern Android architecture (MVVM, Repository pattern)
2. Implement Jetpack Compose for UI
3. Follow Material Design 3 guidelines
4. Include proper navigation between screens
5. Have clean, production-ready code
6. Include appropriate dependencies in build.gradle files";

/// Asks the generative model for a project specification and validates it.
pub struct SpecificationGenerator {
    client: Arc<dyn ModelClient>,
}

impl SpecificationGenerator {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// Produces a validated specification. The model's echoed app name and
    /// integration flags are replaced with the caller's values.
    pub async fn generate(
        &self,
        app_name: &str,
        pages: &[Page],
        prompt: &str,
        flags: FirebaseIntegration,
    ) -> Result<GeneratedSpecification> {
        let request = ModelRequest {
            system_instruction: system_instruction(flags),
            prompt: user_prompt(app_name, pages, prompt, flags),
            response_schema: response_schema(),
        };

        let raw = self.client.generate_json(request).await?;
        let mut spec = parse_specification(&raw)?;

        spec.app_name = app_name.to_string();
        spec.firebase_integration = flags;

        tracing::info!(
            app_name,
            package = %spec.package_name,
            files = spec.files.len(),
            "generated project specification"
        );
        Ok(spec)
    }
}

pub fn parse_specification(raw: &str) -> Result<GeneratedSpecification> {
    if raw.trim().is_empty() {
        return Err(AppError::UpstreamGeneration(
            "Empty response from model".to_string(),
        ));
    }

    let spec: GeneratedSpecification = serde_json::from_str(raw)
        .map_err(|e| AppError::MalformedSpecification(e.to_string()))?;
    spec.validate()?;
    Ok(spec)
}

fn system_instruction(flags: FirebaseIntegration) -> String {
    let mut instruction = String::from(ARCHITECTURE_INSTRUCTIONS);
    instruction.push('\n');
    for (enabled, line) in [
        (flags.auth, "- Include Firebase Authentication setup"),
        (flags.firestore, "- Include Firestore database integration"),
        (flags.storage, "- Include Firebase Storage integration"),
        (flags.cloud_functions, "- Include Cloud Functions client calls"),
    ] {
        if enabled {
            instruction.push('\n');
            instruction.push_str(line);
        }
    }
    instruction.push_str(
        "\n\nRespond with a single JSON document containing appName, packageName \
         (com.example.appname format), mainActivity, pages (name, description, \
         composableFunction), firebaseIntegration, dependencies and files \
         (path relative to the project root, complete content).",
    );
    instruction
}

fn user_prompt(app_name: &str, pages: &[Page], prompt: &str, flags: FirebaseIntegration) -> String {
    let yes_no = |enabled: bool| if enabled { "Yes" } else { "No" };
    let page_lines = pages
        .iter()
        .map(|p| format!("- {}: {}", p.title, p.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Create an Android app with the following specifications:\n\n\
         App Name: {app_name}\n\
         Pages:\n{page_lines}\n\
         Additional Requirements: {prompt}\n\n\
         Firebase Integration:\n\
         - Authentication: {}\n\
         - Firestore Database: {}\n\
         - Storage: {}\n\
         - Cloud Functions: {}\n\n\
         Generate a complete, production-ready Android Studio project with all necessary files.",
        yes_no(flags.auth),
        yes_no(flags.firestore),
        yes_no(flags.storage),
        yes_no(flags.cloud_functions),
    )
}

fn response_schema() -> Value {
    let flag = json!({ "type": "boolean" });
    json!({
        "type": "object",
        "properties": {
            "appName": { "type": "string" },
            "packageName": { "type": "string" },
            "mainActivity": { "type": "string" },
            "pages": {
                "type": "array",
                "items": string_properties(&["name", "description", "composableFunction"]),
            },
            "firebaseIntegration": {
                "type": "object",
                "properties": {
                    "auth": flag,
                    "firestore": flag,
                    "storage": flag,
                    "cloudFunctions": flag,
                },
                "required": ["auth", "firestore", "storage"],
            },
            "dependencies": { "type": "array", "items": { "type": "string" } },
            "files": {
                "type": "array",
                "items": string_properties(&["path", "content"]),
            },
        },
        "required": [
            "appName",
            "packageName",
            "mainActivity",
            "pages",
            "firebaseIntegration",
            "dependencies",
            "files"
        ],
    })
}
