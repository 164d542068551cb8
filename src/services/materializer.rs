use std::fs;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    models::{FirebaseIntegration, GeneratedSpecification},
    utils::file::sanitize_name,
};

const RESOURCE_DIRECTORIES: &[&str] = &[
    "app/src/main/res/layout",
    "app/src/main/res/values",
    "app/src/main/res/drawable",
    "app/src/main/res/mipmap-hdpi",
    "app/src/main/res/mipmap-mdpi",
    "app/src/main/res/mipmap-xhdpi",
    "app/src/main/res/mipmap-xxhdpi",
    "app/src/main/res/mipmap-xxxhdpi",
    "gradle/wrapper",
];

const GRADLE_VERSION: &str = "8.2";
const FIREBASE_BOM: &str = "com.google.firebase:firebase-bom:32.7.0";

/// A file synthesized by the materializer rather than the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardFile {
    pub path: &'static str,
    pub content: String,
}

/// Writes a generated specification out as an Android project tree inside a
/// per-project scratch directory.
#[derive(Debug, Clone)]
pub struct ProjectMaterializer {
    scratch_root: PathBuf,
}

impl ProjectMaterializer {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    /// Scratch area owned by one project run.
    pub fn scratch_dir(&self, project_id: Uuid) -> PathBuf {
        self.scratch_root.join(project_id.to_string())
    }

    /// Materializes `spec` and returns the project root directory.
    pub fn materialize(&self, project_id: Uuid, spec: &GeneratedSpecification) -> Result<PathBuf> {
        let project_dir = self
            .scratch_dir(project_id)
            .join(sanitize_name(&spec.app_name));

        for dir in scaffold_directories(spec)? {
            create_dir(&project_dir.join(dir))?;
        }

        for file in &spec.files {
            let relative = resolve_relative(&file.path)?;
            write_file(&project_dir.join(relative), &file.content)?;
        }

        for file in standard_files(spec) {
            write_file(&project_dir.join(file.path), &file.content)?;
        }

        tracing::debug!(
            project_id = %project_id,
            path = %project_dir.display(),
            generated_files = spec.files.len(),
            "materialized project"
        );
        Ok(project_dir)
    }

    /// Removes the scratch area for `project_id` if it exists.
    pub fn cleanup(&self, project_id: Uuid) -> Result<()> {
        let dir = self.scratch_dir(project_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Filesystem(format!(
                "Failed to remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }
}

/// Empty directories of the standard project layout, relative to the root.
pub fn scaffold_directories(spec: &GeneratedSpecification) -> Result<Vec<PathBuf>> {
    let mut source_root = PathBuf::from("app/src/main/java");
    for segment in spec.package_segments() {
        if segment.contains(['/', '\\']) {
            return Err(AppError::Filesystem(format!(
                "Invalid path segment '{}' in package name",
                segment
            )));
        }
        source_root.push(segment);
    }

    let mut dirs = vec![source_root];
    dirs.extend(RESOURCE_DIRECTORIES.iter().map(PathBuf::from));
    Ok(dirs)
}

/// Rejects absolute paths and parent traversal in model-supplied paths.
pub fn resolve_relative(path: &str) -> Result<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(AppError::Filesystem(format!(
                    "Invalid path segment in '{}'",
                    path
                )))
            }
        }
    }

    if resolved.as_os_str().is_empty() {
        return Err(AppError::Filesystem(format!("Invalid file path '{}'", path)));
    }
    Ok(resolved)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        AppError::Filesystem(format!("Failed to create {}: {}", path.display(), e))
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, content)
        .map_err(|e| AppError::Filesystem(format!("Failed to write {}: {}", path.display(), e)))
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("\\'"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// One pinned dependency line per enabled integration.
pub fn firebase_dependencies(flags: FirebaseIntegration) -> Vec<&'static str> {
    [
        (flags.auth, "implementation 'com.google.firebase:firebase-auth-ktx:22.3.0'"),
        (flags.firestore, "implementation 'com.google.firebase:firebase-firestore-ktx:24.10.0'"),
        (flags.storage, "implementation 'com.google.firebase:firebase-storage-ktx:20.3.0'"),
        (flags.cloud_functions, "implementation 'com.google.firebase:firebase-functions-ktx:20.4.0'"),
    ]
    .into_iter()
    .filter_map(|(enabled, line)| enabled.then_some(line))
    .collect()
}

/// Build, manifest and resource files every generated project carries.
pub fn standard_files(spec: &GeneratedSpecification) -> Vec<StandardFile> {
    let theme_name = sanitize_name(&spec.app_name);
    let flags = spec.firebase_integration;

    vec![
        StandardFile {
            path: "build.gradle",
            content: project_build_gradle(flags),
        },
        StandardFile {
            path: "app/build.gradle",
            content: app_build_gradle(spec),
        },
        StandardFile {
            path: "app/src/main/AndroidManifest.xml",
            content: android_manifest(spec, &theme_name),
        },
        StandardFile {
            path: "app/src/main/res/values/strings.xml",
            content: format!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n    <string name=\"app_name\">{}</string>\n</resources>\n",
                escape_xml(&spec.app_name)
            ),
        },
        StandardFile {
            path: "app/src/main/res/values/colors.xml",
            content: COLORS_XML.to_string(),
        },
        StandardFile {
            path: "app/src/main/res/values/themes.xml",
            content: format!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n    <style name=\"Theme.{}\" parent=\"android:Theme.Material.Light.NoActionBar\" />\n</resources>\n",
                theme_name
            ),
        },
        StandardFile {
            path: "gradle.properties",
            content: GRADLE_PROPERTIES.to_string(),
        },
        StandardFile {
            path: "settings.gradle",
            content: settings_gradle(&spec.app_name),
        },
        StandardFile {
            path: "gradle/wrapper/gradle-wrapper.properties",
            content: format!(
                "distributionBase=GRADLE_USER_HOME\ndistributionPath=wrapper/dists\ndistributionUrl=https\\://services.gradle.org/distributions/gradle-{}-bin.zip\nzipStoreBase=GRADLE_USER_HOME\nzipStorePath=wrapper/dists\n",
                GRADLE_VERSION
            ),
        },
        StandardFile {
            path: "app/proguard-rules.pro",
            content: String::new(),
        },
        StandardFile {
            path: "README.md",
            content: readme(spec),
        },
    ]
}

fn project_build_gradle(flags: FirebaseIntegration) -> String {
    let mut plugins = vec![
        "    id 'com.android.application' version '8.2.0' apply false",
        "    id 'org.jetbrains.kotlin.android' version '1.9.20' apply false",
    ];
    if flags.any_enabled() {
        plugins.push("    id 'com.google.gms.google-services' version '4.4.0' apply false");
    }

    format!(
        "// Top-level build file where you can add configuration options common to all sub-projects/modules.\nplugins {{\n{}\n}}\n",
        plugins.join("\n")
    )
}

fn app_build_gradle(spec: &GeneratedSpecification) -> String {
    let flags = spec.firebase_integration;
    let mut plugins = vec![
        "    id 'com.android.application'",
        "    id 'org.jetbrains.kotlin.android'",
    ];
    if flags.any_enabled() {
        plugins.push("    id 'com.google.gms.google-services'");
    }

    let mut dependencies: Vec<String> = [
        "implementation 'androidx.core:core-ktx:1.12.0'",
        "implementation 'androidx.lifecycle:lifecycle-runtime-ktx:2.7.0'",
        "implementation 'androidx.activity:activity-compose:1.8.2'",
        "implementation platform('androidx.compose:compose-bom:2023.10.01')",
        "implementation 'androidx.compose.ui:ui'",
        "implementation 'androidx.compose.ui:ui-graphics'",
        "implementation 'androidx.compose.ui:ui-tooling-preview'",
        "implementation 'androidx.compose.material3:material3'",
        "implementation 'androidx.navigation:navigation-compose:2.7.6'",
        "implementation 'androidx.lifecycle:lifecycle-viewmodel-compose:2.7.0'",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect();

    let firebase = firebase_dependencies(flags);
    if !firebase.is_empty() {
        dependencies.push(format!("implementation platform('{}')", FIREBASE_BOM));
        dependencies.extend(firebase.iter().map(|line| line.to_string()));
    }

    dependencies.extend(
        [
            "testImplementation 'junit:junit:4.13.2'",
            "androidTestImplementation 'androidx.test.ext:junit:1.1.5'",
            "androidTestImplementation 'androidx.test.espresso:espresso-core:3.5.1'",
            "androidTestImplementation platform('androidx.compose:compose-bom:2023.10.01')",
            "androidTestImplementation 'androidx.compose.ui:ui-test-junit4'",
            "debugImplementation 'androidx.compose.ui:ui-tooling'",
            "debugImplementation 'androidx.compose.ui:ui-test-manifest'",
        ]
        .iter()
        .map(|line| line.to_string()),
    );

    let package = &spec.package_name;
    format!(
        r#"plugins {{
{plugins}
}}

android {{
    namespace '{package}'
    compileSdk 34

    defaultConfig {{
        applicationId "{package}"
        minSdk 24
        targetSdk 34
        versionCode 1
        versionName "1.0"

        testInstrumentationRunner "androidx.test.runner.AndroidJUnitRunner"
        vectorDrawables {{
            useSupportLibrary true
        }}
    }}

    buildTypes {{
        release {{
            minifyEnabled false
            proguardFiles getDefaultProguardFile('proguard-android-optimize.txt'), 'proguard-rules.pro'
        }}
    }}
    compileOptions {{
        sourceCompatibility JavaVersion.VERSION_1_8
        targetCompatibility JavaVersion.VERSION_1_8
    }}
    kotlinOptions {{
        jvmTarget = '1.8'
    }}
    buildFeatures {{
        compose true
    }}
    composeOptions {{
        kotlinCompilerExtensionVersion '1.5.5'
    }}
    packaging {{
        resources {{
            excludes += '/META-INF/{{AL2.0,LGPL2.1}}'
        }}
    }}
}}

dependencies {{
{dependencies}
}}
"#,
        plugins = plugins.join("\n"),
        package = package,
        dependencies = dependencies
            .iter()
            .map(|line| format!("    {}", line))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn android_manifest(spec: &GeneratedSpecification, theme_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android">

    <uses-permission android:name="android.permission.INTERNET" />

    <application
        android:allowBackup="true"
        android:label="@string/app_name"
        android:supportsRtl="true"
        android:theme="@style/Theme.{theme}">
        <activity
            android:name=".{activity}"
            android:exported="true"
            android:label="@string/app_name"
            android:theme="@style/Theme.{theme}">
            <intent-filter>
                <action android:name="android.intent.action.MAIN" />
                <category android:name="android.intent.category.LAUNCHER" />
            </intent-filter>
        </activity>
    </application>
</manifest>
"#,
        theme = theme_name,
        activity = spec.main_activity,
    )
}

fn settings_gradle(app_name: &str) -> String {
    format!(
        r#"pluginManagement {{
    repositories {{
        google()
        mavenCentral()
        gradlePluginPortal()
    }}
}}
dependencyResolutionManagement {{
    repositoriesMode.set(RepositoriesMode.FAIL_ON_PROJECT_REPOS)
    repositories {{
        google()
        mavenCentral()
    }}
}}

rootProject.name = "{}"
include ':app'
"#,
        app_name.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

fn readme(spec: &GeneratedSpecification) -> String {
    let flags = spec.firebase_integration;
    let pages = spec
        .pages
        .iter()
        .map(|page| format!("- {}: {}", page.name, page.description))
        .collect::<Vec<_>>()
        .join("\n");

    let integrations: Vec<&str> = [
        (flags.auth, "- Authentication enabled"),
        (flags.firestore, "- Firestore database enabled"),
        (flags.storage, "- Firebase Storage enabled"),
        (flags.cloud_functions, "- Cloud Functions enabled"),
    ]
    .into_iter()
    .filter_map(|(enabled, line)| enabled.then_some(line))
    .collect();
    let integrations = if integrations.is_empty() {
        "No Firebase services enabled.".to_string()
    } else {
        integrations.join("\n")
    };

    let mut setup = vec![
        "Open this project in Android Studio",
        "Sync the project with Gradle files",
    ];
    if flags.any_enabled() {
        setup.push("Add your google-services.json file to the app directory");
    }
    setup.push("Build and run the app");
    let setup = setup
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# {name}\n\n## Pages\n\n{pages}\n\n## Firebase Integration\n\n{integrations}\n\n## Setup\n\n{setup}\n\n## Architecture\n\n- Kotlin\n- Jetpack Compose for UI\n- MVVM architecture pattern\n- Material Design 3\n",
        name = spec.app_name,
    )
}

const COLORS_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <color name="purple_200">#FFBB86FC</color>
    <color name="purple_500">#FF6200EE</color>
    <color name="purple_700">#FF3700B3</color>
    <color name="teal_200">#FF03DAC5</color>
    <color name="teal_700">#FF018786</color>
    <color name="black">#FF000000</color>
    <color name="white">#FFFFFFFF</color>
</resources>
"#;

const GRADLE_PROPERTIES: &str = "org.gradle.jvmargs=-Xmx2048m -Dfile.encoding=UTF-8
android.useAndroidX=true
android.nonTransitiveRClass=true
";
