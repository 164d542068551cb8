use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::errors::{AppError, Result};

/// Packs a directory tree into a deflate-compressed zip archive.
#[derive(Debug, Clone, Copy)]
pub struct Archiver {
    compression_level: i32,
}

impl Default for Archiver {
    fn default() -> Self {
        Self {
            compression_level: 9,
        }
    }
}

impl Archiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archives everything under `source` into `dest`, with entry names
    /// relative to `source`. Returns the archive size in bytes.
    pub async fn archive(&self, source: &Path, dest: &Path) -> Result<u64> {
        let source = source.to_path_buf();
        let dest = dest.to_path_buf();
        let level = self.compression_level;

        tokio::task::spawn_blocking(move || write_archive(&source, &dest, level))
            .await
            .map_err(|e| AppError::Archive(format!("Archive task failed: {}", e)))?
    }
}

fn write_archive(source: &Path, dest: &Path, level: i32) -> Result<u64> {
    if !source.is_dir() {
        return Err(AppError::Archive(format!(
            "Source directory {} does not exist",
            source.display()
        )));
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(archive_error)?;
    }

    // Entries go to a sibling file that only takes the final name once the
    // archive is complete.
    let partial = partial_path(dest);
    let written = write_entries(source, &partial, level)
        .and_then(|()| std::fs::rename(&partial, dest).map_err(archive_error));
    if let Err(e) = written {
        if let Err(cleanup) = std::fs::remove_file(&partial) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %partial.display(), error = %cleanup, "failed to remove partial archive");
            }
        }
        return Err(e);
    }

    let size = std::fs::metadata(dest).map_err(archive_error)?.len();
    tracing::debug!(path = %dest.display(), size, "archive written");
    Ok(size)
}

fn write_entries(source: &Path, target: &Path, level: i32) -> Result<()> {
    let file = File::create(target).map_err(archive_error)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level));

    for entry in WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|e| AppError::Archive(e.to_string()))?;
        let name = entry_name(source, entry.path())?;

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)
                .map_err(|e| AppError::Archive(e.to_string()))?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)
                .map_err(|e| AppError::Archive(e.to_string()))?;
            let mut input = File::open(entry.path()).map_err(archive_error)?;
            io::copy(&mut input, &mut zip).map_err(archive_error)?;
        }
    }

    let mut writer = zip.finish().map_err(|e| AppError::Archive(e.to_string()))?;
    io::Write::flush(&mut writer).map_err(archive_error)?;
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Relative path joined with forward slashes regardless of platform.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative: PathBuf = path
        .strip_prefix(root)
        .map_err(|e| AppError::Archive(e.to_string()))?
        .to_path_buf();

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

fn archive_error(e: io::Error) -> AppError {
    AppError::Archive(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::models::{FirebaseIntegration, GeneratedFile, GeneratedPage, GeneratedSpecification};
    use crate::services::materializer::{scaffold_directories, standard_files, ProjectMaterializer};
    use std::io::Read;
    use tempfile::tempdir;
    use uuid::Uuid;
    use zip::ZipArchive;

    /// Adds `path` and every directory above it, directories with a trailing slash.
    fn insert_with_ancestors(names: &mut BTreeSet<String>, path: &Path, is_dir: bool) {
        let joined = |p: &Path| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        };
        names.insert(if is_dir {
            format!("{}/", joined(path))
        } else {
            joined(path)
        });
        for ancestor in path.ancestors().skip(1) {
            if !ancestor.as_os_str().is_empty() {
                names.insert(format!("{}/", joined(ancestor)));
            }
        }
    }

    #[tokio::test]
    async fn test_archive_preserves_relative_entries() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("Notes");
        std::fs::create_dir_all(source.join("app/src/main/res/drawable")).unwrap();
        std::fs::write(source.join("settings.gradle"), "include ':app'\n").unwrap();
        std::fs::write(source.join("app/build.gradle"), "plugins {}\n").unwrap();

        let dest = temp.path().join("out/notes.zip");
        let size = Archiver::new().archive(&source, &dest).await.unwrap();
        assert_eq!(size, std::fs::metadata(&dest).unwrap().len());

        let mut archive = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let names: BTreeSet<String> = archive.file_names().map(str::to_string).collect();
        assert!(names.contains("settings.gradle"));
        assert!(names.contains("app/build.gradle"));
        assert!(names.contains("app/src/main/res/drawable/"));
        assert!(names.iter().all(|n| !n.starts_with("Notes")));

        let mut content = String::new();
        archive
            .by_name("settings.gradle")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "include ':app'\n");
    }

    #[tokio::test]
    async fn test_materialized_project_entries_are_exact() {
        let temp = tempdir().unwrap();
        let spec = GeneratedSpecification {
            app_name: "My App!".to_string(),
            package_name: "com.example.myapp".to_string(),
            main_activity: "MainActivity".to_string(),
            pages: vec![GeneratedPage {
                name: "Home".to_string(),
                description: "main screen".to_string(),
                composable_function: "HomeScreen".to_string(),
            }],
            firebase_integration: FirebaseIntegration::default(),
            dependencies: Vec::new(),
            files: vec![
                GeneratedFile {
                    path: "app/src/main/java/com/example/myapp/MainActivity.kt".to_string(),
                    content: "package com.example.myapp\n".to_string(),
                },
                GeneratedFile {
                    path: "app/src/main/java/com/example/myapp/ui/HomeScreen.kt".to_string(),
                    content: "package com.example.myapp.ui\n".to_string(),
                },
            ],
        };

        let root = ProjectMaterializer::new(temp.path().join("scratch"))
            .materialize(Uuid::new_v4(), &spec)
            .unwrap();
        let dest = temp.path().join("project.zip");
        Archiver::new().archive(&root, &dest).await.unwrap();

        let mut expected = BTreeSet::new();
        for dir in scaffold_directories(&spec).unwrap() {
            insert_with_ancestors(&mut expected, &dir, true);
        }
        for file in &spec.files {
            insert_with_ancestors(&mut expected, Path::new(&file.path), false);
        }
        for file in standard_files(&spec) {
            insert_with_ancestors(&mut expected, Path::new(file.path), false);
        }

        let archive = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let names: BTreeSet<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names, expected);
        assert!(!names.contains("MyApp/"));
    }

    #[tokio::test]
    async fn test_failed_archive_leaves_no_file_behind() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("Notes");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("settings.gradle"), "include ':app'\n").unwrap();

        // A non-empty directory at the destination cannot be replaced by the
        // finished archive.
        let out = temp.path().join("out");
        let dest = out.join("notes.zip");
        std::fs::create_dir_all(dest.join("occupied")).unwrap();

        let result = Archiver::new().archive(&source, &dest).await;
        assert!(matches!(result, Err(AppError::Archive(_))));

        let leftovers: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("notes.zip")]);
        assert!(dest.is_dir());
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let temp = tempdir().unwrap();
        let result = Archiver::new()
            .archive(&temp.path().join("absent"), &temp.path().join("x.zip"))
            .await;
        assert!(matches!(result, Err(AppError::Archive(_))));
    }
}
