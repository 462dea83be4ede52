//! Filesystem-backed collaborators used when no IDE is attached.

use crate::codegen::fs_utils;
use crate::codegen::utils::{paths_equal_ignore_case, PRIMITIVE_TYPES};
use crate::error::{AtomicError, Result};
use crate::services::{
    FileWriter, NamespaceValidation, ProjectContext, ProjectHandle, ProjectLocator,
    TypeCompletion, TypeKind, TypeOracle, TypeValidation, UsageFinder, UsageLocation,
};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const PROJECT_EXTENSION: &str = "csproj";
const SOURCE_EXTENSION: &str = "cs";

/// Directories never scanned for usages
const IGNORED_DIRS: &[&str] = &[".git", "bin", "obj", "Library", "Temp", "Logs"];

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileWriter;

#[async_trait]
impl FileWriter for LocalFileWriter {
    async fn read_file(&self, path: &Path) -> Result<Option<String>> {
        Ok(fs_utils::read_if_exists(path).await?)
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        fs_utils::write_file(path, content)
            .await
            .map_err(|source| AtomicError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn delete_file(&self, path: &Path) -> Result<bool> {
        Ok(fs_utils::remove_if_exists(path).await?)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Finds the nearest directory holding a `.csproj`, walking up from the hint
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProjectLocator;

#[async_trait]
impl ProjectLocator for LocalProjectLocator {
    async fn resolve_project(
        &self,
        directory_hint: &Path,
        name_hint: Option<&str>,
    ) -> Result<Option<ProjectHandle>> {
        let mut nearest: Option<ProjectHandle> = None;

        for dir in directory_hint.ancestors() {
            for (name, root) in project_files(dir).await? {
                let named = name_hint.is_some_and(|hint| hint.eq_ignore_ascii_case(&name));
                if named || nearest.is_none() {
                    let writable = tokio::fs::metadata(&root)
                        .await
                        .map(|m| !m.permissions().readonly())
                        .unwrap_or(false);
                    let handle = ProjectHandle { name, root, writable };
                    if named || name_hint.is_none() {
                        debug!("Resolved project '{}' at {}", handle.name, handle.root.display());
                        return Ok(Some(handle));
                    }
                    nearest = Some(handle);
                }
            }
        }

        Ok(nearest)
    }
}

/// `(project name, directory)` for every `.csproj` directly inside `dir`
async fn project_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Ok(Vec::new()),
    };

    let mut projects = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(PROJECT_EXTENSION) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                projects.push((stem.to_string(), dir.to_path_buf()));
            }
        }
    }
    projects.sort();
    Ok(projects)
}

/// Accepts every type and namespace. Used when no language service is
/// available, so validation reduces to the syntactic checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTypeOracle;

#[async_trait]
impl TypeOracle for OfflineTypeOracle {
    async fn validate_type(
        &self,
        name: &str,
        _imports: &[String],
        _project: &ProjectContext,
    ) -> Result<TypeValidation> {
        Ok(TypeValidation::valid(name))
    }

    async fn complete_types(
        &self,
        prefix: &str,
        _imports: &[String],
        _project: &ProjectContext,
        _namespace_filter: Option<&str>,
    ) -> Result<Vec<TypeCompletion>> {
        Ok(PRIMITIVE_TYPES
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| TypeCompletion {
                name: name.to_string(),
                full_name: name.to_string(),
                namespace: "System".to_string(),
                is_generic: false,
                kind: match *name {
                    "string" | "object" | "dynamic" => TypeKind::Class,
                    _ => TypeKind::Struct,
                },
            })
            .collect())
    }

    async fn validate_namespace(
        &self,
        _name: &str,
        _project: &ProjectContext,
    ) -> Result<NamespaceValidation> {
        Ok(NamespaceValidation {
            is_valid: true,
            has_direct_types: true,
        })
    }
}

/// Scans `.cs` files under the project root for calls by method name.
/// Matching is textual, so it cannot tell overloads from other classes apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextUsageFinder;

#[async_trait]
impl UsageFinder for TextUsageFinder {
    async fn find_usages(
        &self,
        method_names: &[String],
        generated_file: &Path,
        project: &ProjectContext,
    ) -> Result<Vec<UsageLocation>> {
        if method_names.is_empty() {
            return Ok(Vec::new());
        }

        let root = match (&project.root, generated_file.parent()) {
            (Some(root), _) => root.clone(),
            (None, Some(parent)) => parent.to_path_buf(),
            (None, None) => return Ok(Vec::new()),
        };

        let alternation = method_names
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let call = Regex::new(&format!(r"\b({})\s*\(", alternation))
            .map_err(|e| AtomicError::generation(format!("Invalid usage pattern: {}", e)))?;

        let mut usages = Vec::new();
        for file in source_files(&root).await? {
            if paths_equal_ignore_case(&file, generated_file) {
                continue;
            }
            let Some(text) = fs_utils::read_if_exists(&file).await? else {
                continue;
            };
            for (index, line) in text.lines().enumerate() {
                for capture in call.captures_iter(line) {
                    let Some(name) = capture.get(1) else { continue };
                    usages.push(UsageLocation {
                        file_path: file.clone(),
                        line: (index + 1) as u32,
                        column: (line[..name.start()].chars().count() + 1) as u32,
                        method_name: name.as_str().to_string(),
                        line_text: line.to_string(),
                    });
                }
            }
        }

        trace!("Found {} usage(s) under {}", usages.len(), root.display());
        Ok(usages)
    }
}

async fn source_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                let ignored = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| IGNORED_DIRS.contains(&n));
                if !ignored {
                    pending.push(path);
                }
            } else if path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
