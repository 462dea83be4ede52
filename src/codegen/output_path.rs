//! Target path computation for generated files.
//!
//! Resolution is pure: the only filesystem knowledge it takes is the
//! optional project root and content root the caller already looked up.

use crate::codegen::csharp_codegen::GENERATED_EXTENSION;
use crate::error::{AtomicError, Result};
use std::path::{Path, PathBuf};

/// Default content-root marker directory (Unity's `Assets`)
pub const DEFAULT_CONTENT_ROOT_MARKER: &str = "Assets";

/// Inputs of a single resolution
#[derive(Debug, Clone, Copy)]
pub struct OutputRequest<'a> {
    /// `directory:` header value, if any
    pub directory: Option<&'a str>,
    pub class_name: &'a str,
    /// Location of the `.atomic` file
    pub source_file: &'a Path,
    /// Root of the project the output belongs to, when known
    pub project_root: Option<&'a Path>,
    /// Nearest ancestor of the source that contains the marker directory
    pub content_root: Option<&'a Path>,
}

#[derive(Debug, Clone)]
pub struct OutputPathResolver {
    marker: String,
}

impl Default for OutputPathResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_ROOT_MARKER)
    }
}

impl OutputPathResolver {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Compute the generated file path.
    ///
    /// In priority order: no directory (co-locate with the source), absolute
    /// directory, relative to the project root, relative to the content
    /// root, relative to the source file's directory.
    pub fn resolve(&self, request: &OutputRequest<'_>) -> Result<PathBuf> {
        if request.class_name.trim().is_empty() {
            return Err(AtomicError::resolution("Class name is empty, cannot name the output file"));
        }

        let file_name = format!("{}.{}", request.class_name.trim(), GENERATED_EXTENSION);
        let source_dir = request
            .source_file
            .parent()
            .ok_or_else(|| {
                AtomicError::resolution(format!(
                    "Source file {} has no parent directory",
                    request.source_file.display()
                ))
            })?;

        let Some(directory) = request.directory.map(str::trim).filter(|d| !d.is_empty()) else {
            return Ok(source_dir.join(file_name));
        };

        if Path::new(directory).is_absolute() {
            return Ok(Path::new(directory).join(file_name));
        }

        let cleaned = clean_directory(directory);
        if cleaned.is_empty() {
            return Ok(source_dir.join(file_name));
        }

        let base = if let Some(project_root) = request.project_root {
            project_root.to_path_buf()
        } else if let Some(content_root) = request.content_root {
            if self.starts_with_marker(&cleaned) {
                content_root.to_path_buf()
            } else {
                content_root.join(&self.marker)
            }
        } else {
            source_dir.to_path_buf()
        };

        Ok(join_segments(&base, &cleaned).join(file_name))
    }

    /// Walk up from the source file looking for a directory that contains
    /// the marker. `is_dir` is the caller's filesystem probe.
    pub fn find_content_root<F>(&self, source_file: &Path, is_dir: F) -> Option<PathBuf>
    where
        F: Fn(&Path) -> bool,
    {
        source_file
            .parent()?
            .ancestors()
            .filter(|dir| !dir.as_os_str().is_empty())
            .find(|dir| is_dir(&dir.join(&self.marker)))
            .map(Path::to_path_buf)
    }

    fn starts_with_marker(&self, cleaned: &str) -> bool {
        segments(cleaned)
            .next()
            .is_some_and(|first| first.eq_ignore_ascii_case(&self.marker))
    }
}

/// Strip leading `./` / `.\` tokens and surrounding separators
pub fn clean_directory(directory: &str) -> String {
    let mut rest = directory.trim();
    loop {
        if let Some(stripped) = rest.strip_prefix("./").or_else(|| rest.strip_prefix(".\\")) {
            rest = stripped;
        } else {
            break;
        }
    }
    let trimmed = rest.trim_matches(|c| c == '/' || c == '\\');
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(|c| c == '/' || c == '\\')
        .filter(|s| !s.is_empty() && *s != ".")
}

fn join_segments(base: &Path, relative: &str) -> PathBuf {
    segments(relative).fold(base.to_path_buf(), |path, segment| path.join(segment))
}
