//! Renaming a tag or value: rewrite the `.atomic` entry, every call site of
//! the generated methods, then regenerate.

use super::{GenerationMode, Orchestrator};
use crate::codegen::parser::{
    parse_atomic, split_value_item, SectionItem, TAGS_SECTION, VALUES_SECTION,
};
use crate::codegen::utils::{
    is_identifier, paths_equal_ignore_case, tag_method_names, value_method_names,
};
use crate::error::{AtomicError, Result};
use crate::services::{ProjectContext, UsageLocation};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameKind {
    Value,
    Tag,
}

impl RenameKind {
    fn section(&self) -> &'static str {
        match self {
            Self::Value => VALUES_SECTION,
            Self::Tag => TAGS_SECTION,
        }
    }

    /// Generated method names for `name`, in a fixed order shared by old and new
    pub fn method_names(&self, name: &str) -> Vec<String> {
        match self {
            Self::Value => value_method_names(name),
            Self::Tag => tag_method_names(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    pub old_name: String,
    pub new_name: String,
    pub kind: RenameKind,
}

impl RenameRequest {
    pub fn new(old_name: impl Into<String>, new_name: impl Into<String>, kind: RenameKind) -> Self {
        Self {
            old_name: old_name.into(),
            new_name: new_name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUsage {
    pub usage: UsageLocation,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameOutcome {
    /// Every usage was rewritten and the file regenerated
    pub success: bool,
    pub regenerated_path: Option<PathBuf>,
    pub updated: Vec<UsageLocation>,
    pub failed: Vec<FailedUsage>,
    pub error_message: Option<String>,
}

impl Orchestrator {
    /// Rename a tag or value declared in `source`.
    ///
    /// `content` is the current text of `source`; it may still declare the
    /// old name (it is rewritten and saved) or already declare the new one.
    /// Usage rewrites that fail are reported, not fatal: regeneration is
    /// attempted regardless.
    pub async fn rename(
        &self,
        source: &Path,
        content: &str,
        request: &RenameRequest,
    ) -> Result<RenameOutcome> {
        let old_name = request.old_name.trim();
        let new_name = request.new_name.trim();
        if !is_identifier(new_name) {
            return Err(AtomicError::config(format!("'{}' is not a valid name", new_name)));
        }
        if old_name == new_name {
            return Err(AtomicError::config("Old and new names are identical"));
        }

        let content = self.rewrite_declaration(source, content, request.kind, old_name, new_name).await?;
        let generated = self.generated_path(source, &content).await?;

        let old_methods = request.kind.method_names(old_name);
        let new_methods = request.kind.method_names(new_name);
        let renames: BTreeMap<&str, &str> = old_methods
            .iter()
            .map(String::as_str)
            .zip(new_methods.iter().map(String::as_str))
            .collect();

        let mut outcome = RenameOutcome::default();

        let project = self
            .project_for(source, None)
            .await?
            .as_ref()
            .map(ProjectContext::from_handle)
            .unwrap_or_default();

        match self
            .inner
            .usage_finder
            .find_usages(&old_methods, &generated, &project)
            .await
        {
            Ok(usages) => {
                let usages: Vec<UsageLocation> = usages
                    .into_iter()
                    .filter(|u| !paths_equal_ignore_case(&u.file_path, &generated))
                    .collect();
                debug!("Rewriting {} usage(s) of '{}'", usages.len(), old_name);
                self.rewrite_usages(usages, &renames, &mut outcome).await;
            }
            Err(e) => {
                warn!("Usage search for '{}' failed: {}", old_name, e);
                outcome.error_message = Some(format!("Usage search failed: {}", e));
            }
        }

        match self.generate(source, &content, GenerationMode::Manual).await {
            Ok(generation) => {
                outcome.regenerated_path = generation.output_path().map(Path::to_path_buf);
            }
            Err(e) => {
                let message = format!("Regeneration failed: {}", e);
                outcome.error_message = Some(match outcome.error_message.take() {
                    Some(previous) => format!("{}; {}", previous, message),
                    None => message,
                });
            }
        }

        if !outcome.failed.is_empty() && outcome.error_message.is_none() {
            outcome.error_message = Some(format!("{} usage(s) could not be updated", outcome.failed.len()));
        }
        outcome.success = outcome.failed.is_empty()
            && outcome.error_message.is_none()
            && outcome.regenerated_path.is_some();

        info!(
            "Renamed '{}' to '{}': {} usage(s) updated, {} failed",
            old_name,
            new_name,
            outcome.updated.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// Make `content` declare `new_name`, saving `source` if it changed
    async fn rewrite_declaration(
        &self,
        source: &Path,
        content: &str,
        kind: RenameKind,
        old_name: &str,
        new_name: &str,
    ) -> Result<String> {
        let document = parse_atomic(content)?;
        let items = document.section_items(kind.section());
        let declares = |item: &SectionItem, name: &str| match kind {
            RenameKind::Value => split_value_item(&item.text).name == name,
            RenameKind::Tag => item.text == name,
        };
        let declared = |name: &str| items.iter().any(|item| declares(item, name));

        if declared(new_name) {
            if declared(old_name) {
                return Err(AtomicError::config(format!("'{}' is already declared", new_name)));
            }
            return Ok(content.to_string());
        }

        let Some(item) = items.iter().find(|item| declares(item, old_name)) else {
            return Err(AtomicError::config(format!(
                "'{}' is not declared in {}",
                old_name,
                kind.section()
            )));
        };

        let mut lines: Vec<String> = content.split_inclusive('\n').map(str::to_string).collect();
        let index = item.line - 1;
        let replaced = lines
            .get(index)
            .and_then(|line| replace_at_word(line, old_name, new_name, None))
            .ok_or_else(|| {
                AtomicError::config(format!("Could not locate '{}' on line {}", old_name, item.line))
            })?;
        lines[index] = replaced;

        let updated = lines.concat();
        self.inner.writer.write_file(source, &updated).await?;
        Ok(updated)
    }

    async fn rewrite_usages(
        &self,
        usages: Vec<UsageLocation>,
        renames: &BTreeMap<&str, &str>,
        outcome: &mut RenameOutcome,
    ) {
        let mut by_file: BTreeMap<PathBuf, Vec<UsageLocation>> = BTreeMap::new();
        for usage in usages {
            by_file.entry(usage.file_path.clone()).or_default().push(usage);
        }

        for (file, mut usages) in by_file {
            // Right to left, so earlier columns stay valid
            usages.sort_by(|a, b| (b.line, b.column).cmp(&(a.line, a.column)));

            let text = match self.inner.writer.read_file(&file).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    fail_all(outcome, usages, "File no longer exists");
                    continue;
                }
                Err(e) => {
                    fail_all(outcome, usages, &e.to_string());
                    continue;
                }
            };

            let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
            let mut applied = Vec::new();

            for usage in usages {
                match apply_usage(&mut lines, &usage, renames) {
                    Ok(()) => applied.push(usage),
                    Err(e) => {
                        warn!("{}", e);
                        outcome.failed.push(FailedUsage {
                            usage,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            if applied.is_empty() {
                continue;
            }

            match self.inner.writer.write_file(&file, &lines.concat()).await {
                Ok(()) => {
                    applied.reverse();
                    outcome.updated.extend(applied);
                }
                Err(e) => fail_all(outcome, applied, &e.to_string()),
            }
        }
    }
}

fn fail_all(outcome: &mut RenameOutcome, usages: Vec<UsageLocation>, reason: &str) {
    outcome.failed.extend(usages.into_iter().map(|usage| FailedUsage {
        usage,
        reason: reason.to_string(),
    }));
}

fn apply_usage(
    lines: &mut [String],
    usage: &UsageLocation,
    renames: &BTreeMap<&str, &str>,
) -> Result<()> {
    let usage_error = |message: String| AtomicError::UsageUpdate {
        file: usage.file_path.clone(),
        line: usage.line,
        message,
    };

    let new_name = renames
        .get(usage.method_name.as_str())
        .ok_or_else(|| usage_error(format!("'{}' is not being renamed", usage.method_name)))?;

    let index = (usage.line as usize)
        .checked_sub(1)
        .ok_or_else(|| usage_error("Line numbers start at 1".to_string()))?;
    let line = lines
        .get(index)
        .ok_or_else(|| usage_error("Line is past the end of the file".to_string()))?;

    let column = (usage.column as usize).saturating_sub(1);
    let replaced = replace_at_word(line, &usage.method_name, new_name, Some(column)).ok_or_else(|| {
        usage_error(format!(
            "Expected '{}' at column {}, found something else",
            usage.method_name, usage.column
        ))
    })?;

    lines[index] = replaced;
    Ok(())
}

/// Replace a whole-word occurrence of `old` in `line`. With `column`, the
/// word must start exactly at that character offset; otherwise the first
/// whole-word occurrence is used.
fn replace_at_word(line: &str, old: &str, new: &str, column: Option<usize>) -> Option<String> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    let candidates: Vec<usize> = match column {
        Some(column) => vec![line.char_indices().nth(column).map(|(i, _)| i)?],
        None => line.match_indices(old).map(|(i, _)| i).collect(),
    };

    for start in candidates {
        if !line[start..].starts_with(old) {
            continue;
        }
        let end = start + old.len();
        let before_ok = !line[..start].chars().next_back().is_some_and(is_word);
        let after_ok = !line[end..].chars().next().is_some_and(is_word);
        if before_ok && after_ok {
            return Some(format!("{}{}{}", &line[..start], new, &line[end..]));
        }
    }

    None
}
