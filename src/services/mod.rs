//! Collaborators the generator depends on but does not implement.
//!
//! The host (an IDE plugin, the CLI, a test) supplies implementations of
//! these traits; the orchestrator only talks to them through `Arc<dyn _>`.

pub mod local;
pub mod oracle;
pub mod tracker;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use oracle::{OracleAnswer, OracleService};
pub use tracker::{GeneratedFileInfo, GeneratedFileTracker};

/// The project a query is asked on behalf of
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectContext {
    pub root: Option<PathBuf>,
    pub name: Option<String>,
}

impl ProjectContext {
    pub fn from_handle(handle: &ProjectHandle) -> Self {
        Self {
            root: Some(handle.root.clone()),
            name: Some(handle.name.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeValidation {
    pub is_valid: bool,
    pub full_name: Option<String>,
    pub is_ambiguous: bool,
    pub suggested_imports: Vec<String>,
    pub ambiguous_namespaces: Vec<String>,
}

impl TypeValidation {
    pub fn valid(full_name: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            full_name: Some(full_name.into()),
            ..Default::default()
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCompletion {
    pub name: String,
    pub full_name: String,
    pub namespace: String,
    pub is_generic: bool,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceValidation {
    pub is_valid: bool,
    pub has_direct_types: bool,
}

/// Answers type and namespace questions about the user's code
#[async_trait]
pub trait TypeOracle: Send + Sync {
    async fn validate_type(
        &self,
        name: &str,
        imports: &[String],
        project: &ProjectContext,
    ) -> Result<TypeValidation>;

    async fn complete_types(
        &self,
        prefix: &str,
        imports: &[String],
        project: &ProjectContext,
        namespace_filter: Option<&str>,
    ) -> Result<Vec<TypeCompletion>>;

    async fn validate_namespace(
        &self,
        name: &str,
        project: &ProjectContext,
    ) -> Result<NamespaceValidation>;
}

/// A reference to a generated method in user code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLocation {
    pub file_path: PathBuf,
    /// 1-based
    pub line: u32,
    /// 1-based, in characters
    pub column: u32,
    pub method_name: String,
    pub line_text: String,
}

#[async_trait]
pub trait UsageFinder: Send + Sync {
    /// Locations calling any of `method_names` declared in `generated_file`
    async fn find_usages(
        &self,
        method_names: &[String],
        generated_file: &Path,
        project: &ProjectContext,
    ) -> Result<Vec<UsageLocation>>;
}

/// File access used for generated output and rename edits
#[async_trait]
pub trait FileWriter: Send + Sync {
    /// `None` when the file does not exist
    async fn read_file(&self, path: &Path) -> Result<Option<String>>;

    /// Create or overwrite, creating parent directories as needed
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    async fn exists(&self, path: &Path) -> bool;

    /// Returns whether a file was actually removed
    async fn delete_file(&self, path: &Path) -> Result<bool>;

    /// Cheap metadata probe, used while walking up to the content root
    fn is_dir(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHandle {
    pub name: String,
    pub root: PathBuf,
    pub writable: bool,
}

#[async_trait]
pub trait ProjectLocator: Send + Sync {
    /// Find the project owning `directory_hint`, preferring one called `name_hint`
    async fn resolve_project(
        &self,
        directory_hint: &Path,
        name_hint: Option<&str>,
    ) -> Result<Option<ProjectHandle>>;
}
