//! Pre-generation checks on raw `.atomic` data.
//!
//! Three layers: required fields, syntactic lint, and type/namespace
//! lookups through the [`OracleService`]. Only the last one can be
//! inconclusive.

use crate::codegen::types::{AtomicFileData, HeaderKey};
use crate::codegen::utils::{
    find_duplicates, generic_brackets_valid, is_identifier, is_primitive_type, main_type_name,
};
use crate::services::{OracleAnswer, OracleService, ProjectContext};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Pseudo-field reported when a file declares neither tags nor values
pub const TAGS_OR_VALUES_FIELD: &str = "tags or values";

const REQUIRED_HEADERS: [HeaderKey; 4] = [
    HeaderKey::EntityType,
    HeaderKey::Namespace,
    HeaderKey::ClassName,
    HeaderKey::Directory,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// The header key, import, tag, value or type the message is about
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn warning(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub missing_fields: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Types or namespaces the oracle could not answer for in time
    pub inconclusive: Vec<String>,
}

impl ValidationReport {
    /// Generation must not proceed
    pub fn is_blocking(&self) -> bool {
        !self.missing_fields.is_empty() || self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn is_inconclusive(&self) -> bool {
        !self.inconclusive.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

/// Required fields that are absent or blank, by canonical field name
pub fn missing_fields(data: &AtomicFileData) -> Vec<String> {
    let mut missing: Vec<String> = REQUIRED_HEADERS
        .iter()
        .filter(|key| data.header_value(**key).map_or(true, |v| v.trim().is_empty()))
        .map(|key| key.field_name().to_string())
        .collect();

    if !data.has_tags_or_values() {
        missing.push(TAGS_OR_VALUES_FIELD.to_string());
    }

    missing
}

/// Checks that need nothing but the file itself
pub fn lint(data: &AtomicFileData) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for property in &data.header_properties {
        let Some(key) = HeaderKey::from_key(&property.key) else {
            continue;
        };
        if key.is_boolean() && property.value.parse::<bool>().is_err() {
            diagnostics.push(Diagnostic::error(
                key.field_name(),
                format!(
                    "'{}' must be 'true' or 'false', got '{}'",
                    key.field_name(),
                    property.value
                ),
            ));
        }
    }

    for import in &data.imports {
        if import.trim().is_empty() {
            diagnostics.push(Diagnostic::error("imports", "Empty import"));
        }
    }
    for duplicate in find_duplicates(data.imports.iter().map(|i| i.trim())) {
        if !duplicate.is_empty() {
            diagnostics.push(Diagnostic::warning(
                duplicate.as_str(),
                format!("Duplicate import '{}'", duplicate),
            ));
        }
    }

    for tag in &data.tags {
        check_name(&mut diagnostics, "tag", tag);
    }

    for value in &data.values {
        check_name(&mut diagnostics, "value", &value.name);
        if value.name.trim().is_empty() {
            continue;
        }
        let value_type = value.value_type.trim();
        if value_type.is_empty() {
            diagnostics.push(Diagnostic::error(
                value.name.as_str(),
                format!("Value '{}' has no type", value.name),
            ));
        } else if !generic_brackets_valid(value_type) {
            diagnostics.push(Diagnostic::error(
                value_type,
                format!("Malformed generic type '{}'", value_type),
            ));
        }
    }

    let names = data
        .tags
        .iter()
        .map(|t| t.trim())
        .chain(data.values.iter().map(|v| v.name.trim()));
    for duplicate in find_duplicates(names) {
        if !duplicate.is_empty() {
            diagnostics.push(Diagnostic::error(
                duplicate.as_str(),
                format!("'{}' is declared more than once", duplicate),
            ));
        }
    }

    diagnostics
}

fn check_name(diagnostics: &mut Vec<Diagnostic>, kind: &str, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        diagnostics.push(Diagnostic::error(kind, format!("Empty {} name", kind)));
    } else if !is_identifier(name) {
        diagnostics.push(Diagnostic::error(
            name,
            format!("'{}' is not a valid {} name", name, kind),
        ));
    }
}

/// Distinct non-primitive main type names referenced by values, in order
pub fn referenced_types(data: &AtomicFileData) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for value in &data.values {
        let value_type = value.value_type.trim();
        if value_type.is_empty() || !generic_brackets_valid(value_type) {
            continue;
        }
        let main = main_type_name(value_type);
        if main.is_empty() || is_primitive_type(main) || types.iter().any(|t| t == main) {
            continue;
        }
        types.push(main.to_string());
    }
    types
}

/// Full validation. Oracle queries use the service's default timeout.
pub async fn validate(
    data: &AtomicFileData,
    oracle: &OracleService,
    project: &ProjectContext,
) -> ValidationReport {
    validate_within(data, oracle, project, oracle.timeout()).await
}

/// Full validation with an explicit per-query budget
pub async fn validate_within(
    data: &AtomicFileData,
    oracle: &OracleService,
    project: &ProjectContext,
    budget: Duration,
) -> ValidationReport {
    let mut report = ValidationReport {
        missing_fields: missing_fields(data),
        diagnostics: lint(data),
        inconclusive: Vec::new(),
    };

    let mut seen_imports: Vec<&str> = Vec::new();
    for import in data.imports.iter().map(|i| i.trim()) {
        if import.is_empty() || seen_imports.contains(&import) {
            continue;
        }
        seen_imports.push(import);

        match oracle.query_namespace_within(import, project, budget).await {
            OracleAnswer::Answered(ns) if !ns.is_valid => {
                report.diagnostics.push(Diagnostic::error(
                    import,
                    format!("Unknown namespace '{}'", import),
                ));
            }
            OracleAnswer::Answered(_) => {}
            OracleAnswer::Inconclusive => report.inconclusive.push(import.to_string()),
        }
    }

    for type_name in referenced_types(data) {
        match oracle
            .query_type_within(&type_name, &data.imports, project, budget)
            .await
        {
            OracleAnswer::Answered(validation) if validation.is_ambiguous => {
                let mut message = format!(
                    "Type '{}' is ambiguous between: {}",
                    type_name,
                    validation.ambiguous_namespaces.join(", ")
                );
                if !validation.suggested_imports.is_empty() {
                    message.push_str(&format!(
                        ". Add one of these imports: {}",
                        validation.suggested_imports.join(", ")
                    ));
                }
                report.diagnostics.push(Diagnostic::error(type_name, message));
            }
            OracleAnswer::Answered(validation) if !validation.is_valid => {
                let mut message = format!("Unknown type '{}'", type_name);
                if !validation.suggested_imports.is_empty() {
                    message.push_str(&format!(
                        ". Did you forget an import? Candidates: {}",
                        validation.suggested_imports.join(", ")
                    ));
                }
                report.diagnostics.push(Diagnostic::error(type_name, message));
            }
            OracleAnswer::Answered(_) => {}
            OracleAnswer::Inconclusive => report.inconclusive.push(type_name),
        }
    }

    report
}
