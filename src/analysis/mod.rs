//! Change classification and validation of `.atomic` files.

pub mod change_analyzer;
pub mod validation;

pub use change_analyzer::{should_regenerate, ChangeAnalyzer, NON_TRIGGER_FIELDS, TRIGGER_FIELDS};
pub use validation::{validate, Diagnostic, Severity, ValidationReport};
