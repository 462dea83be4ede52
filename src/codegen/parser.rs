//! The `.atomic` line grammar.
//!
//! Every line is classified exactly once into an [`AtomicLine`]; the
//! resulting [`AtomicDocument`] is then projected either into
//! [`AtomicFileData`] for generation or into a flat field map for change
//! analysis. Nothing else in the crate scans `.atomic` text.
//!
//! ```text
//! entityType: IEntity
//! namespace: Game.Generated
//!
//! tags:
//! - Enemy
//!
//! values:
//! - Health: float
//! ```

use crate::codegen::types::{AtomicFileData, HeaderKey, HeaderProperty, ValueDef};
use crate::error::{AtomicError, Result};
use indexmap::IndexMap;

pub const IMPORTS_SECTION: &str = "imports";
pub const TAGS_SECTION: &str = "tags";
pub const VALUES_SECTION: &str = "values";
pub const HEADER_FIELD: &str = "header";

/// One classified line of an `.atomic` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomicLine {
    Blank,
    Comment(String),
    Section(String),
    Property { key: String, value: String },
    ListItem(String),
}

/// A `-` item inside a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionItem {
    /// 1-based line number
    pub line: usize,
    /// Trimmed line as written, including the dash
    pub raw: String,
    /// Item text after the dash
    pub text: String,
}

/// A parsed `.atomic` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicDocument {
    pub properties: Vec<HeaderProperty>,
    pub sections: IndexMap<String, Vec<SectionItem>>,
}

/// Classify a single line. `line_no` is 1-based and only used for errors.
pub fn classify_line(line: &str, line_no: usize) -> Result<AtomicLine> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return Ok(AtomicLine::Blank);
    }

    if let Some(comment) = trimmed.strip_prefix('#') {
        return Ok(AtomicLine::Comment(comment.trim().to_string()));
    }

    if let Some(item) = trimmed.strip_prefix('-') {
        return Ok(AtomicLine::ListItem(item.trim().to_string()));
    }

    if let Some(name) = trimmed.strip_suffix(':') {
        if !trimmed.contains(": ") {
            let name = name.trim();
            if name.is_empty() {
                return Err(AtomicError::Parse {
                    line: line_no,
                    message: "Section header without a name".to_string(),
                });
            }
            return Ok(AtomicLine::Section(name.to_string()));
        }
    }

    if let Some((key, value)) = trimmed.split_once(':') {
        let key = key.trim();
        if key.is_empty() {
            return Err(AtomicError::Parse {
                line: line_no,
                message: format!("Property without a key: '{}'", trimmed),
            });
        }
        return Ok(AtomicLine::Property {
            key: key.to_string(),
            value: unquote(value.trim()).to_string(),
        });
    }

    Err(AtomicError::Parse {
        line: line_no,
        message: format!("Unrecognized line: '{}'", trimmed),
    })
}

/// Parse the full text of an `.atomic` file
pub fn parse_atomic(text: &str) -> Result<AtomicDocument> {
    let mut document = AtomicDocument::default();
    let mut current_section: Option<String> = None;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;

        match classify_line(line, line_no)? {
            AtomicLine::Blank | AtomicLine::Comment(_) => {}
            AtomicLine::Section(name) => {
                // `directory:` with nothing after it is an empty property, not a section
                if is_header_field(&name) {
                    document.properties.push(HeaderProperty::new(name, ""));
                    continue;
                }
                document.sections.entry(name.clone()).or_default();
                current_section = Some(name);
            }
            AtomicLine::Property { key, value } => {
                document.properties.push(HeaderProperty { key, value });
            }
            AtomicLine::ListItem(text) => {
                let Some(section) = current_section.as_ref() else {
                    return Err(AtomicError::Parse {
                        line: line_no,
                        message: "List item outside of a section".to_string(),
                    });
                };
                document
                    .sections
                    .entry(section.clone())
                    .or_default()
                    .push(SectionItem {
                        line: line_no,
                        raw: line.trim().to_string(),
                        text,
                    });
            }
        }
    }

    Ok(document)
}

impl AtomicDocument {
    /// Items of a section, empty when the section is absent
    pub fn section_items(&self, name: &str) -> &[SectionItem] {
        self.sections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Project into the raw data consumed by the mapper and validator
    pub fn to_file_data(&self) -> AtomicFileData {
        let imports = self
            .section_items(IMPORTS_SECTION)
            .iter()
            .map(|item| item.text.clone())
            .collect();

        let tags = self
            .section_items(TAGS_SECTION)
            .iter()
            .map(|item| item.text.clone())
            .collect();

        let values = self
            .section_items(VALUES_SECTION)
            .iter()
            .map(|item| split_value_item(&item.text))
            .collect();

        AtomicFileData {
            file_path: None,
            header_properties: self.properties.clone(),
            imports,
            tags,
            values,
        }
    }

    /// Flat `field -> raw text` view used for change classification.
    ///
    /// Recognized header keys are reported under their canonical field
    /// name; section bodies are their item lines joined by `\n`. Empty
    /// sections are absent.
    pub fn field_map(&self) -> IndexMap<String, String> {
        let mut fields = IndexMap::new();

        for property in &self.properties {
            let key = HeaderKey::from_key(&property.key)
                .map(|k| k.field_name().to_string())
                .unwrap_or_else(|| property.key.clone());
            fields.insert(key, property.value.clone());
        }

        for (name, items) in &self.sections {
            if items.is_empty() {
                continue;
            }
            let body = items
                .iter()
                .map(|item| item.raw.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            fields.insert(name.clone(), body);
        }

        fields
    }
}

/// Parse text straight into raw file data
pub fn parse_file_data(text: &str) -> Result<AtomicFileData> {
    Ok(parse_atomic(text)?.to_file_data())
}

/// Split `Name: Type` at the first colon; the type may be empty
pub fn split_value_item(text: &str) -> ValueDef {
    match text.split_once(':') {
        Some((name, value_type)) => ValueDef::new(name.trim(), value_type.trim()),
        None => ValueDef::new(text.trim(), ""),
    }
}

fn is_header_field(name: &str) -> bool {
    name == HEADER_FIELD || HeaderKey::from_key(name).is_some()
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
