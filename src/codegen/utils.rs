//! Utility functions for code generation.
//!
//! Naming rules for generated members live here so that the generator and
//! the rename flow derive method names from the same place.

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

/// Built-in C# type keywords that never need a type-oracle lookup
pub const PRIMITIVE_TYPES: &[&str] = &[
    "bool", "byte", "sbyte", "char", "decimal", "double", "float", "int", "uint", "long",
    "ulong", "short", "ushort", "string", "object", "void", "dynamic",
];

static IDENTIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());
static EMPTY_GENERIC_ARGUMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<\s*>|<\s*,|,\s*>|,\s*,").ok());

/// Generated accessor names for a value, in emission order.
/// `Ref{name}` is only emitted in unsafe mode but is always searched on rename.
pub fn value_method_names(name: &str) -> Vec<String> {
    vec![
        format!("Get{}", name),
        format!("Set{}", name),
        format!("Add{}", name),
        format!("Has{}", name),
        format!("Del{}", name),
        format!("TryGet{}", name),
        format!("Ref{}", name),
    ]
}

/// Generated predicate/add/delete names for a tag
pub fn tag_method_names(name: &str) -> Vec<String> {
    vec![
        format!("Has{}Tag", name),
        format!("Add{}Tag", name),
        format!("Del{}Tag", name),
    ]
}

/// Types that get no trailing `// type` comment on their constant
pub fn is_base_type(type_text: &str) -> bool {
    matches!(type_text.trim(), "" | "object" | "Object")
}

pub fn is_primitive_type(type_name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&type_name)
}

/// Strip generic arguments and array suffixes: `List<int>[]` -> `List`
pub fn main_type_name(type_text: &str) -> &str {
    let end = type_text
        .find(|c| c == '<' || c == '[')
        .unwrap_or(type_text.len());
    type_text[..end].trim()
}

/// C#-style identifier: letter or underscore, then letters, digits, underscores
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.as_ref().is_some_and(|re| re.is_match(name))
}

/// Check `<`/`>` nesting in a type reference and reject empty argument lists
pub fn generic_brackets_valid(type_text: &str) -> bool {
    if EMPTY_GENERIC_ARGUMENT
        .as_ref()
        .is_some_and(|re| re.is_match(type_text))
    {
        return false;
    }

    let mut depth = 0i32;
    for c in type_text.chars() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Items that occur more than once, each reported once in first-seen order
pub fn find_duplicates<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();

    for item in items {
        if !seen.insert(item) && !duplicates.iter().any(|d| d == item) {
            duplicates.push(item.to_string());
        }
    }

    duplicates
}

/// Convert `text` to the line-ending convention of `existing`.
/// Without an existing file, or if it uses `\n`, the result uses `\n`.
pub fn normalize_line_endings(text: &str, existing: Option<&str>) -> String {
    let unix = text.replace("\r\n", "\n");
    match existing {
        Some(current) if current.contains("\r\n") => unix.replace('\n', "\r\n"),
        _ => unix,
    }
}

/// Compare two paths textually, ignoring case and separator style
pub fn paths_equal_ignore_case(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| p.to_string_lossy().replace('\\', "/").to_lowercase();
    normalize(a) == normalize(b)
}
