//! Decides whether an edit to an `.atomic` file warrants regeneration.
//!
//! Fields are split into two tiers: trigger fields change what is
//! generated, non-trigger fields only change where it goes or what the
//! file is called.

use crate::codegen::parser::parse_atomic;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Fields whose change forces regeneration
pub const TRIGGER_FIELDS: &[&str] = &[
    "header",
    "entityType",
    "aggressiveInlining",
    "unsafe",
    "namespace",
    "imports",
    "tags",
    "values",
];

/// Fields whose change alone never forces regeneration
pub const NON_TRIGGER_FIELDS: &[&str] = &["directory", "className", "solution"];

/// Compare two snapshots of a file.
///
/// A first observation always regenerates. Identical text never does.
/// If either side fails to parse, the answer is `true`.
pub fn should_regenerate(previous: Option<&str>, current: &str) -> bool {
    let Some(previous) = previous else {
        trace!("No previous content, regenerating");
        return true;
    };

    if previous == current {
        return false;
    }

    match changed_fields(previous, current) {
        Ok(changes) => {
            let mut regenerate = false;
            for field in &changes {
                if TRIGGER_FIELDS.contains(&field.as_str()) {
                    debug!("Trigger field '{}' changed", field);
                    regenerate = true;
                } else if NON_TRIGGER_FIELDS.contains(&field.as_str()) {
                    debug!("Ignoring change to non-trigger field '{}'", field);
                }
            }
            regenerate
        }
        Err(e) => {
            debug!("Could not diff contents ({}), regenerating", e);
            true
        }
    }
}

/// Names of all fields whose raw text differs between two snapshots,
/// in the order they first appear (previous fields first).
pub fn changed_fields(previous: &str, current: &str) -> crate::Result<Vec<String>> {
    let before = parse_atomic(previous)?.field_map();
    let after = parse_atomic(current)?.field_map();
    Ok(diff_fields(&before, &after))
}

fn diff_fields(before: &IndexMap<String, String>, after: &IndexMap<String, String>) -> Vec<String> {
    let mut changes: Vec<String> = before
        .iter()
        .filter(|(key, value)| after.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect();

    changes.extend(
        after
            .keys()
            .filter(|key| !before.contains_key(*key))
            .cloned(),
    );

    changes
}

/// Per-path cache of the last content seen, feeding [`should_regenerate`]
#[derive(Debug, Default)]
pub struct ChangeAnalyzer {
    contents: DashMap<PathBuf, String>,
}

impl ChangeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_content(&self, path: &Path) -> Option<String> {
        self.contents.get(path).map(|entry| entry.value().clone())
    }

    pub fn update_content(&self, path: &Path, content: &str) {
        self.contents.insert(path.to_path_buf(), content.to_string());
    }

    /// Classify `content` against the cached snapshot, then cache it
    pub fn observe(&self, path: &Path, content: &str) -> bool {
        let previous = self.contents.insert(path.to_path_buf(), content.to_string());
        should_regenerate(previous.as_deref(), content)
    }

    pub fn forget(&self, path: &Path) {
        self.contents.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "entityType: IEntity\nnamespace: Game\nclassName: Foo\ndirectory: Foo\n\ntags:\n- Enemy\n\nvalues:\n- Health: float\n";

    #[test]
    fn test_first_observation_regenerates() {
        assert!(should_regenerate(None, BASE));
        assert!(should_regenerate(None, ""));
    }

    #[test]
    fn test_identical_text_does_not_regenerate() {
        assert!(!should_regenerate(Some(BASE), BASE));
    }

    #[test]
    fn test_non_trigger_fields_ignored() {
        let moved = BASE.replace("directory: Foo", "directory: Bar");
        assert!(!should_regenerate(Some(BASE), &moved));

        let renamed = BASE.replace("className: Foo", "className: Bar");
        assert!(!should_regenerate(Some(BASE), &renamed));

        let retargeted = format!("solution: Game\n{}", BASE);
        assert!(!should_regenerate(Some(BASE), &retargeted));
    }

    #[test]
    fn test_trigger_fields_regenerate() {
        let values = BASE.replace("- Health: float", "- Health: int");
        assert!(should_regenerate(Some(BASE), &values));

        let tags = BASE.replace("- Enemy", "- Enemy\n- Player");
        assert!(should_regenerate(Some(BASE), &tags));

        let unsafe_mode = format!("unsafe: true\n{}", BASE);
        assert!(should_regenerate(Some(BASE), &unsafe_mode));
    }

    #[test]
    fn test_cosmetic_edits_do_not_regenerate() {
        let commented = BASE.replace("tags:\n", "tags:\n# disabled for now\n");
        assert!(!should_regenerate(Some(BASE), &commented));

        let spaced = BASE.replace("\n\ntags:", "\n\n\n\ntags:");
        assert!(!should_regenerate(Some(BASE), &spaced));
    }

    #[test]
    fn test_unparsable_content_regenerates() {
        assert!(should_regenerate(Some(BASE), "this is not atomic"));
        assert!(should_regenerate(Some("- orphan item"), BASE));
    }

    #[test]
    fn test_changed_fields_lists_added_and_removed() {
        let changes = changed_fields("namespace: A\nsolution: X\n", "namespace: B\nunsafe: true\n").unwrap();
        assert_eq!(changes, vec!["namespace", "solution", "unsafe"]);
    }

    #[test]
    fn test_analyzer_cache() {
        let analyzer = ChangeAnalyzer::new();
        let path = Path::new("/proj/Entity.atomic");

        assert!(analyzer.observe(path, BASE));
        assert!(!analyzer.observe(path, BASE));
        assert!(!analyzer.observe(path, &BASE.replace("directory: Foo", "directory: Bar")));
        assert_eq!(
            analyzer.previous_content(path),
            Some(BASE.replace("directory: Foo", "directory: Bar"))
        );

        analyzer.forget(path);
        assert!(analyzer.observe(path, BASE));
    }
}
