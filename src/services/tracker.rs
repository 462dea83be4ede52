//! Persistent map from `.atomic` sources to the files generated from them.

use crate::codegen::fs_utils;
use crate::error::Result;
use crate::services::FileWriter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFileInfo {
    pub atomic_file_path: PathBuf,
    pub generated_file_path: PathBuf,
    pub directory: Option<String>,
    pub class_name: String,
    /// Unix epoch milliseconds of the last successful generation
    pub last_modified: i64,
}

impl GeneratedFileInfo {
    pub fn new(
        atomic_file_path: impl Into<PathBuf>,
        generated_file_path: impl Into<PathBuf>,
        directory: Option<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            atomic_file_path: atomic_file_path.into(),
            generated_file_path: generated_file_path.into(),
            directory,
            class_name: class_name.into(),
            last_modified: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Loaded once, flushed to `state_file` on every update. Without a state
/// file it is purely in memory.
#[derive(Debug, Default)]
pub struct GeneratedFileTracker {
    state_file: Option<PathBuf>,
    records: RwLock<BTreeMap<PathBuf, GeneratedFileInfo>>,
}

impl GeneratedFileTracker {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load persisted state; a missing file starts empty
    pub async fn load(state_file: impl Into<PathBuf>) -> Result<Self> {
        let state_file = state_file.into();
        let records = match fs_utils::read_if_exists(&state_file).await? {
            Some(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)?,
            _ => BTreeMap::new(),
        };
        debug!(
            "Loaded {} tracked file(s) from {}",
            records.len(),
            state_file.display()
        );

        Ok(Self {
            state_file: Some(state_file),
            records: RwLock::new(records),
        })
    }

    pub async fn track(&self, info: GeneratedFileInfo) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(info.atomic_file_path.clone(), info);
        self.flush(&records).await
    }

    pub async fn get(&self, source: &Path) -> Option<GeneratedFileInfo> {
        self.records.read().await.get(source).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// True when the source is untracked or would now generate elsewhere
    pub async fn has_output_changed(
        &self,
        source: &Path,
        directory: Option<&str>,
        class_name: &str,
    ) -> bool {
        match self.records.read().await.get(source) {
            Some(info) => info.directory.as_deref() != directory || info.class_name != class_name,
            None => true,
        }
    }

    pub async fn remove(&self, source: &Path) -> Result<Option<GeneratedFileInfo>> {
        let mut records = self.records.write().await;
        let removed = records.remove(source);
        if removed.is_some() {
            self.flush(&records).await?;
        }
        Ok(removed)
    }

    /// Records whose `.atomic` source no longer exists according to `files`
    pub async fn orphans(&self, files: &dyn FileWriter) -> Vec<GeneratedFileInfo> {
        let snapshot: Vec<GeneratedFileInfo> = self.records.read().await.values().cloned().collect();

        let mut orphans = Vec::new();
        for info in snapshot {
            if !files.exists(&info.atomic_file_path).await {
                orphans.push(info);
            }
        }
        orphans
    }

    async fn flush(&self, records: &BTreeMap<PathBuf, GeneratedFileInfo>) -> Result<()> {
        let Some(state_file) = &self.state_file else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(records)?;
        fs_utils::write_file(state_file, json).await.map_err(|e| {
            warn!("Failed to persist tracker state to {}: {}", state_file.display(), e);
            e
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::local::LocalFileWriter;
    use tempfile::TempDir;

    fn info(source: &str, class_name: &str) -> GeneratedFileInfo {
        GeneratedFileInfo::new(
            source,
            format!("/proj/Gen/{}.cs", class_name),
            Some("Gen".to_string()),
            class_name,
        )
    }

    #[tokio::test]
    async fn test_track_and_detect_output_change() {
        let tracker = GeneratedFileTracker::in_memory();
        let source = Path::new("/proj/A.atomic");

        assert!(tracker.has_output_changed(source, Some("Gen"), "Foo").await);

        tracker.track(info("/proj/A.atomic", "Foo")).await.unwrap();

        assert!(!tracker.has_output_changed(source, Some("Gen"), "Foo").await);
        assert!(tracker.has_output_changed(source, Some("Other"), "Foo").await);
        assert!(tracker.has_output_changed(source, Some("Gen"), "Bar").await);
        assert_eq!(
            tracker.get(source).await.map(|i| i.generated_file_path),
            Some(PathBuf::from("/proj/Gen/Foo.cs"))
        );
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("state/tracker.json");

        let tracker = GeneratedFileTracker::load(&state_file).await.unwrap();
        tracker.track(info("/proj/A.atomic", "Foo")).await.unwrap();
        tracker.track(info("/proj/B.atomic", "Bar")).await.unwrap();
        tracker.remove(Path::new("/proj/B.atomic")).await.unwrap();

        let reloaded = GeneratedFileTracker::load(&state_file).await.unwrap();
        assert_eq!(reloaded.len().await, 1);
        assert_eq!(
            reloaded.get(Path::new("/proj/A.atomic")).await,
            tracker.get(Path::new("/proj/A.atomic")).await
        );

        let json = std::fs::read_to_string(&state_file).unwrap();
        assert!(json.contains("\"generatedFilePath\""));
        assert!(json.contains("\"lastModified\""));
    }

    #[tokio::test]
    async fn test_orphans() {
        let temp_dir = TempDir::new().unwrap();
        let kept = temp_dir.path().join("A.atomic");
        let gone = temp_dir.path().join("B.atomic");
        std::fs::write(&kept, "tags:\n- Enemy\n").unwrap();

        let tracker = GeneratedFileTracker::in_memory();
        tracker.track(info(kept.to_str().unwrap(), "Foo")).await.unwrap();
        tracker.track(info(gone.to_str().unwrap(), "Bar")).await.unwrap();

        let orphans = tracker.orphans(&LocalFileWriter).await;
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].class_name, "Bar");
        assert_eq!(orphans[0].atomic_file_path, gone);
    }
}
