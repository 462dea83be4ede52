//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use atomgen::codegen::AtomicSettings;
use atomgen::error::{AtomicError, Result};
use atomgen::services::{
    FileWriter, GeneratedFileTracker, NamespaceValidation, ProjectContext, ProjectHandle,
    ProjectLocator, TypeCompletion, TypeKind, TypeOracle, TypeValidation, UsageFinder,
    UsageLocation,
};
use atomgen::{Collaborators, GenerationEvent, Orchestrator};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub const SOURCE: &str = "/proj/Assets/Config/Entity.atomic";
pub const OUTPUT: &str = "/proj/Assets/Gen/Foo.cs";

pub const ENTITY: &str = "entityType: IEntity
namespace: Game
className: Foo
directory: Assets/Gen

imports:
- UnityEngine

tags:
- Enemy

values:
- Health: float
";

#[derive(Default)]
pub struct MemoryFileWriter {
    files: Mutex<BTreeMap<PathBuf, String>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    pub writes: AtomicUsize,
    /// Number of upcoming writes that fail
    pub failing_writes: AtomicUsize,
}

impl MemoryFileWriter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, path: impl Into<PathBuf>, content: &str) {
        self.files.lock().unwrap().insert(path.into(), content.to_string());
    }

    /// Simulate the file disappearing outside the orchestrator
    pub fn remove(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().remove(path.as_ref())
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        self.dirs.lock().unwrap().insert(path.into());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileWriter for MemoryFileWriter {
    async fn read_file(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.get(path))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_writes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_writes.store(failing - 1, Ordering::SeqCst);
            return Err(AtomicError::Write {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "file is locked"),
            });
        }
        self.put(path, content);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    async fn delete_file(&self, path: &Path) -> Result<bool> {
        Ok(self.files.lock().unwrap().remove(path).is_some())
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.lock().unwrap().contains(path)
            || self
                .files
                .lock()
                .unwrap()
                .keys()
                .any(|file| file != path && file.starts_with(path))
    }
}

/// Accepts every type except the listed ones
#[derive(Default)]
pub struct FakeOracle {
    pub unknown_types: Vec<String>,
    /// Simulated lookup latency
    pub delay: Option<Duration>,
    pub active: Arc<AtomicUsize>,
    /// Most lookups ever in flight at once
    pub peak: Arc<AtomicUsize>,
}

impl FakeOracle {
    async fn lag(&self) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TypeOracle for FakeOracle {
    async fn validate_type(
        &self,
        name: &str,
        _imports: &[String],
        _project: &ProjectContext,
    ) -> Result<TypeValidation> {
        self.lag().await;
        if self.unknown_types.iter().any(|t| t == name) {
            Ok(TypeValidation {
                suggested_imports: vec!["Game.Widgets".to_string()],
                ..TypeValidation::invalid()
            })
        } else {
            Ok(TypeValidation::valid(format!("UnityEngine.{}", name)))
        }
    }

    async fn complete_types(
        &self,
        prefix: &str,
        _imports: &[String],
        _project: &ProjectContext,
        _namespace_filter: Option<&str>,
    ) -> Result<Vec<TypeCompletion>> {
        Ok(["Vector2", "Vector3", "Transform"]
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| TypeCompletion {
                name: name.to_string(),
                full_name: format!("UnityEngine.{}", name),
                namespace: "UnityEngine".to_string(),
                is_generic: false,
                kind: TypeKind::Struct,
            })
            .collect())
    }

    async fn validate_namespace(
        &self,
        _name: &str,
        _project: &ProjectContext,
    ) -> Result<NamespaceValidation> {
        self.lag().await;
        Ok(NamespaceValidation {
            is_valid: true,
            has_direct_types: true,
        })
    }
}

/// Returns a fixed set of usages and records what it was asked
#[derive(Default)]
pub struct FixedUsageFinder {
    pub usages: Vec<UsageLocation>,
    pub requests: Mutex<Vec<(Vec<String>, PathBuf)>>,
}

#[async_trait]
impl UsageFinder for FixedUsageFinder {
    async fn find_usages(
        &self,
        method_names: &[String],
        generated_file: &Path,
        _project: &ProjectContext,
    ) -> Result<Vec<UsageLocation>> {
        self.requests
            .lock()
            .unwrap()
            .push((method_names.to_vec(), generated_file.to_path_buf()));
        Ok(self
            .usages
            .iter()
            .filter(|u| method_names.contains(&u.method_name))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FixedLocator {
    pub project: Option<ProjectHandle>,
}

#[async_trait]
impl ProjectLocator for FixedLocator {
    async fn resolve_project(
        &self,
        _directory_hint: &Path,
        _name_hint: Option<&str>,
    ) -> Result<Option<ProjectHandle>> {
        Ok(self.project.clone())
    }
}

pub fn usage(file: &str, line: u32, column: u32, method_name: &str, line_text: &str) -> UsageLocation {
    UsageLocation {
        file_path: PathBuf::from(file),
        line,
        column,
        method_name: method_name.to_string(),
        line_text: line_text.to_string(),
    }
}

/// Settings with short timers so tests stay fast
pub fn fast_settings() -> AtomicSettings {
    AtomicSettings {
        debounce_delay_ms: 30,
        min_generation_spacing_ms: 0,
        write_retry_delay_ms: 5,
        oracle_timeout_ms: 200,
        ..AtomicSettings::default()
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub events: UnboundedReceiver<GenerationEvent>,
    pub writer: Arc<MemoryFileWriter>,
}

pub struct HarnessBuilder {
    pub settings: AtomicSettings,
    pub oracle: FakeOracle,
    pub usage_finder: Arc<FixedUsageFinder>,
    pub locator: FixedLocator,
    pub ready: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            settings: fast_settings(),
            oracle: FakeOracle::default(),
            usage_finder: Arc::new(FixedUsageFinder::default()),
            locator: FixedLocator::default(),
            ready: true,
        }
    }
}

impl HarnessBuilder {
    pub fn build(self) -> Harness {
        let writer = MemoryFileWriter::new();
        writer.put(SOURCE, ENTITY);

        let collaborators = Collaborators {
            oracle: Arc::new(self.oracle),
            usage_finder: self.usage_finder,
            writer: writer.clone(),
            locator: Arc::new(self.locator),
        };
        let (orchestrator, events) =
            Orchestrator::new(self.settings, collaborators, GeneratedFileTracker::in_memory());
        if self.ready {
            orchestrator.oracle().mark_ready();
        }

        Harness {
            orchestrator,
            events,
            writer,
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::default().build()
}

impl Harness {
    /// Drop everything already published
    pub fn drain_events(&mut self) -> Vec<GenerationEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Wait for the first event matching `predicate`
    pub async fn wait_for<F>(&mut self, predicate: F) -> GenerationEvent
    where
        F: Fn(&GenerationEvent) -> bool,
    {
        let deadline = Duration::from_secs(5);
        tokio::time::timeout(deadline, async {
            loop {
                match self.events.recv().await {
                    Some(event) if predicate(&event) => return event,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }
}
