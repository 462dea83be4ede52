//! Drives generation for `.atomic` files.
//!
//! Per source path the flow is: debounce, validate, generate, resolve the
//! output path, write (only if the content changed), track. Writes for one
//! path are serialized by a per-path gate that also enforces a minimum
//! spacing between completed generations. A newer debounced request
//! supersedes a pending one, but never interrupts a write in progress.

mod rename;

pub use rename::{FailedUsage, RenameKind, RenameOutcome, RenameRequest};

use crate::analysis::change_analyzer::ChangeAnalyzer;
use crate::analysis::validation::{self, ValidationReport};
use crate::codegen::config_mapper::map_to_config;
use crate::codegen::csharp_codegen::{generate_source, is_generated_text};
use crate::codegen::output_path::{OutputPathResolver, OutputRequest};
use crate::codegen::parser::parse_file_data;
use crate::codegen::project_config::AtomicSettings;
use crate::codegen::types::{AtomicFileData, CanonicalConfig};
use crate::codegen::utils::{normalize_line_endings, paths_equal_ignore_case};
use crate::error::{AtomicError, Result};
use crate::services::{
    FileWriter, GeneratedFileInfo, GeneratedFileTracker, OracleService, ProjectContext,
    ProjectHandle, ProjectLocator, TypeCompletion, TypeOracle, UsageFinder,
};
use dashmap::{DashMap, DashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, trace, warn};

/// Per-query budget for background re-validation after a timeout
pub const RECHECK_BUDGET: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Explicitly requested; may create the output file, errors are returned
    Manual,
    /// Triggered by an edit; only updates an existing output file
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AutoGenerateDisabled,
    /// Auto mode never creates the output file
    OutputMissing(PathBuf),
    /// Deferred until the type oracle signals readiness
    OracleNotReady,
    /// Only non-trigger fields (or nothing) changed
    NoRelevantChange,
    /// The source was deleted while this request waited for its turn
    SourceDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Written(PathBuf),
    /// The output already had exactly this content
    Unchanged(PathBuf),
    Skipped(SkipReason),
}

impl GenerationOutcome {
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            Self::Written(path) | Self::Unchanged(path) => Some(path),
            Self::Skipped(_) => None,
        }
    }
}

/// Published on the orchestrator's event channel
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    Generated { source: PathBuf, output: PathBuf },
    Unchanged { source: PathBuf, output: PathBuf },
    Skipped { source: PathBuf, reason: SkipReason },
    Failed { source: PathBuf, message: String },
    /// User-visible, non-blocking message: an auto-mode failure or a newly
    /// placed output file
    Notification { source: PathBuf, message: String },
    Revalidated { source: PathBuf, report: ValidationReport },
}

/// The host-provided services
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn TypeOracle>,
    pub usage_finder: Arc<dyn UsageFinder>,
    pub writer: Arc<dyn FileWriter>,
    pub locator: Arc<dyn ProjectLocator>,
}

#[derive(Debug, Default)]
struct GateState {
    last_completed: Option<Instant>,
}

struct Inner {
    settings: AtomicSettings,
    oracle: OracleService,
    usage_finder: Arc<dyn UsageFinder>,
    writer: Arc<dyn FileWriter>,
    locator: Arc<dyn ProjectLocator>,
    tracker: GeneratedFileTracker,
    resolver: OutputPathResolver,
    analyzer: ChangeAnalyzer,
    gates: DashMap<PathBuf, Arc<Mutex<GateState>>>,
    /// Latest debounced request id per path
    latest_request: DashMap<PathBuf, u64>,
    pending: DashMap<PathBuf, JoinHandle<()>>,
    /// Auto generations waiting for the oracle
    deferred: DashSet<PathBuf>,
    /// Bumped on every source deletion; requests from an older epoch are dropped
    deletions: DashMap<PathBuf, u64>,
    next_request: AtomicU64,
    events: mpsc::UnboundedSender<GenerationEvent>,
}

/// Cheap to clone; clones share all state
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        settings: AtomicSettings,
        collaborators: Collaborators,
        tracker: GeneratedFileTracker,
    ) -> (Self, mpsc::UnboundedReceiver<GenerationEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let oracle = OracleService::new(collaborators.oracle, settings.oracle_timeout());
        let resolver = OutputPathResolver::new(settings.content_root_marker.clone());

        let inner = Inner {
            settings,
            oracle,
            usage_finder: collaborators.usage_finder,
            writer: collaborators.writer,
            locator: collaborators.locator,
            tracker,
            resolver,
            analyzer: ChangeAnalyzer::new(),
            gates: DashMap::new(),
            latest_request: DashMap::new(),
            pending: DashMap::new(),
            deferred: DashSet::new(),
            deletions: DashMap::new(),
            next_request: AtomicU64::new(0),
            events,
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    pub fn settings(&self) -> &AtomicSettings {
        &self.inner.settings
    }

    pub fn oracle(&self) -> &OracleService {
        &self.inner.oracle
    }

    pub fn tracker(&self) -> &GeneratedFileTracker {
        &self.inner.tracker
    }

    pub fn analyzer(&self) -> &ChangeAnalyzer {
        &self.inner.analyzer
    }

    /// Debounced requests that have not started generating yet
    pub fn pending_requests(&self) -> usize {
        self.inner.latest_request.len()
    }

    fn emit(&self, event: GenerationEvent) {
        // Nobody listening is fine
        let _ = self.inner.events.send(event);
    }

    /// Feed an edit. Returns whether an auto generation was scheduled.
    pub fn on_content_changed(&self, source: &Path, content: &str) -> bool {
        if !self.inner.settings.auto_generate_enabled {
            trace!("Auto generation disabled, ignoring change to {}", source.display());
            return false;
        }

        if !self.inner.analyzer.observe(source, content) {
            debug!("No relevant change in {}", source.display());
            self.emit(GenerationEvent::Skipped {
                source: source.to_path_buf(),
                reason: SkipReason::NoRelevantChange,
            });
            return false;
        }

        self.schedule(source, content);
        true
    }

    /// Queue a debounced auto generation, superseding any pending one
    pub fn schedule(&self, source: &Path, content: &str) {
        let id = self.inner.next_request.fetch_add(1, Ordering::Relaxed);
        self.inner.latest_request.insert(source.to_path_buf(), id);

        let this = self.clone();
        let path = source.to_path_buf();
        let content = content.to_string();
        let handle = tokio::spawn(async move {
            sleep(this.inner.settings.debounce_delay()).await;

            let current = this
                .inner
                .latest_request
                .remove_if(&path, |_, latest| *latest == id)
                .is_some();
            if !current {
                trace!("Request {} for {} was superseded", id, path.display());
                return;
            }

            // Edits that did not reschedule (routing-only changes) still count
            let content = this.inner.analyzer.previous_content(&path).unwrap_or(content);

            // Detached so that aborting this handle cannot interrupt a write
            let worker = this.clone();
            let run = tokio::spawn(async move {
                let _ = worker.generate(&path, &content, GenerationMode::Auto).await;
            });
            let _ = run.await;
        });

        if let Some(previous) = self.inner.pending.insert(source.to_path_buf(), handle) {
            previous.abort();
        }
    }

    fn cancel_pending(&self, source: &Path) {
        self.inner.latest_request.remove(source);
        if let Some((_, handle)) = self.inner.pending.remove(source) {
            handle.abort();
        }
    }

    /// Generate from `content`, the current text of `source`
    pub async fn generate(
        &self,
        source: &Path,
        content: &str,
        mode: GenerationMode,
    ) -> Result<GenerationOutcome> {
        if mode == GenerationMode::Auto && !self.inner.settings.auto_generate_enabled {
            return Ok(self.skipped(source, SkipReason::AutoGenerateDisabled));
        }

        let epoch = self.deletion_epoch(source);
        let gate = self.gate(source);
        let mut state = gate.lock().await;

        if self.deletion_epoch(source) != epoch {
            drop(state);
            return Ok(self.skipped(source, SkipReason::SourceDeleted));
        }

        if let Some(last) = state.last_completed {
            let spacing = self.inner.settings.min_generation_spacing();
            let elapsed = last.elapsed();
            if elapsed < spacing {
                trace!("Spacing generations of {} by {:?}", source.display(), spacing - elapsed);
                sleep(spacing - elapsed).await;
            }
        }

        let result = self.run_generation(source, content, mode).await;
        state.last_completed = Some(Instant::now());
        drop(state);

        match result {
            Ok(outcome) => {
                match &outcome {
                    GenerationOutcome::Written(output) => {
                        self.inner.analyzer.update_content(source, content);
                        self.emit(GenerationEvent::Generated {
                            source: source.to_path_buf(),
                            output: output.clone(),
                        });
                    }
                    GenerationOutcome::Unchanged(output) => {
                        self.inner.analyzer.update_content(source, content);
                        self.emit(GenerationEvent::Unchanged {
                            source: source.to_path_buf(),
                            output: output.clone(),
                        });
                    }
                    GenerationOutcome::Skipped(reason) => {
                        self.emit(GenerationEvent::Skipped {
                            source: source.to_path_buf(),
                            reason: reason.clone(),
                        });
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                self.report_failure(source, &e, mode);
                Err(e)
            }
        }
    }

    fn gate(&self, source: &Path) -> Arc<Mutex<GateState>> {
        self.inner
            .gates
            .entry(source.to_path_buf())
            .or_default()
            .clone()
    }

    fn deletion_epoch(&self, source: &Path) -> u64 {
        self.inner.deletions.get(source).map_or(0, |epoch| *epoch)
    }

    fn skipped(&self, source: &Path, reason: SkipReason) -> GenerationOutcome {
        debug!("Skipping generation of {}: {:?}", source.display(), reason);
        self.emit(GenerationEvent::Skipped {
            source: source.to_path_buf(),
            reason: reason.clone(),
        });
        GenerationOutcome::Skipped(reason)
    }

    fn report_failure(&self, source: &Path, e: &AtomicError, mode: GenerationMode) {
        let message = e.to_string();
        match mode {
            GenerationMode::Manual => error!("Generation of {} failed: {}", source.display(), message),
            GenerationMode::Auto => warn!("Auto generation of {} failed: {}", source.display(), message),
        }

        self.emit(GenerationEvent::Failed {
            source: source.to_path_buf(),
            message: message.clone(),
        });

        if mode == GenerationMode::Auto && self.inner.settings.show_notifications {
            self.emit(GenerationEvent::Notification {
                source: source.to_path_buf(),
                message,
            });
        }
    }

    async fn run_generation(
        &self,
        source: &Path,
        content: &str,
        mode: GenerationMode,
    ) -> Result<GenerationOutcome> {
        let mut data = parse_file_data(content)?;
        data.file_path = Some(source.to_path_buf());

        let missing = validation::missing_fields(&data);
        if !missing.is_empty() {
            return Err(AtomicError::MissingFields(missing));
        }

        if !self.inner.oracle.is_ready() {
            match mode {
                GenerationMode::Manual => return Err(AtomicError::OracleNotReady),
                GenerationMode::Auto => {
                    self.inner.deferred.insert(source.to_path_buf());
                    return Ok(GenerationOutcome::Skipped(SkipReason::OracleNotReady));
                }
            }
        }

        let config = map_to_config(&data)?;
        let project = self.project_for(source, config.solution.as_deref()).await?;
        let context = project.as_ref().map(ProjectContext::from_handle).unwrap_or_default();

        let report = validation::validate(&data, &self.inner.oracle, &context).await;
        if report.is_blocking() {
            let messages = report.errors().map(|d| d.message.clone()).collect();
            return Err(AtomicError::Validation(messages));
        }
        if report.is_inconclusive() {
            self.schedule_revalidation(source, data.clone(), context.clone());
        }

        let text = generate_source(&config)?;
        let output = self.resolve_output(source, &config, project.as_ref())?;

        let existing = self.inner.writer.read_file(&output).await?;
        if existing.is_none() {
            if mode == GenerationMode::Auto {
                return Ok(GenerationOutcome::Skipped(SkipReason::OutputMissing(output)));
            }
            if let Some(handle) = project.as_ref().filter(|p| !p.writable) {
                return Err(AtomicError::resolution(format!(
                    "Project '{}' is not writable, cannot create {}",
                    handle.name,
                    output.display()
                )));
            }
        }

        let text = normalize_line_endings(&text, existing.as_deref());
        let outcome = if existing.as_deref() == Some(text.as_str()) {
            debug!("{} is up to date", output.display());
            GenerationOutcome::Unchanged(output.clone())
        } else {
            self.write_with_retry(&output, &text).await?;
            info!("Generated {} from {}", output.display(), source.display());
            GenerationOutcome::Written(output.clone())
        };

        let placed = self
            .inner
            .tracker
            .has_output_changed(source, config.directory.as_deref(), &config.class_name)
            .await;
        let written = matches!(outcome, GenerationOutcome::Written(_));
        if placed && written && self.inner.settings.show_notifications {
            self.emit(GenerationEvent::Notification {
                source: source.to_path_buf(),
                message: format!("Generated {}", output.display()),
            });
        }

        self.retire_stale_output(source, &output).await;

        self.inner
            .tracker
            .track(GeneratedFileInfo::new(
                source,
                &output,
                config.directory.clone(),
                config.class_name.clone(),
            ))
            .await?;

        Ok(outcome)
    }

    async fn write_with_retry(&self, output: &Path, text: &str) -> Result<()> {
        match self.inner.writer.write_file(output, text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Write to {} failed, retrying once: {}", output.display(), e);
                sleep(self.inner.settings.write_retry_delay()).await;
                self.inner.writer.write_file(output, text).await
            }
        }
    }

    /// Delete the previously generated file when the output moved
    async fn retire_stale_output(&self, source: &Path, output: &Path) {
        let Some(previous) = self.inner.tracker.get(source).await else {
            return;
        };
        let stale = &previous.generated_file_path;
        if paths_equal_ignore_case(stale, output) {
            return;
        }

        match self.inner.writer.read_file(stale).await {
            Ok(Some(text)) if is_generated_text(&text) => {
                match self.inner.writer.delete_file(stale).await {
                    Ok(_) => info!("Removed stale output {}", stale.display()),
                    Err(e) => warn!("Could not remove stale output {}: {}", stale.display(), e),
                }
            }
            Ok(Some(_)) => warn!(
                "Not removing {}: it no longer looks generated",
                stale.display()
            ),
            Ok(None) => {}
            Err(e) => warn!("Could not read stale output {}: {}", stale.display(), e),
        }
    }

    async fn project_for(&self, source: &Path, solution: Option<&str>) -> Result<Option<ProjectHandle>> {
        let dir = source.parent().ok_or_else(|| {
            AtomicError::resolution(format!("{} has no parent directory", source.display()))
        })?;
        self.inner.locator.resolve_project(dir, solution).await
    }

    fn resolve_output(
        &self,
        source: &Path,
        config: &CanonicalConfig,
        project: Option<&ProjectHandle>,
    ) -> Result<PathBuf> {
        let writer = &self.inner.writer;
        let content_root = match project {
            Some(_) => None,
            None => self
                .inner
                .resolver
                .find_content_root(source, |dir| writer.is_dir(dir)),
        };

        self.inner.resolver.resolve(&OutputRequest {
            directory: config.directory.as_deref(),
            class_name: &config.class_name,
            source_file: source,
            project_root: project.map(|p| p.root.as_path()),
            content_root: content_root.as_deref(),
        })
    }

    /// Where `content` generates to, preferring the tracked location
    pub async fn generated_path(&self, source: &Path, content: &str) -> Result<PathBuf> {
        if let Some(info) = self.inner.tracker.get(source).await {
            return Ok(info.generated_file_path);
        }
        let config = map_to_config(&parse_file_data(content)?)?;
        let project = self.project_for(source, config.solution.as_deref()).await?;
        self.resolve_output(source, &config, project.as_ref())
    }

    /// Full validation for editor feedback. Inconclusive oracle answers
    /// schedule a background retry that emits `Revalidated`.
    pub async fn validate(&self, source: &Path, content: &str) -> Result<ValidationReport> {
        let mut data = parse_file_data(content)?;
        data.file_path = Some(source.to_path_buf());

        let solution = map_to_config(&data).ok().and_then(|c| c.solution);
        let context = self
            .project_for(source, solution.as_deref())
            .await?
            .as_ref()
            .map(ProjectContext::from_handle)
            .unwrap_or_default();

        let report = validation::validate(&data, &self.inner.oracle, &context).await;
        if report.is_inconclusive() {
            self.schedule_revalidation(source, data, context);
        }
        Ok(report)
    }

    fn schedule_revalidation(&self, source: &Path, data: AtomicFileData, context: ProjectContext) {
        self.inner.oracle.register_for_recheck(source);

        let this = self.clone();
        let source = source.to_path_buf();
        tokio::spawn(async move {
            let oracle = &this.inner.oracle;
            if timeout(RECHECK_BUDGET, oracle.wait_ready()).await.is_err() {
                debug!("Oracle still not ready, {} stays queued", source.display());
                return;
            }

            let report = validation::validate_within(&data, oracle, &context, RECHECK_BUDGET).await;
            debug!(
                "Re-validated {}: {} error(s), {} inconclusive",
                source.display(),
                report.errors().count(),
                report.inconclusive.len()
            );
            this.emit(GenerationEvent::Revalidated { source, report });
        });
    }

    /// Mark the oracle ready, re-validate files that were waiting on it and
    /// schedule the auto generations it held back. Returns the re-validated paths.
    pub async fn on_oracle_ready(&self) -> Vec<PathBuf> {
        let rechecks = self.inner.oracle.mark_ready();

        for source in &rechecks {
            let content = match self.inner.writer.read_file(source).await {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Could not read {} for re-validation: {}", source.display(), e);
                    continue;
                }
            };
            match self.validate(source, &content).await {
                Ok(report) => self.emit(GenerationEvent::Revalidated {
                    source: source.clone(),
                    report,
                }),
                Err(e) => debug!("Re-validation of {} failed: {}", source.display(), e),
            }
        }

        let deferred: Vec<PathBuf> = self.inner.deferred.iter().map(|p| p.key().clone()).collect();
        for source in deferred {
            self.inner.deferred.remove(&source);
            if let Ok(Some(content)) = self.inner.writer.read_file(&source).await {
                self.schedule(&source, &content);
            }
        }

        rechecks
    }

    /// Forget a deleted `.atomic` file. Returns the generated file removed
    /// along with it, if any.
    ///
    /// Waits for a generation already running for `source`; requests queued
    /// behind it are dropped.
    pub async fn on_source_deleted(&self, source: &Path) -> Result<Option<PathBuf>> {
        self.cancel_pending(source);
        self.inner.analyzer.forget(source);
        self.inner.deferred.remove(source);

        let gate = self.gate(source);
        let _state = gate.lock().await;
        *self.inner.deletions.entry(source.to_path_buf()).or_default() += 1;

        let Some(info) = self.inner.tracker.remove(source).await? else {
            return Ok(None);
        };

        if !self.inner.settings.delete_on_source_removal {
            return Ok(None);
        }

        let output = info.generated_file_path;
        if self.inner.writer.delete_file(&output).await? {
            info!("Deleted {} after its source was removed", output.display());
            Ok(Some(output))
        } else {
            Ok(None)
        }
    }

    /// Drop tracking for sources that no longer exist, deleting their
    /// outputs when configured to. Returns the orphaned sources.
    pub async fn cleanup_orphans(&self) -> Result<Vec<PathBuf>> {
        let orphans = self.inner.tracker.orphans(self.inner.writer.as_ref()).await;

        let mut sources = Vec::with_capacity(orphans.len());
        for info in orphans {
            let source = info.atomic_file_path;
            debug!("{} no longer exists, cleaning up", source.display());
            self.on_source_deleted(&source).await?;
            sources.push(source);
        }

        if !sources.is_empty() {
            info!("Cleaned up {} orphaned generated file record(s)", sources.len());
        }
        Ok(sources)
    }

    /// Type completions for a source file's editor
    pub async fn complete_types(
        &self,
        source: &Path,
        prefix: &str,
        imports: &[String],
        namespace_filter: Option<&str>,
    ) -> Vec<TypeCompletion> {
        let context = match self.project_for(source, None).await {
            Ok(project) => project.as_ref().map(ProjectContext::from_handle).unwrap_or_default(),
            Err(_) => ProjectContext::default(),
        };
        self.inner
            .oracle
            .complete_types(prefix, imports, &context, namespace_filter)
            .await
    }
}
