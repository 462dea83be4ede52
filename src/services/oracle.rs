//! Readiness-gated wrapper around a [`TypeOracle`].
//!
//! The oracle behind this service is usually a language server that needs
//! time to index. Until it has answered once, queries are inconclusive and
//! the files that asked are remembered so they can be re-validated.

use crate::error::{AtomicError, Result};
use crate::services::{
    NamespaceValidation, ProjectContext, TypeCompletion, TypeOracle, TypeValidation,
};
use dashmap::DashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Delay between readiness probes
pub const PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Type used to probe readiness
const PROBE_TYPE: &str = "string";

type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Run `query` within `budget`, turning an elapsed budget into a `Timeout` error
pub async fn timed<T>(
    budget: Duration,
    what: impl Into<String>,
    query: impl Future<Output = Result<T>>,
) -> Result<T> {
    timeout(budget, query)
        .await
        .map_err(|_| AtomicError::Timeout(what.into()))?
}

/// Timeouts are expected while the oracle is busy; anything else is worth a warning
fn inconclusive<T>(e: AtomicError) -> OracleAnswer<T> {
    match e {
        AtomicError::Timeout(_) => debug!("{}", e),
        _ => warn!("Oracle query failed: {}", e),
    }
    OracleAnswer::Inconclusive
}

/// Result of a time-boxed oracle query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleAnswer<T> {
    Answered(T),
    /// Timed out, failed, or the oracle is not ready. Neither valid nor invalid.
    Inconclusive,
}

impl<T> OracleAnswer<T> {
    pub fn answered(self) -> Option<T> {
        match self {
            Self::Answered(value) => Some(value),
            Self::Inconclusive => None,
        }
    }

    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Inconclusive)
    }
}

pub struct OracleService {
    oracle: Arc<dyn TypeOracle>,
    timeout: Duration,
    ready: watch::Sender<bool>,
    callbacks: Mutex<Vec<ReadyCallback>>,
    recheck: DashSet<PathBuf>,
}

impl std::fmt::Debug for OracleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleService")
            .field("timeout", &self.timeout)
            .field("ready", &self.is_ready())
            .field("pending_rechecks", &self.recheck.len())
            .finish()
    }
}

impl OracleService {
    pub fn new(oracle: Arc<dyn TypeOracle>, timeout: Duration) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            oracle,
            timeout,
            ready,
            callbacks: Mutex::new(Vec::new()),
            recheck: DashSet::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Flip to ready, run queued callbacks and hand back the files that
    /// asked while the oracle was unavailable.
    pub fn mark_ready(&self) -> Vec<PathBuf> {
        let was_ready = self.ready.send_replace(true);
        if !was_ready {
            info!("Type oracle is ready");
        }

        let callbacks = std::mem::take(
            &mut *self.callbacks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for callback in callbacks {
            callback();
        }

        self.drain_rechecks()
    }

    /// Resolve once the oracle is ready
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Run `callback` once the oracle is ready, immediately if it already is
    pub fn when_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_ready() {
            callback();
            return;
        }

        let mut callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        // Re-check under the lock so a concurrent mark_ready cannot strand it
        if self.is_ready() {
            drop(callbacks);
            callback();
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    pub fn register_for_recheck(&self, path: &Path) {
        if self.recheck.insert(path.to_path_buf()) {
            debug!("Queued {} for re-validation", path.display());
        }
    }

    pub fn pending_rechecks(&self) -> usize {
        self.recheck.len()
    }

    fn drain_rechecks(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.recheck.iter().map(|p| p.key().clone()).collect();
        for path in &paths {
            self.recheck.remove(path);
        }
        paths.sort();
        paths
    }

    /// Query the oracle with a known type until it answers, then mark ready.
    /// Returns the files queued for re-validation.
    pub async fn probe_until_ready(&self, project: &ProjectContext) -> Vec<PathBuf> {
        let mut attempt = 0u32;
        while !self.is_ready() {
            attempt += 1;
            let probe = self.oracle.validate_type(PROBE_TYPE, &[], project);
            match timed(self.timeout, "readiness probe", probe).await {
                Ok(_) => return self.mark_ready(),
                Err(e) => debug!("Readiness probe {} failed: {}", attempt, e),
            }
            sleep(PROBE_INTERVAL).await;
        }
        self.drain_rechecks()
    }

    pub async fn query_type(
        &self,
        name: &str,
        imports: &[String],
        project: &ProjectContext,
    ) -> OracleAnswer<TypeValidation> {
        self.query_type_within(name, imports, project, self.timeout).await
    }

    /// Like [`Self::query_type`] with an explicit budget, for background retries
    pub async fn query_type_within(
        &self,
        name: &str,
        imports: &[String],
        project: &ProjectContext,
        budget: Duration,
    ) -> OracleAnswer<TypeValidation> {
        if !self.is_ready() {
            return OracleAnswer::Inconclusive;
        }
        let query = self.oracle.validate_type(name, imports, project);
        match timed(budget, format!("type '{}'", name), query).await {
            Ok(validation) => OracleAnswer::Answered(validation),
            Err(e) => inconclusive(e),
        }
    }

    pub async fn query_namespace(
        &self,
        name: &str,
        project: &ProjectContext,
    ) -> OracleAnswer<NamespaceValidation> {
        self.query_namespace_within(name, project, self.timeout).await
    }

    pub async fn query_namespace_within(
        &self,
        name: &str,
        project: &ProjectContext,
        budget: Duration,
    ) -> OracleAnswer<NamespaceValidation> {
        if !self.is_ready() {
            return OracleAnswer::Inconclusive;
        }
        let query = self.oracle.validate_namespace(name, project);
        match timed(budget, format!("namespace '{}'", name), query).await {
            Ok(validation) => OracleAnswer::Answered(validation),
            Err(e) => inconclusive(e),
        }
    }

    /// Type completions for editor use; empty on timeout or failure
    pub async fn complete_types(
        &self,
        prefix: &str,
        imports: &[String],
        project: &ProjectContext,
        namespace_filter: Option<&str>,
    ) -> Vec<TypeCompletion> {
        let query = self
            .oracle
            .complete_types(prefix, imports, project, namespace_filter);
        match timed(self.timeout, format!("completions for '{}'", prefix), query).await {
            Ok(completions) => completions,
            Err(e) => {
                debug!("Type completion failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowOracle {
        delay: Duration,
    }

    #[async_trait]
    impl TypeOracle for SlowOracle {
        async fn validate_type(
            &self,
            name: &str,
            _imports: &[String],
            _project: &ProjectContext,
        ) -> Result<TypeValidation> {
            sleep(self.delay).await;
            Ok(TypeValidation::valid(name))
        }

        async fn complete_types(
            &self,
            _prefix: &str,
            _imports: &[String],
            _project: &ProjectContext,
            _namespace_filter: Option<&str>,
        ) -> Result<Vec<TypeCompletion>> {
            Err(AtomicError::OracleNotReady)
        }

        async fn validate_namespace(
            &self,
            _name: &str,
            _project: &ProjectContext,
        ) -> Result<NamespaceValidation> {
            sleep(self.delay).await;
            Ok(NamespaceValidation {
                is_valid: true,
                has_direct_types: true,
            })
        }
    }

    fn service(delay_ms: u64, timeout_ms: u64) -> OracleService {
        OracleService::new(
            Arc::new(SlowOracle {
                delay: Duration::from_millis(delay_ms),
            }),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_not_ready_is_inconclusive() {
        let service = service(0, 50);
        let answer = service.query_type("Vector3", &[], &ProjectContext::default()).await;
        assert!(answer.is_inconclusive());
    }

    #[tokio::test]
    async fn test_answers_once_ready() {
        let service = service(0, 50);
        service.mark_ready();
        let answer = service.query_type("Vector3", &[], &ProjectContext::default()).await;
        assert_eq!(answer.answered().and_then(|v| v.full_name).as_deref(), Some("Vector3"));
    }

    #[tokio::test]
    async fn test_timeout_is_inconclusive() {
        let service = service(200, 10);
        service.mark_ready();
        let project = ProjectContext::default();

        assert!(service.query_namespace("UnityEngine", &project).await.is_inconclusive());
        assert!(service
            .query_type_within("Vector3", &[], &project, Duration::from_secs(1))
            .await
            .answered()
            .is_some());
    }

    #[tokio::test]
    async fn test_timed_reports_timeout() {
        let slow = timed(Duration::from_millis(10), "type 'Vector3'", async {
            sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        match slow {
            Err(AtomicError::Timeout(what)) => assert_eq!(what, "type 'Vector3'"),
            other => panic!("expected a timeout, got {:?}", other),
        }

        let fast = timed(Duration::from_millis(200), "type 'Vector3'", async { Ok(7) }).await;
        assert_eq!(fast.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_completion_failure_is_empty() {
        let service = service(0, 50);
        service.mark_ready();
        assert!(service
            .complete_types("Vec", &[], &ProjectContext::default(), None)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_callbacks_and_rechecks_run_on_ready() {
        let service = service(0, 50);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        service.when_ready(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        service.register_for_recheck(Path::new("/proj/B.atomic"));
        service.register_for_recheck(Path::new("/proj/A.atomic"));
        service.register_for_recheck(Path::new("/proj/A.atomic"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let rechecks = service.mark_ready();
        assert_eq!(
            rechecks,
            vec![PathBuf::from("/proj/A.atomic"), PathBuf::from("/proj/B.atomic")]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.pending_rechecks(), 0);

        let counter = Arc::clone(&calls);
        service.when_ready(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_probe_marks_ready() {
        let service = service(0, 50);
        service.register_for_recheck(Path::new("/proj/A.atomic"));

        let rechecks = service.probe_until_ready(&ProjectContext::default()).await;

        assert!(service.is_ready());
        assert_eq!(rechecks, vec![PathBuf::from("/proj/A.atomic")]);
        service.wait_ready().await;
    }
}
