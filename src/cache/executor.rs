//! Bounded concurrent execution of per-entry work
//!
//! Each phase (fetch, populate, remove, merge) is a batch of independent
//! units. At most `workers` units run at once; the phase returns when every
//! scheduled unit has finished. A failing unit is logged and counted, never
//! propagated to its siblings.

use crate::cache::cancel::CancelToken;
use crate::error::{ArtcacheError, ArtcacheResult};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Stage of a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Populate,
    Remove,
    Merge,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "Fetching",
            Self::Populate => "Copying",
            Self::Remove => "Removing",
            Self::Merge => "Merging",
        };
        write!(f, "{}", name)
    }
}

/// Receives progress notifications from the executor
pub trait ProgressSink: Send + Sync {
    fn phase_started(&self, phase: Phase, total: usize);
    fn unit_finished(&self, phase: Phase, key: &str, ok: bool);
    fn phase_finished(&self, phase: Phase);
}

/// A unit that returned an error
#[derive(Debug)]
pub struct UnitFailure {
    pub key: String,
    pub error: ArtcacheError,
}

/// Results of one phase
#[derive(Debug)]
pub struct PhaseOutcome<T> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<UnitFailure>,
}

impl<T> Default for PhaseOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Worker pool shared by all phases of a pass
#[derive(Clone)]
pub struct Executor {
    workers: usize,
    cancel: CancelToken,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl Executor {
    pub fn new(workers: usize, cancel: CancelToken) -> Self {
        Self {
            workers: workers.max(1),
            cancel,
            progress: None,
        }
    }

    /// Report progress to `sink`
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Fail with `Interrupted` if cancellation was requested
    pub fn check_cancelled(&self) -> ArtcacheResult<()> {
        if self.cancel.is_cancelled() {
            Err(ArtcacheError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Run `units` with bounded concurrency
    ///
    /// Cancellation is observed before each unit is scheduled. Units already
    /// running are awaited, then the phase returns `Interrupted`.
    pub async fn run<T, F>(&self, phase: Phase, units: Vec<(String, F)>) -> ArtcacheResult<PhaseOutcome<T>>
    where
        T: Send + 'static,
        F: Future<Output = ArtcacheResult<T>> + Send + 'static,
    {
        let mut outcome = PhaseOutcome::default();
        if units.is_empty() {
            return Ok(outcome);
        }

        debug!("{}: {} unit(s), {} worker(s)", phase, units.len(), self.workers);
        if let Some(ref progress) = self.progress {
            progress.phase_started(phase, units.len());
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut join_set = JoinSet::new();
        let mut interrupted = false;

        for (key, unit) in units {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ArtcacheError::Internal(format!("worker pool closed: {}", e)))?;
            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            join_set.spawn(async move {
                let _permit = permit;
                (key, unit.await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let (key, result) = match joined {
                Ok(done) => done,
                Err(e) => (
                    "<unknown>".to_string(),
                    Err(ArtcacheError::Internal(format!("worker task failed: {}", e))),
                ),
            };
            if let Some(ref progress) = self.progress {
                progress.unit_finished(phase, &key, result.is_ok());
            }
            match result {
                Ok(value) => outcome.succeeded.push((key, value)),
                Err(error) => {
                    warn!("{} {} failed: {}", phase, key, error);
                    outcome.failed.push(UnitFailure { key, error });
                }
            }
        }

        if let Some(ref progress) = self.progress {
            progress.phase_finished(phase);
        }

        if interrupted {
            return Err(ArtcacheError::Interrupted);
        }
        Ok(outcome)
    }
}

/// Run blocking filesystem work on the blocking pool
pub async fn blocking<T, F>(work: F) -> ArtcacheResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ArtcacheResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ArtcacheError::Internal(format!("blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Unit = std::pin::Pin<Box<dyn Future<Output = ArtcacheResult<usize>> + Send>>;

    fn unit<F>(future: F) -> Unit
    where
        F: Future<Output = ArtcacheResult<usize>> + Send + 'static,
    {
        Box::pin(future)
    }

    fn ok_unit(value: usize) -> Unit {
        unit(async move { Ok(value) })
    }

    #[tokio::test]
    async fn runs_every_unit() {
        let executor = Executor::new(4, CancelToken::new());
        let units = (0..10).map(|i| (format!("k{}", i), ok_unit(i))).collect();

        let outcome = executor.run(Phase::Populate, units).await.unwrap();
        assert_eq!(outcome.succeeded.len(), 10);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn failure_does_not_abort_siblings() {
        let executor = Executor::new(2, CancelToken::new());
        let units: Vec<(String, Unit)> = vec![
            ("a".to_string(), ok_unit(1)),
            (
                "b".to_string(),
                unit(async { Err(ArtcacheError::Internal("boom".to_string())) }),
            ),
            ("c".to_string(), ok_unit(3)),
        ];

        let outcome = executor.run(Phase::Populate, units).await.unwrap();
        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].key, "b");
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let executor = Executor::new(2, CancelToken::new());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let units: Vec<(String, Unit)> = (0..8)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                let work = unit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                });
                (format!("k{}", i), work)
            })
            .collect();

        executor.run(Phase::Fetch, units).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancelled_pass_schedules_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let executor = Executor::new(2, cancel);
        let ran = Arc::new(AtomicUsize::new(0));

        let units: Vec<(String, Unit)> = (0..3)
            .map(|i| {
                let ran = ran.clone();
                let work = unit(async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                });
                (format!("k{}", i), work)
            })
            .collect();

        let err = executor.run(Phase::Populate, units).await.unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_mid_phase_lets_running_units_finish() {
        let cancel = CancelToken::new();
        let executor = Executor::new(1, cancel.clone());
        let finished = Arc::new(AtomicUsize::new(0));

        let units: Vec<(String, Unit)> = (0..4)
            .map(|i| {
                let cancel = cancel.clone();
                let finished = finished.clone();
                let work = unit(async move {
                    cancel.cancel();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                });
                (format!("k{}", i), work)
            })
            .collect();

        let err = executor.run(Phase::Populate, units).await.unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blocking_propagates_result() {
        assert_eq!(blocking(|| Ok(5)).await.unwrap(), 5);
        assert!(blocking::<(), _>(|| Err(ArtcacheError::Interrupted))
            .await
            .unwrap_err()
            .is_interrupted());
    }
}
