//! Batch dispatcher.
//!
//! Splits the mod list into contiguous batches, runs one tokio task per batch, and
//! collects one [`AnalysisResult`] per mod in manifest order. Each result is
//! written exactly once into a pre-sized slot indexed by manifest position, so the
//! only contended state is the progress counter.

use crate::classify::{Category, SideSupport};
use crate::config::{Config, HintPolicy};
use crate::constants::{MAX_WORKERS, MIN_WORKERS};
use crate::error::{CheckError, CheckResult};
use crate::manifest::ModDescriptor;
use crate::registry::{SideLookup, Throttle};
use futures_util::future::join_all;
use serde::Serialize;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Where the side support of a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportSource {
    /// Registry lookup.
    Registry,
    /// Side hints declared in the manifest.
    Manifest,
    /// Nothing could be resolved.
    None,
}

/// Outcome for a single mod.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub descriptor: ModDescriptor,
    pub support: SideSupport,
    pub category: Category,
    pub source: SupportSource,
    /// Failure detail when the registry lookup did not succeed.
    pub note: Option<String>,
}

/// Shared progress across workers.
#[derive(Debug)]
pub struct Progress {
    processed: AtomicUsize,
    total: usize,
}

/// Event emitted while dispatching.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// A worker picked up its batch.
    WorkerStarted { worker: usize, batch_len: usize },
    /// A worker finished one mod.
    ModFinished {
        worker: usize,
        label: String,
        category: Category,
        processed: usize,
        total: usize,
    },
    /// A worker returned, either done or cancelled.
    WorkerFinished { worker: usize, completed: usize },
}

/// Callback type for dispatch events.
pub type EventCallback = Arc<dyn Fn(DispatchEvent) + Send + Sync>;

/// Options for a dispatch run.
#[derive(Clone)]
pub struct DispatchOptions {
    /// Number of workers (1 to 10).
    pub workers: usize,

    /// Minimum delay between two lookups of the same worker.
    pub request_delay: Duration,

    /// Precedence between manifest hints and registry lookups.
    pub hint_policy: HintPolicy,

    /// Cancelling stops new lookups; in-flight lookups still complete.
    pub cancel: CancellationToken,

    /// Observer for progress events.
    pub on_event: Option<EventCallback>,
}

/// Results of a dispatch run.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Completed results, in manifest order.
    pub results: Vec<AnalysisResult>,
    /// Mods never started because the run was cancelled.
    pub skipped: usize,
    /// Whether cancellation was requested.
    pub cancelled: bool,
}

struct WorkerContext {
    mods: Arc<Vec<ModDescriptor>>,
    slots: Arc<Vec<OnceLock<AnalysisResult>>>,
    progress: Arc<Progress>,
    lookup: Arc<dyn SideLookup>,
    options: DispatchOptions,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SupportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportSource::Registry => "registry",
            SupportSource::Manifest => "manifest",
            SupportSource::None => "none",
        }
    }
}

impl AnalysisResult {
    /// Result resolved from a support record.
    pub fn resolved(descriptor: ModDescriptor, support: SideSupport, source: SupportSource) -> Self {
        Self {
            category: support.category(),
            descriptor,
            support,
            source,
            note: None,
        }
    }

    /// Result for a mod whose lookup failed and no hint applies.
    pub fn failed(descriptor: ModDescriptor, note: impl Into<String>) -> Self {
        Self {
            descriptor,
            support: SideSupport::unknown(),
            category: Category::Unknown,
            source: SupportSource::None,
            note: Some(note.into()),
        }
    }

    /// Combine a lookup outcome with the hint policy.
    pub fn from_lookup(
        descriptor: &ModDescriptor,
        lookup: CheckResult<SideSupport>,
        policy: HintPolicy,
    ) -> Self {
        match lookup {
            Ok(support) => Self::resolved(descriptor.clone(), support, SupportSource::Registry),
            Err(e) => match (policy, descriptor.hints) {
                (HintPolicy::Fallback, Some(hints))
                    if hints.is_complete() && e.is_recoverable() =>
                {
                    let mut result =
                        Self::resolved(descriptor.clone(), hints, SupportSource::Manifest);
                    result.note = Some(e.to_string());
                    result
                }
                _ => Self::failed(descriptor.clone(), e.to_string()),
            },
        }
    }

    /// Result taken from manifest hints without a lookup, when the policy allows it.
    pub fn from_hints(descriptor: &ModDescriptor, policy: HintPolicy) -> Option<Self> {
        match (policy, descriptor.hints) {
            (HintPolicy::Prefer, Some(hints)) if hints.is_complete() => Some(Self::resolved(
                descriptor.clone(),
                hints,
                SupportSource::Manifest,
            )),
            _ => None,
        }
    }
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            processed: AtomicUsize::new(0),
            total,
        }
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed())
    }

    /// Count one more processed mod, returning the new total processed.
    fn advance(&self) -> usize {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl DispatchOptions {
    /// Options derived from the configuration with the given worker count.
    pub fn from_config(config: &Config, workers: usize) -> Self {
        Self {
            workers,
            request_delay: config.request_delay(),
            hint_policy: config.api.side_hints,
            cancel: CancellationToken::new(),
            on_event: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, on_event: EventCallback) -> Self {
        self.on_event = Some(on_event);
        self
    }

    fn emit(&self, event: DispatchEvent) {
        if let Some(ref cb) = self.on_event {
            cb(event);
        }
    }
}

impl DispatchOutcome {
    /// Number of results per category.
    pub fn count(&self, category: Category) -> usize {
        self.results
            .iter()
            .filter(|r| r.category == category)
            .count()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Check that `workers` is within the accepted range.
pub fn validate_workers(workers: usize) -> CheckResult<usize> {
    if (MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
        Ok(workers)
    } else {
        Err(CheckError::InvalidWorkerCount(workers))
    }
}

/// Split `len` items into `workers` contiguous ranges of near-equal size.
///
/// The first `len % workers` ranges get one extra item. When `len < workers` the
/// trailing ranges are empty.
pub fn partition(len: usize, workers: usize) -> CheckResult<Vec<Range<usize>>> {
    let workers = validate_workers(workers)?;
    let base = len / workers;
    let extra = len % workers;

    let mut start = 0;
    let ranges = (0..workers)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect();

    Ok(ranges)
}

/// Resolve every mod with `lookup`, using `options.workers` concurrent workers.
pub async fn dispatch(
    mods: Vec<ModDescriptor>,
    lookup: Arc<dyn SideLookup>,
    options: DispatchOptions,
) -> CheckResult<DispatchOutcome> {
    let total = mods.len();
    let ranges = partition(total, options.workers)?;

    tracing::info!(
        "dispatching {} mods across {} workers",
        total,
        options.workers
    );

    let mods = Arc::new(mods);
    let slots: Arc<Vec<OnceLock<AnalysisResult>>> =
        Arc::new((0..total).map(|_| OnceLock::new()).collect());
    let progress = Arc::new(Progress::new(total));

    let handles: Vec<_> = ranges
        .into_iter()
        .enumerate()
        .map(|(worker, range)| {
            let ctx = WorkerContext {
                mods: Arc::clone(&mods),
                slots: Arc::clone(&slots),
                progress: Arc::clone(&progress),
                lookup: Arc::clone(&lookup),
                options: options.clone(),
            };
            tokio::spawn(run_worker(ctx, worker, range))
        })
        .collect();

    for joined in join_all(handles).await {
        joined.map_err(|e| CheckError::Generic(format!("Worker task failed: {}", e)))?;
    }

    let results: Vec<AnalysisResult> = slots.iter().filter_map(|s| s.get().cloned()).collect();
    let skipped = total - results.len();
    let cancelled = options.cancel.is_cancelled();

    if cancelled {
        tracing::info!(
            "cancelled after {} of {} mods ({} skipped)",
            results.len(),
            total,
            skipped
        );
    }

    Ok(DispatchOutcome {
        results,
        skipped,
        cancelled,
    })
}

async fn run_worker(ctx: WorkerContext, worker: usize, range: Range<usize>) {
    let options = &ctx.options;
    options.emit(DispatchEvent::WorkerStarted {
        worker,
        batch_len: range.len(),
    });

    let mut throttle = Throttle::new(options.request_delay);
    let mut completed = 0;

    for index in range {
        if options.cancel.is_cancelled() {
            break;
        }

        let descriptor = &ctx.mods[index];
        let result = match AnalysisResult::from_hints(descriptor, options.hint_policy) {
            Some(result) => result,
            None => {
                tokio::select! {
                    _ = options.cancel.cancelled() => break,
                    _ = throttle.wait() => {}
                }
                let lookup = ctx.lookup.lookup(descriptor).await;
                if let Err(ref e) = lookup {
                    tracing::warn!("worker {}: {}", worker, e);
                }
                AnalysisResult::from_lookup(descriptor, lookup, options.hint_policy)
            }
        };

        let category = result.category;
        let label = descriptor.filename.clone();
        if ctx.slots[index].set(result).is_err() {
            tracing::error!("result slot {} written twice", index);
        }
        completed += 1;

        let processed = ctx.progress.advance();
        options.emit(DispatchEvent::ModFinished {
            worker,
            label,
            category,
            processed,
            total: ctx.progress.total(),
        });
    }

    tracing::debug!(
        "worker {} finished: {} done, {} remaining overall",
        worker,
        completed,
        ctx.progress.remaining()
    );
    options.emit(DispatchEvent::WorkerFinished { worker, completed });
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Support::*;
    use crate::registry::RegistryClient;
    use crate::testing::{FakeLookup, descriptors, spawn_registry};
    use std::sync::Mutex;

    fn options(workers: usize) -> DispatchOptions {
        DispatchOptions {
            workers,
            request_delay: Duration::ZERO,
            hint_policy: HintPolicy::Ignore,
            cancel: CancellationToken::new(),
            on_event: None,
        }
    }

    #[test]
    fn test_partition_properties() {
        for len in 0..=50 {
            for workers in 1..=10 {
                let ranges = partition(len, workers).unwrap();
                assert_eq!(ranges.len(), workers);
                assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), len);

                // Contiguous and disjoint.
                let mut next = 0;
                for r in &ranges {
                    assert_eq!(r.start, next);
                    next = r.end;
                }

                let max = ranges.iter().map(|r| r.len()).max().unwrap();
                let min = ranges.iter().map(|r| r.len()).min().unwrap();
                assert!(max - min <= 1, "len={len} workers={workers}");
            }
        }
    }

    #[test]
    fn test_partition_remainder_goes_first() {
        let ranges = partition(10, 4).unwrap();
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_partition_rejects_worker_count() {
        assert!(matches!(
            partition(5, 0),
            Err(CheckError::InvalidWorkerCount(0))
        ));
        assert!(matches!(
            partition(5, 11),
            Err(CheckError::InvalidWorkerCount(11))
        ));
    }

    #[tokio::test]
    async fn test_one_result_per_mod_in_order() {
        let ids: Vec<String> = (0..23).map(|i| format!("mod{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut lookup = FakeLookup::new().with_delay(Duration::from_millis(2));
        for (i, id) in ids.iter().enumerate() {
            lookup = if i % 3 == 0 {
                lookup.with(id, Required, Required)
            } else {
                lookup.with(id, Required, Unsupported)
            };
        }
        let lookup = Arc::new(lookup);

        let outcome = dispatch(descriptors(&id_refs), lookup.clone(), options(4))
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 23);
        assert_eq!(outcome.skipped, 0);
        assert!(!outcome.cancelled);
        assert_eq!(lookup.calls(), 23);
        for (i, result) in outcome.results.iter().enumerate() {
            assert_eq!(result.descriptor.index, i);
            assert_eq!(result.descriptor.project_id.as_deref(), Some(ids[i].as_str()));
        }
        assert_eq!(outcome.count(Category::Both), 8);
        assert_eq!(outcome.count(Category::Client), 15);
    }

    #[tokio::test]
    async fn test_duplicates_are_each_resolved() {
        let lookup = Arc::new(FakeLookup::new().with("dup", Required, Required));
        let outcome = dispatch(descriptors(&["dup", "dup", "dup"]), lookup.clone(), options(2))
            .await
            .unwrap();
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(lookup.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_manifest() {
        let outcome = dispatch(Vec::new(), Arc::new(FakeLookup::new()), options(10))
            .await
            .unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.skipped, 0);
    }

    #[tokio::test]
    async fn test_failed_lookup_becomes_unknown() {
        let lookup = Arc::new(
            FakeLookup::new()
                .with("a", Required, Unsupported)
                .with("c", Unsupported, Required),
        );
        let outcome = dispatch(descriptors(&["a", "b", "c"]), lookup, options(3))
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 3);
        let b = &outcome.results[1];
        assert_eq!(b.category, Category::Unknown);
        assert_eq!(b.source, SupportSource::None);
        assert!(b.note.as_deref().unwrap().contains("HTTP 404"));
        assert_eq!(outcome.results[0].category, Category::Client);
        assert_eq!(outcome.results[2].category, Category::Server);
    }

    #[tokio::test]
    async fn test_timeout_for_one_of_five_does_not_abort() {
        let url = spawn_registry().await;
        let client =
            RegistryClient::build(&url, "test-agent/1.0", Duration::from_secs(1)).unwrap();
        let mods = descriptors(&["a", "slow", "server-b", "both-c", "d"]);

        let outcome = dispatch(mods, Arc::new(client), options(2)).await.unwrap();

        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.count(Category::Unknown), 1);
        assert_eq!(outcome.results[1].category, Category::Unknown);
        assert_eq!(
            outcome.results.len() - outcome.count(Category::Unknown),
            4
        );
    }

    #[tokio::test]
    async fn test_cancel_returns_partial_results() {
        let ids: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut lookup = FakeLookup::new().with_delay(Duration::from_millis(20));
        for id in &ids {
            lookup = lookup.with(id, Optional, Optional);
        }

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let on_event: EventCallback = Arc::new(move |event: DispatchEvent| {
            if let DispatchEvent::ModFinished { processed, .. } = event {
                if processed >= 3 {
                    trigger.cancel();
                }
            }
        });

        let opts = options(2).with_cancel(cancel).with_events(on_event);
        let outcome = dispatch(descriptors(&id_refs), Arc::new(lookup), opts)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.results.len() >= 3);
        assert!(outcome.results.len() < 20);
        assert_eq!(outcome.results.len() + outcome.skipped, 20);

        // Partial results keep manifest order.
        let indices: Vec<usize> = outcome.results.iter().map(|r| r.descriptor.index).collect();
        let mut sorted = indices.clone();
        sorted.sort();
        assert_eq!(indices, sorted);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let events: Arc<Mutex<Vec<DispatchEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let on_event: EventCallback =
            Arc::new(move |event: DispatchEvent| sink.lock().unwrap().push(event));

        let lookup = Arc::new(
            FakeLookup::new()
                .with("a", Required, Required)
                .with("b", Required, Required)
                .with("c", Required, Required),
        );
        let outcome = dispatch(
            descriptors(&["a", "b", "c"]),
            lookup,
            options(2).with_events(on_event),
        )
        .await
        .unwrap();
        assert_eq!(outcome.results.len(), 3);

        let events = events.lock().unwrap();
        let started = events
            .iter()
            .filter(|e| matches!(e, DispatchEvent::WorkerStarted { .. }))
            .count();
        let finished: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                DispatchEvent::ModFinished { processed, .. } => Some(*processed),
                _ => None,
            })
            .collect();
        assert_eq!(started, 2);
        let mut sorted = finished.clone();
        sorted.sort();
        assert_eq!(sorted, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_prefer_policy_skips_lookup() {
        let mut mods = descriptors(&["a", "b"]);
        mods[0].hints = Some(SideSupport::new(Unsupported, Required));
        mods[1].hints = Some(SideSupport::new(Required, Unknown));
        let lookup = Arc::new(FakeLookup::new().with("b", Required, Required));

        let mut opts = options(1);
        opts.hint_policy = HintPolicy::Prefer;
        let outcome = dispatch(mods, lookup.clone(), opts).await.unwrap();

        assert_eq!(lookup.seen(), vec!["b".to_string()]);
        assert_eq!(outcome.results[0].category, Category::Server);
        assert_eq!(outcome.results[0].source, SupportSource::Manifest);
        assert_eq!(outcome.results[1].category, Category::Both);
        assert_eq!(outcome.results[1].source, SupportSource::Registry);
    }

    #[tokio::test]
    async fn test_fallback_policy_uses_hints_on_failure() {
        let mut mods = descriptors(&["a", "b"]);
        mods[0].hints = Some(SideSupport::new(Required, Unsupported));
        mods[1].hints = Some(SideSupport::new(Required, Unsupported));
        let lookup = Arc::new(FakeLookup::new().with("b", Required, Required));

        let mut opts = options(1);
        opts.hint_policy = HintPolicy::Fallback;
        let outcome = dispatch(mods, lookup, opts).await.unwrap();

        let a = &outcome.results[0];
        assert_eq!(a.category, Category::Client);
        assert_eq!(a.source, SupportSource::Manifest);
        assert!(a.note.is_some());
        assert_eq!(outcome.results[1].category, Category::Both);
    }

    #[tokio::test]
    async fn test_fallback_skips_partial_hints() {
        let mut mods = descriptors(&["a"]);
        mods[0].hints = Some(SideSupport::new(Required, Unknown));

        let mut opts = options(1);
        opts.hint_policy = HintPolicy::Fallback;
        let outcome = dispatch(mods, Arc::new(FakeLookup::new()), opts)
            .await
            .unwrap();

        let a = &outcome.results[0];
        assert_eq!(a.category, Category::Unknown);
        assert_eq!(a.source, SupportSource::None);
        assert!(a.note.is_some());
    }

    #[test]
    fn test_fallback_only_for_lookup_failures() {
        let mut d = descriptors(&["a"]).remove(0);
        d.hints = Some(SideSupport::new(Required, Unsupported));

        let result = AnalysisResult::from_lookup(
            &d,
            Err(CheckError::Generic("broken client".into())),
            HintPolicy::Fallback,
        );
        assert_eq!(result.category, Category::Unknown);
        assert_eq!(result.source, SupportSource::None);
    }

    #[tokio::test]
    async fn test_ignore_policy_never_uses_hints() {
        let mut mods = descriptors(&["a"]);
        mods[0].hints = Some(SideSupport::new(Required, Unsupported));
        let outcome = dispatch(mods, Arc::new(FakeLookup::new()), options(1))
            .await
            .unwrap();
        assert_eq!(outcome.results[0].category, Category::Unknown);
    }

    #[tokio::test]
    async fn test_request_delay_applies_per_worker() {
        let lookup = Arc::new(
            FakeLookup::new()
                .with("a", Required, Required)
                .with("b", Required, Required)
                .with("c", Required, Required)
                .with("d", Required, Required),
        );
        let mut opts = options(2);
        opts.request_delay = Duration::from_millis(80);

        let start = std::time::Instant::now();
        dispatch(descriptors(&["a", "b", "c", "d"]), lookup, opts)
            .await
            .unwrap();
        let elapsed = start.elapsed();

        // Two lookups per worker: one delay each, run side by side.
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_millis(160 + 500));
    }
}
