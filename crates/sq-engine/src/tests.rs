use crate::*;
use async_trait::async_trait;
use rand::Rng;
use sq_core::{
    CompressionPlan, CostClass, Document, PlanStep, Preset, QualityLevel, SqError, SqueezeConfig, StrategyError,
    StrategyId, StrategyParams, StrategyResult,
};
use sq_policy::default_policy_config;
use sq_profiler::sample::SamplePdf;
use sq_storage::{ArtifactHandle, DeletionScheduler, MemoryWorkingStorage, Scheduler, WorkingStorage};
use sq_strategy::{CancelFlag, Strategy, StrategyRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MB: usize = 1024 * 1024;

// ========== Fixtures ==========

#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Output is `input * bp / 10_000` bytes.
    Bp(u64),
    Fail,
    Sleep(Duration),
    Empty,
}

struct Stub {
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    timeout: Duration,
}

#[async_trait]
impl Strategy for Stub {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn cost_class(&self) -> CostClass {
        CostClass::Cheap
    }

    fn intrinsic_timeout(&self) -> Duration {
        self.timeout
    }

    async fn compress(
        &self,
        input: &Document,
        _params: &StrategyParams,
        _cancel: &CancelFlag,
    ) -> Result<Document, StrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Bp(bp) => {
                let len = input.size_bytes() * bp / 10_000;
                Ok(input.derive(vec![b'z'; len as usize]))
            }
            Behavior::Fail => Err(StrategyError::Process { code: Some(1), stderr: "boom".into() }),
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(input.derive(vec![1u8]))
            }
            Behavior::Empty => Ok(input.derive(Vec::new())),
        }
    }
}

#[derive(Default)]
struct Calls(HashMap<StrategyId, Arc<AtomicUsize>>);

impl Calls {
    fn get(&self, id: StrategyId) -> usize {
        self.0.get(&id).map(|c| c.load(Ordering::SeqCst)).unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.0.values().map(|c| c.load(Ordering::SeqCst)).sum()
    }
}

fn registry_with(behaviors: &[(StrategyId, Behavior)], timeout: Duration) -> (StrategyRegistry, Calls) {
    let mut registry = StrategyRegistry::new();
    let mut calls = Calls::default();
    for (id, behavior) in behaviors {
        let counter = Arc::new(AtomicUsize::new(0));
        calls.0.insert(*id, counter.clone());
        registry.register(*id, Arc::new(Stub { behavior: *behavior, calls: counter, timeout }));
    }
    (registry, calls)
}

fn all(behavior: Behavior) -> Vec<(StrategyId, Behavior)> {
    StrategyId::ALL.iter().map(|id| (*id, behavior)).collect()
}

/// Memory storage that remembers the most candidate artifacts ever held at once.
#[derive(Default)]
struct TrackingStorage {
    inner: MemoryWorkingStorage,
    peak_candidates: AtomicUsize,
    fail_puts: AtomicBool,
}

impl TrackingStorage {
    fn candidates(&self) -> Vec<String> {
        self.inner.keys().into_iter().filter(|k| !k.ends_with("_input.pdf")).collect()
    }
}

#[async_trait]
impl WorkingStorage for TrackingStorage {
    fn backend(&self) -> &'static str {
        "tracking"
    }

    async fn put(&self, key: &str, data: &[u8]) -> sq_core::Result<ArtifactHandle> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(SqError::Storage("disk full".into()));
        }
        let handle = self.inner.put(key, data).await?;
        self.peak_candidates.fetch_max(self.candidates().len(), Ordering::SeqCst);
        Ok(handle)
    }

    async fn get(&self, key: &str) -> sq_core::Result<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> sq_core::Result<()> {
        self.inner.remove(key).await
    }

    async fn exists(&self, key: &str) -> bool {
        self.inner.exists(key).await
    }
}

fn params() -> StrategyParams {
    StrategyParams::new(72, 45, Preset::Ebook)
}

fn step(strategy: StrategyId, timeout: Duration) -> PlanStep {
    PlanStep { strategy, params: params(), timeout }
}

fn three_step_plan() -> CompressionPlan {
    let t = Duration::from_secs(30);
    CompressionPlan::new(
        "test",
        vec![
            step(StrategyId::StreamOptimizer, t),
            step(StrategyId::AggressiveCodec, t),
            step(StrategyId::ImageRecode, t),
        ],
    )
    .unwrap()
}

fn doc(len: usize) -> Document {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(len, b'a');
    Document::new(bytes)
}

fn supervisor(registry: StrategyRegistry, storage: Arc<TrackingStorage>) -> Supervisor {
    Supervisor::new(registry, Evaluator::default(), storage)
}

fn outcomes(exec: &Execution) -> Vec<AttemptOutcome> {
    exec.attempts.iter().map(|a| a.outcome).collect()
}

// ========== Evaluator ==========

#[test]
fn test_evaluator_default_margin() {
    let e = Evaluator::default();
    assert!((e.margin() - 0.02).abs() < 1e-9);
    assert!(e.accept(10_000, 9_799));
    assert!(!e.accept(10_000, 9_800));
    assert!(!e.accept(10_000, 9_900));
    assert!(!e.accept(10_000, 10_000));
    assert!(!e.accept(10_000, 12_000));
}

#[test]
fn test_evaluator_zero_original_never_accepts() {
    assert!(!Evaluator::default().accept(0, 0));
}

#[test]
fn test_evaluator_margin_is_configurable() {
    assert!(Evaluator::new(0.0).accept(100, 99));
    assert!(!Evaluator::new(0.0).accept(100, 100));
    assert!(!Evaluator::new(0.05).accept(100, 97));
    assert!(Evaluator::new(0.05).accept(100, 94));
    assert!(!Evaluator::new(f64::NAN).accept(100, 100));
    assert!(!Evaluator::new(7.0).accept(100, 0));
}

#[test]
fn test_evaluator_margin_property() {
    let e = Evaluator::default();
    let mut rng = rand::thread_rng();
    for _ in 0..10_000 {
        let original: u64 = rng.gen_range(1..50_000_000);
        let candidate: u64 = rng.gen_range(0..original * 2);
        let accepted = e.accept(original, candidate);
        // candidate < original * 0.98, exactly.
        let expected = (candidate as u128) * 50 < (original as u128) * 49;
        assert_eq!(accepted, expected, "{original} -> {candidate}");
    }
}

#[test]
fn test_reduction_pct() {
    assert_eq!(reduction_pct(0, 10), 0.0);
    assert!((reduction_pct(200, 50) - 75.0).abs() < 1e-9);
    assert!(reduction_pct(100, 120) < 0.0);
}

// ========== Supervisor ==========

#[tokio::test]
async fn test_first_accepted_candidate_stops_plan() {
    let (registry, calls) = registry_with(&all(Behavior::Bp(5_000)), Duration::from_secs(60));
    let storage = Arc::new(TrackingStorage::default());
    let original = doc(10_000);
    let exec = supervisor(registry, storage.clone())
        .execute("r1", &original, &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert!(exec.effective);
    assert_eq!(exec.strategy_used, Some(StrategyId::StreamOptimizer));
    assert_eq!(exec.document.size_bytes(), 5_000);
    assert_eq!(outcomes(&exec), vec![AttemptOutcome::Accepted]);
    assert_eq!(calls.total(), 1);
    assert_eq!(exec.artifact.as_ref().unwrap().key, "r1_0_stream-optimizer.pdf");
    assert_eq!(storage.candidates(), vec!["r1_0_stream-optimizer.pdf".to_string()]);
}

#[tokio::test]
async fn test_all_strategies_fail_returns_original() {
    let (registry, calls) = registry_with(&all(Behavior::Fail), Duration::from_secs(60));
    let storage = Arc::new(TrackingStorage::default());
    let original = doc(4_000);
    let exec = supervisor(registry, storage.clone())
        .execute("r", &original, &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert!(!exec.effective);
    assert!(exec.document.same_content(&original));
    assert_eq!(exec.strategy_label(), "original");
    assert_eq!(outcomes(&exec), vec![AttemptOutcome::Failed; 3]);
    assert!(exec.attempts.iter().all(|a| a.error.as_deref().is_some_and(|e| e.contains("boom"))));
    assert_eq!(calls.total(), 3);
    assert!(exec.artifact.is_none());
    assert!(storage.inner.is_empty());
}

#[tokio::test]
async fn test_just_inside_margin_rejected_then_next_step() {
    let (registry, calls) = registry_with(
        &[
            (StrategyId::StreamOptimizer, Behavior::Bp(9_801)),
            (StrategyId::AggressiveCodec, Behavior::Bp(7_000)),
            (StrategyId::ImageRecode, Behavior::Bp(1_000)),
        ],
        Duration::from_secs(60),
    );
    let exec = supervisor(registry, Arc::new(TrackingStorage::default()))
        .execute("r", &doc(10_000), &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(outcomes(&exec), vec![AttemptOutcome::Rejected, AttemptOutcome::Accepted]);
    assert_eq!(exec.strategy_used, Some(StrategyId::AggressiveCodec));
    assert_eq!(exec.attempts[0].output_size, Some(9_801));
    assert_eq!(calls.get(StrategyId::ImageRecode), 0);
}

#[tokio::test]
async fn test_97_percent_rejected_under_wider_margin() {
    let (registry, _) = registry_with(
        &[
            (StrategyId::StreamOptimizer, Behavior::Bp(9_700)),
            (StrategyId::AggressiveCodec, Behavior::Bp(5_000)),
        ],
        Duration::from_secs(60),
    );
    let sup = Supervisor::new(registry, Evaluator::new(0.05), Arc::new(TrackingStorage::default()));
    let exec = sup.execute("r", &doc(10_000), &three_step_plan(), &CancelFlag::new()).await.unwrap();
    assert_eq!(exec.attempts[0].outcome, AttemptOutcome::Rejected);
    assert_eq!(exec.strategy_used, Some(StrategyId::AggressiveCodec));
}

#[tokio::test]
async fn test_exhaustion_never_loops_and_returns_original() {
    let (registry, calls) = registry_with(&all(Behavior::Bp(10_000)), Duration::from_secs(60));
    let original = doc(8_000);
    let exec = supervisor(registry, Arc::new(TrackingStorage::default()))
        .execute("r", &original, &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert!(!exec.effective);
    assert!(exec.document.same_content(&original));
    for id in [StrategyId::StreamOptimizer, StrategyId::AggressiveCodec, StrategyId::ImageRecode] {
        assert_eq!(calls.get(id), 1);
    }
}

#[tokio::test]
async fn test_at_most_one_candidate_artifact() {
    let (registry, _) = registry_with(
        &[
            (StrategyId::StreamOptimizer, Behavior::Bp(9_950)),
            (StrategyId::AggressiveCodec, Behavior::Bp(9_900)),
            (StrategyId::ImageRecode, Behavior::Bp(9_850)),
        ],
        Duration::from_secs(60),
    );
    let storage = Arc::new(TrackingStorage::default());
    let exec = supervisor(registry, storage.clone())
        .execute("r", &doc(100_000), &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(outcomes(&exec), vec![AttemptOutcome::Rejected; 3]);
    assert_eq!(storage.peak_candidates.load(Ordering::SeqCst), 1);
    assert!(storage.candidates().is_empty());
    assert!(exec.artifact.is_none());
}

#[tokio::test]
async fn test_return_best_below_margin() {
    let (registry, _) = registry_with(
        &[
            (StrategyId::StreamOptimizer, Behavior::Bp(9_950)),
            (StrategyId::AggressiveCodec, Behavior::Bp(9_850)),
            (StrategyId::ImageRecode, Behavior::Bp(9_900)),
        ],
        Duration::from_secs(60),
    );
    let storage = Arc::new(TrackingStorage::default());
    let exec = supervisor(registry, storage.clone())
        .with_return_best_below_margin(true)
        .execute("req", &doc(100_000), &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert!(!exec.effective);
    assert_eq!(exec.strategy_used, Some(StrategyId::AggressiveCodec));
    assert_eq!(exec.document.size_bytes(), 98_500);
    assert_eq!(storage.candidates(), vec!["req_1_aggressive-codec.pdf".to_string()]);
    assert_eq!(storage.peak_candidates.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_candidate_removal_scheduled_when_written() {
    let (registry, _) = registry_with(
        &[
            (StrategyId::StreamOptimizer, Behavior::Bp(9_950)),
            (StrategyId::AggressiveCodec, Behavior::Bp(9_850)),
            (StrategyId::ImageRecode, Behavior::Fail),
        ],
        Duration::from_secs(60),
    );
    let storage = Arc::new(TrackingStorage::default());
    let scheduler = Arc::new(DeletionScheduler::new(storage.clone()));
    let exec = supervisor(registry, storage.clone())
        .with_cleanup(scheduler.clone(), Duration::from_secs(60))
        .with_return_best_below_margin(true)
        .execute("req", &doc(100_000), &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert!(exec.artifact.is_some());
    assert_eq!(storage.candidates(), vec!["req_1_aggressive-codec.pdf".to_string()]);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(storage.candidates().is_empty());
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_execution_leaves_no_candidate_behind() {
    let (registry, _) = registry_with(
        &[
            (StrategyId::StreamOptimizer, Behavior::Bp(9_900)),
            (StrategyId::AggressiveCodec, Behavior::Sleep(Duration::from_secs(3_600))),
        ],
        Duration::from_secs(7_200),
    );
    let plan = CompressionPlan::new(
        "t",
        vec![
            step(StrategyId::StreamOptimizer, Duration::from_secs(600)),
            step(StrategyId::AggressiveCodec, Duration::from_secs(7_200)),
        ],
    )
    .unwrap();
    let storage = Arc::new(TrackingStorage::default());
    let scheduler = Arc::new(DeletionScheduler::new(storage.clone()));
    let sup = supervisor(registry, storage.clone()).with_cleanup(scheduler.clone(), Duration::from_secs(60));

    let original = doc(10_000);
    let cancel = CancelFlag::new();
    let cut = tokio::time::timeout(Duration::from_secs(5), sup.execute("gone", &original, &plan, &cancel)).await;
    assert!(cut.is_err());
    assert_eq!(storage.candidates(), vec!["gone_0_stream-optimizer.pdf".to_string()]);
    assert_eq!(scheduler.pending(), 1);

    tokio::time::sleep(Duration::from_secs(3_600)).await;
    assert!(storage.candidates().is_empty());
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test]
async fn test_larger_candidate_never_kept() {
    let (registry, _) = registry_with(&all(Behavior::Bp(12_000)), Duration::from_secs(60));
    let storage = Arc::new(TrackingStorage::default());
    let original = doc(1_000);
    let exec = supervisor(registry, storage.clone())
        .with_return_best_below_margin(true)
        .execute("r", &original, &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert!(exec.document.same_content(&original));
    assert_eq!(storage.peak_candidates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_output_is_failure() {
    let (registry, _) = registry_with(
        &[(StrategyId::StreamOptimizer, Behavior::Empty), (StrategyId::AggressiveCodec, Behavior::Bp(100))],
        Duration::from_secs(60),
    );
    let exec = supervisor(registry, Arc::new(TrackingStorage::default()))
        .execute("r", &doc(1_000), &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(outcomes(&exec), vec![AttemptOutcome::Failed, AttemptOutcome::Accepted]);
}

#[tokio::test]
async fn test_unregistered_strategy_falls_through() {
    let (registry, _) = registry_with(&[(StrategyId::ImageRecode, Behavior::Bp(5_000))], Duration::from_secs(60));
    let exec = supervisor(registry, Arc::new(TrackingStorage::default()))
        .execute("r", &doc(1_000), &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(
        outcomes(&exec),
        vec![AttemptOutcome::Failed, AttemptOutcome::Failed, AttemptOutcome::Accepted]
    );
    assert!(exec.attempts[0].error.as_deref().unwrap().contains("not registered"));
}

#[tokio::test]
async fn test_cancelled_request_skips_remaining_steps() {
    let (registry, calls) = registry_with(&all(Behavior::Bp(5_000)), Duration::from_secs(60));
    let cancel = CancelFlag::new();
    cancel.cancel();
    let original = doc(1_000);
    let exec = supervisor(registry, Arc::new(TrackingStorage::default()))
        .execute("r", &original, &three_step_plan(), &cancel)
        .await
        .unwrap();
    assert_eq!(outcomes(&exec), vec![AttemptOutcome::Skipped; 3]);
    assert_eq!(calls.total(), 0);
    assert!(exec.document.same_content(&original));
}

#[tokio::test]
async fn test_candidate_write_failure_is_fatal() {
    let (registry, _) = registry_with(&all(Behavior::Bp(5_000)), Duration::from_secs(60));
    let storage = Arc::new(TrackingStorage::default());
    storage.fail_puts.store(true, Ordering::SeqCst);
    let err = supervisor(registry, storage)
        .execute("r", &doc(1_000), &three_step_plan(), &CancelFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SqError::Fatal(_)));
}

#[tokio::test]
async fn test_supervisor_total_over_random_behaviours() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let behaviors: Vec<(StrategyId, Behavior)> = StrategyId::ALL
            .iter()
            .map(|id| {
                let b = match rng.gen_range(0..4) {
                    0 => Behavior::Fail,
                    1 => Behavior::Empty,
                    _ => Behavior::Bp(rng.gen_range(0..13_000)),
                };
                (*id, b)
            })
            .collect();
        let (registry, _) = registry_with(&behaviors, Duration::from_secs(60));
        let original = doc(rng.gen_range(16..20_000));
        let exec = supervisor(registry, Arc::new(TrackingStorage::default()))
            .execute("r", &original, &three_step_plan(), &CancelFlag::new())
            .await
            .unwrap();
        let orig = original.size_bytes() as u128;
        let fin = exec.document.size_bytes() as u128;
        if exec.effective {
            assert!(fin * 50 < orig * 49);
        } else {
            assert!(exec.document.same_content(&original));
        }
        assert!(exec.attempts.len() <= 3);
    }
}

// ========== Timeouts ==========

#[tokio::test(start_paused = true)]
async fn test_timeout_falls_through_within_budget() {
    let (registry, _) = registry_with(
        &[
            (StrategyId::StreamOptimizer, Behavior::Sleep(Duration::from_secs(3_600))),
            (StrategyId::AggressiveCodec, Behavior::Bp(5_000)),
        ],
        Duration::from_secs(600),
    );
    let plan = CompressionPlan::new(
        "t",
        vec![
            step(StrategyId::StreamOptimizer, Duration::from_secs(5)),
            step(StrategyId::AggressiveCodec, Duration::from_secs(5)),
        ],
    )
    .unwrap();
    let started = tokio::time::Instant::now();
    let exec = supervisor(registry, Arc::new(TrackingStorage::default()))
        .execute("r", &doc(1_000), &plan, &CancelFlag::new())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(6));
    assert_eq!(outcomes(&exec), vec![AttemptOutcome::TimedOut, AttemptOutcome::Accepted]);
}

#[tokio::test(start_paused = true)]
async fn test_intrinsic_timeout_caps_step_timeout() {
    let (registry, _) = registry_with(
        &[(StrategyId::ImageRecode, Behavior::Sleep(Duration::from_secs(60)))],
        Duration::from_secs(2),
    );
    let sup = supervisor(registry, Arc::new(TrackingStorage::default()));
    let started = tokio::time::Instant::now();
    let result = sup.run_step(&doc(100), &step(StrategyId::ImageRecode, Duration::from_secs(500))).await;
    assert!(started.elapsed() < Duration::from_secs(3));
    match result {
        StrategyResult::Timeout(budget) => assert_eq!(budget, Duration::from_secs(2)),
        other => panic!("expected timeout, got {}", other.status()),
    }
}

#[tokio::test]
async fn test_timeout_in_real_time() {
    let (registry, _) = registry_with(
        &[(StrategyId::FastCodec, Behavior::Sleep(Duration::from_secs(30)))],
        Duration::from_secs(60),
    );
    let plan = CompressionPlan::single("t", step(StrategyId::FastCodec, Duration::from_millis(200)));
    let started = std::time::Instant::now();
    let original = doc(500);
    let exec = supervisor(registry, Arc::new(TrackingStorage::default()))
        .execute("r", &original, &plan, &CancelFlag::new())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(1_200));
    assert_eq!(outcomes(&exec), vec![AttemptOutcome::TimedOut]);
    assert!(exec.document.same_content(&original));
}

// ========== Compressor ==========

struct Setup {
    compressor: Compressor,
    calls: Calls,
    storage: Arc<TrackingStorage>,
    scheduler: Arc<DeletionScheduler>,
}

fn setup(behaviors: &[(StrategyId, Behavior)]) -> Setup {
    setup_with(&SqueezeConfig::default(), behaviors)
}

fn setup_with(config: &SqueezeConfig, behaviors: &[(StrategyId, Behavior)]) -> Setup {
    let (registry, calls) = registry_with(behaviors, Duration::from_secs(60));
    let storage = Arc::new(TrackingStorage::default());
    let scheduler = Arc::new(DeletionScheduler::new(storage.clone()));
    let compressor = Compressor::new(
        config,
        default_policy_config(),
        registry,
        storage.clone(),
        scheduler.clone(),
    );
    Setup { compressor, calls, storage, scheduler }
}

fn text_pdf(approx_bytes: usize) -> Document {
    Document::new(SamplePdf::new().text_page("quarterly report").padding(approx_bytes).build().unwrap())
        .with_filename("report.pdf")
}

fn image_heavy_pdf(approx_bytes: usize) -> Document {
    let mut pdf = SamplePdf::new().declared_image_page(5_000, 4_000);
    for _ in 0..19 {
        pdf = pdf.declared_image_page(640, 480);
    }
    Document::new(pdf.padding(approx_bytes).build().unwrap())
}

#[tokio::test]
async fn test_scenario_small_text_document() {
    let s = setup(&all(Behavior::Bp(5_000)));
    let input = text_pdf(MB / 2);
    let out = s
        .compressor
        .compress(CompressionRequest::new(input.clone(), QualityLevel::Medium))
        .await
        .unwrap();
    assert!(out.report.effective);
    assert_eq!(out.report.strategy_used, "fast-codec");
    assert_eq!(out.report.profile.image_count, 0);
    assert_eq!(out.report.original_size, input.size_bytes());
    assert_eq!(out.report.final_size, input.size_bytes() / 2);
    assert!((out.report.reduction_pct - 50.0).abs() < 0.01);
    assert_eq!(out.document.filename.as_deref(), Some("report.pdf"));
    assert_eq!(s.calls.total(), 1);
}

#[tokio::test]
async fn test_scenario_image_heavy_recode_wins() {
    let s = setup(&[
        (StrategyId::StreamOptimizer, Behavior::Bp(9_950)),
        (StrategyId::AggressiveCodec, Behavior::Fail),
        (StrategyId::ImageRecode, Behavior::Bp(6_000)),
        (StrategyId::FastCodec, Behavior::Bp(1_000)),
    ]);
    let out = s
        .compressor
        .compress(CompressionRequest::new(image_heavy_pdf(8 * MB), QualityLevel::High))
        .await
        .unwrap();
    let r = &out.report;
    assert_eq!(r.profile.image_count, 20);
    assert_eq!(r.profile.largest_image_pixels, 20_000_000);
    assert_eq!(r.rule, "large-or-image-heavy");
    assert_eq!(r.attempts[0].strategy, StrategyId::StreamOptimizer);
    assert_eq!(r.strategy_used, "image-recode");
    assert!(r.effective);
    assert_eq!(s.calls.get(StrategyId::FastCodec), 0);
}

#[tokio::test]
async fn test_scenario_image_heavy_nothing_effective() {
    let s = setup(&[
        (StrategyId::StreamOptimizer, Behavior::Bp(9_950)),
        (StrategyId::AggressiveCodec, Behavior::Bp(9_990)),
        (StrategyId::ImageRecode, Behavior::Bp(9_900)),
    ]);
    let input = image_heavy_pdf(8 * MB);
    let out = s
        .compressor
        .compress(CompressionRequest::new(input.clone(), QualityLevel::High))
        .await
        .unwrap();
    assert!(!out.report.effective);
    assert_eq!(out.report.strategy_used, "original");
    assert_eq!(out.document.bytes(), input.bytes());
    assert_eq!(out.report.attempts.len(), 3);
    assert_eq!(out.report.final_size, out.report.original_size);
}

#[tokio::test]
async fn test_scenario_oversize_rejected_without_attempts() {
    let s = setup(&all(Behavior::Bp(5_000)));
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(15 * MB, b'x');
    let err = s
        .compressor
        .compress(CompressionRequest::new(Document::new(bytes), QualityLevel::Low))
        .await
        .unwrap_err();
    assert!(matches!(err, SqError::SizeExceeded { size, .. } if size == (15 * MB) as u64));
    assert_eq!(s.calls.total(), 0);
    assert!(s.storage.inner.is_empty());
}

#[tokio::test]
async fn test_declared_size_over_ceiling_rejected() {
    let s = setup(&all(Behavior::Bp(5_000)));
    let req = CompressionRequest::new(text_pdf(10), QualityLevel::Medium).with_declared_size(50 * MB as u64);
    let err = s.compressor.compress(req).await.unwrap_err();
    assert!(matches!(err, SqError::SizeExceeded { .. }));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_scenario_all_fail_returns_original() {
    let s = setup(&all(Behavior::Fail));
    let input = text_pdf(2 * MB);
    let out = s
        .compressor
        .compress(CompressionRequest::new(input.clone(), QualityLevel::Medium))
        .await
        .unwrap();
    assert!(!out.report.effective);
    assert_eq!(out.report.strategy_used, "original");
    assert_eq!(out.document.bytes(), input.bytes());
    assert_eq!(out.report.reduction_pct, 0.0);
    assert!(out.report.attempts.iter().all(|a| a.outcome == AttemptOutcome::Failed));
}

#[tokio::test]
async fn test_empty_and_non_pdf_inputs_rejected() {
    let s = setup(&all(Behavior::Bp(5_000)));
    let err = s
        .compressor
        .compress(CompressionRequest::new(Document::new(Vec::new()), QualityLevel::Medium))
        .await
        .unwrap_err();
    assert!(matches!(err, SqError::InputRejected(_)));

    let err = s
        .compressor
        .compress(CompressionRequest::new(Document::new(b"GIF89a....".to_vec()), QualityLevel::Medium))
        .await
        .unwrap_err();
    assert!(matches!(err, SqError::InputRejected(_)));
    assert_eq!(s.calls.total(), 0);
}

#[tokio::test]
async fn test_unparseable_pdf_gets_conservative_plan() {
    let s = setup(&all(Behavior::Bp(5_000)));
    let out = s
        .compressor
        .compress(CompressionRequest::new(doc(4 * MB), QualityLevel::High))
        .await
        .unwrap();
    assert_eq!(out.report.profile.page_count, 0);
    assert_eq!(out.report.strategy_used, "fast-codec");
}

#[tokio::test]
async fn test_compress_with_forces_single_strategy() {
    let s = setup(&all(Behavior::Bp(5_000)));
    let out = s
        .compressor
        .compress_with(CompressionRequest::new(text_pdf(1_000), QualityLevel::Low), StrategyId::ImageRecode)
        .await
        .unwrap();
    assert_eq!(out.report.rule, "forced:image-recode");
    assert_eq!(out.report.strategy_used, "image-recode");
    assert_eq!(s.calls.total(), 1);
    assert_eq!(s.calls.get(StrategyId::ImageRecode), 1);
}

#[tokio::test]
async fn test_artifacts_scheduled_for_removal() {
    let s = setup(&all(Behavior::Bp(5_000)));
    let out = s
        .compressor
        .compress(CompressionRequest::new(text_pdf(1_000), QualityLevel::Medium))
        .await
        .unwrap();
    let id = &out.report.request_id;
    assert_eq!(s.scheduler.pending(), 2);
    let mut keys = s.storage.inner.keys();
    keys.sort();
    assert_eq!(keys, vec![format!("{id}_0_fast-codec.pdf"), format!("{id}_input.pdf")]);
}

#[tokio::test]
async fn test_original_path_schedules_input_only() {
    let s = setup(&all(Behavior::Fail));
    let out = s
        .compressor
        .compress(CompressionRequest::new(text_pdf(1_000), QualityLevel::Medium))
        .await
        .unwrap();
    assert_eq!(s.scheduler.pending(), 1);
    assert_eq!(s.storage.inner.keys(), vec![format!("{}_input.pdf", out.report.request_id)]);
}

fn slow_fallback() -> Vec<(StrategyId, Behavior)> {
    vec![
        (StrategyId::FastCodec, Behavior::Bp(9_900)),
        (StrategyId::StreamOptimizer, Behavior::Sleep(Duration::from_secs(30))),
    ]
}

#[tokio::test]
async fn test_dropped_request_has_removals_scheduled() {
    let s = setup(&slow_fallback());
    let request = CompressionRequest::new(text_pdf(1_000), QualityLevel::Medium);
    let cut = tokio::time::timeout(Duration::from_millis(500), s.compressor.compress(request)).await;
    assert!(cut.is_err());

    let keys = s.storage.inner.keys();
    assert_eq!(keys.len(), 2, "{keys:?}");
    assert!(keys.iter().any(|k| k.ends_with("_input.pdf")));
    assert!(keys.iter().any(|k| k.ends_with("_0_fast-codec.pdf")));
    assert_eq!(s.scheduler.pending(), 2);
}

#[tokio::test]
async fn test_dropped_request_artifacts_are_removed() {
    let mut config = SqueezeConfig::default();
    config.storage.cleanup_delay_secs = 0;
    let s = setup_with(&config, &slow_fallback());
    let request = CompressionRequest::new(text_pdf(1_000), QualityLevel::Medium);
    let cut = tokio::time::timeout(Duration::from_millis(500), s.compressor.compress(request)).await;
    assert!(cut.is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(s.storage.inner.keys().is_empty());
    assert_eq!(s.scheduler.pending(), 0);
}

#[tokio::test]
async fn test_input_write_failure_is_fatal() {
    let s = setup(&all(Behavior::Bp(5_000)));
    s.storage.fail_puts.store(true, Ordering::SeqCst);
    let err = s
        .compressor
        .compress(CompressionRequest::new(text_pdf(1_000), QualityLevel::Medium))
        .await
        .unwrap_err();
    assert!(matches!(err, SqError::Fatal(_)));
    assert!(!err.is_client_error());
    assert_eq!(s.calls.total(), 0);
}

#[tokio::test]
async fn test_request_ids_unique() {
    let s = setup(&all(Behavior::Bp(5_000)));
    let a = s.compressor.compress(CompressionRequest::new(text_pdf(100), QualityLevel::Medium)).await.unwrap();
    let b = s.compressor.compress(CompressionRequest::new(text_pdf(100), QualityLevel::Medium)).await.unwrap();
    assert_ne!(a.report.request_id, b.report.request_id);
    assert_eq!(a.report.content_hash, b.report.content_hash);
}

#[tokio::test]
async fn test_report_serializes() {
    let s = setup(&all(Behavior::Bp(5_000)));
    let out = s
        .compressor
        .compress(CompressionRequest::new(text_pdf(100), QualityLevel::High))
        .await
        .unwrap();
    let json = serde_json::to_value(&out.report).unwrap();
    assert_eq!(json["strategy_used"], "fast-codec");
    assert_eq!(json["level"], "high");
    assert_eq!(json["attempts"][0]["outcome"], "accepted");
    assert_eq!(json["attempts"][0]["strategy"], "fast-codec");
}
