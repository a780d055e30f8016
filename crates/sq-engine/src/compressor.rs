use crate::evaluator::{reduction_pct, Evaluator};
use crate::supervisor::{AttemptRecord, Execution, Supervisor};
use serde::Serialize;
use sq_core::{CompressionPlan, Document, DocumentProfile, QualityLevel, Result, SqError, SqueezeConfig, StrategyId};
use sq_policy::PolicyConfig;
use sq_profiler::Profiler;
use sq_storage::{DeletionScheduler, LocalWorkingStorage, Scheduler, WorkingStorage};
use sq_strategy::{CancelFlag, StrategyRegistry};
use std::sync::Arc;
use std::time::Duration;

/// Bytes scanned for the `%PDF-` marker.
const HEADER_WINDOW: usize = 1024;

/// One document to compress.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub document: Document,
    pub level: QualityLevel,
    /// Size announced by the client, checked against the ceiling before the
    /// body is trusted.
    pub declared_size: Option<u64>,
    pub cancel: CancelFlag,
}

impl CompressionRequest {
    pub fn new(document: Document, level: QualityLevel) -> Self {
        Self { document, level, declared_size: None, cancel: CancelFlag::new() }
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Everything observable about how a request was handled. Populated on
/// every success path, including "returned original".
#[derive(Debug, Clone, Serialize)]
pub struct CompressionReport {
    pub request_id: String,
    pub strategy_used: String,
    pub original_size: u64,
    pub final_size: u64,
    pub effective: bool,
    pub reduction_pct: f64,
    pub level: QualityLevel,
    pub rule: String,
    pub profile: DocumentProfile,
    pub attempts: Vec<AttemptRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub document: Document,
    pub report: CompressionReport,
}

/// Request orchestration: validate, store, profile, plan, execute, schedule
/// cleanup.
pub struct Compressor {
    profiler: Profiler,
    policy: Arc<PolicyConfig>,
    supervisor: Supervisor,
    storage: Arc<dyn WorkingStorage>,
    scheduler: Arc<dyn Scheduler>,
    cleanup_delay: Duration,
}

impl Compressor {
    pub fn new(
        config: &SqueezeConfig,
        policy: PolicyConfig,
        registry: StrategyRegistry,
        storage: Arc<dyn WorkingStorage>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let cleanup_delay = Duration::from_secs(config.storage.cleanup_delay_secs);
        let supervisor = Supervisor::new(registry, Evaluator::from_config(&config.evaluator), storage.clone())
            .with_cleanup(scheduler.clone(), cleanup_delay)
            .with_return_best_below_margin(config.evaluator.return_best_below_margin);
        Self {
            profiler: Profiler::from_config(&config.profiler),
            policy: Arc::new(policy),
            supervisor,
            storage,
            scheduler,
            cleanup_delay,
        }
    }

    /// Local upload directory, Ghostscript-backed registry.
    pub fn from_config(config: &SqueezeConfig, policy: PolicyConfig) -> Self {
        let storage: Arc<dyn WorkingStorage> = Arc::new(LocalWorkingStorage::new(config.storage.upload_dir.clone()));
        let scheduler: Arc<dyn Scheduler> = Arc::new(DeletionScheduler::new(storage.clone()));
        let registry = StrategyRegistry::with_defaults(&config.strategies);
        Self::new(config, policy, registry, storage, scheduler)
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub async fn compress(&self, request: CompressionRequest) -> Result<CompressionOutcome> {
        self.run(request, None).await
    }

    /// Skip the policy and run a one-step plan with `strategy`.
    pub async fn compress_with(&self, request: CompressionRequest, strategy: StrategyId) -> Result<CompressionOutcome> {
        self.run(request, Some(strategy)).await
    }

    /// Empty, oversize and non-PDF inputs are refused before anything runs.
    pub fn validate(&self, request: &CompressionRequest) -> Result<()> {
        let actual = request.document.size_bytes();
        if actual == 0 {
            return Err(SqError::InputRejected("empty document".into()));
        }
        let limit = self.policy.hard_ceiling();
        let size = request.declared_size.unwrap_or(0).max(actual);
        if size > limit {
            return Err(SqError::SizeExceeded { size, limit });
        }
        let bytes = request.document.bytes();
        let window = &bytes[..bytes.len().min(HEADER_WINDOW)];
        if !window.windows(5).any(|w| w == b"%PDF-") {
            return Err(SqError::InputRejected("not a PDF document".into()));
        }
        Ok(())
    }

    async fn run(&self, request: CompressionRequest, forced: Option<StrategyId>) -> Result<CompressionOutcome> {
        self.validate(&request)?;

        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let CompressionRequest { document, level, cancel, .. } = request;
        let document = document.with_hash();
        tracing::debug!(
            request_id = %request_id,
            filename = document.filename.as_deref().unwrap_or("-"),
            hash = document.content_hash.as_deref().unwrap_or("-"),
            size = document.size_bytes(),
            "compression request"
        );

        let input_key = format!("{request_id}_input.pdf");
        self.storage
            .put(&input_key, document.bytes())
            .await
            .map_err(|e| SqError::Fatal(format!("storing working copy: {e}")))?;
        // Scheduled before any await so a dropped request still cleans up.
        self.scheduler.schedule_removal(&input_key, self.cleanup_delay);

        let (plan, profile, execution) = self.plan_and_execute(&request_id, &document, level, forced, &cancel).await?;

        let original_size = document.size_bytes();
        let final_size = execution.document.size_bytes();
        let report = CompressionReport {
            request_id,
            strategy_used: execution.strategy_label().to_string(),
            original_size,
            final_size,
            effective: execution.effective,
            reduction_pct: reduction_pct(original_size, final_size),
            level,
            rule: plan.rule.clone(),
            profile,
            attempts: execution.attempts,
            content_hash: document.content_hash.clone(),
        };
        tracing::info!(
            request_id = %report.request_id,
            strategy = %report.strategy_used,
            original_size,
            final_size,
            effective = report.effective,
            reduction_pct = report.reduction_pct,
            "compression finished"
        );

        let final_document = match execution.strategy_used {
            Some(_) => execution.document,
            None => document,
        };
        Ok(CompressionOutcome { document: final_document, report })
    }

    async fn plan_and_execute(
        &self,
        request_id: &str,
        document: &Document,
        level: QualityLevel,
        forced: Option<StrategyId>,
        cancel: &CancelFlag,
    ) -> Result<(CompressionPlan, DocumentProfile, Execution)> {
        let profile = self.profile(document).await;
        let plan = match forced {
            Some(strategy) => sq_policy::plan_single(strategy, level, &self.policy),
            None => sq_policy::plan(&profile, level, &self.policy)?,
        };
        tracing::debug!(
            request_id,
            rule = %plan.rule,
            primary = %plan.primary().strategy,
            fallbacks = plan.fallbacks().len(),
            pages = profile.page_count,
            images = profile.image_count,
            "plan selected"
        );
        let execution = self.supervisor.execute(request_id, document, &plan, cancel).await?;
        Ok((plan, profile, execution))
    }

    async fn profile(&self, document: &Document) -> DocumentProfile {
        let profiler = self.profiler.clone();
        let bytes = document.shared_bytes();
        let size = document.size_bytes();
        tokio::task::spawn_blocking(move || profiler.profile_bytes(&bytes))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "profiling task failed, using zeroed profile");
                DocumentProfile::zeroed(size)
            })
    }
}
