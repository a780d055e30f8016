//! Runs a compression plan step by step under per-step timeouts.
//!
//! The supervisor is total past validation: strategy failures, timeouts and
//! ineffective candidates all fall through, and exhaustion returns the
//! original. The only error it surfaces is a working-storage write failure.

use crate::evaluator::Evaluator;
use serde::Serialize;
use sq_core::{CompressionPlan, Document, PlanStep, SqError, StrategyError, StrategyId, StrategyResult};
use sq_storage::{ArtifactHandle, ScheduledTask, Scheduler, WorkingStorage};
use sq_strategy::{CancelFlag, Strategy, StrategyRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Beat the effectiveness margin; the plan stopped here.
    Accepted,
    /// Produced output that missed the margin.
    Rejected,
    Failed,
    TimedOut,
    /// Not run because the request was cancelled.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub step: usize,
    pub strategy: StrategyId,
    pub outcome: AttemptOutcome,
    pub output_size: Option<u64>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of running one plan.
#[derive(Debug, Clone)]
pub struct Execution {
    pub document: Document,
    /// `None` when the original is returned.
    pub strategy_used: Option<StrategyId>,
    pub effective: bool,
    pub attempts: Vec<AttemptRecord>,
    /// Working-storage copy of the returned candidate, if any.
    pub artifact: Option<ArtifactHandle>,
}

impl Execution {
    pub fn strategy_label(&self) -> &'static str {
        self.strategy_used.map(|s| s.as_str()).unwrap_or("original")
    }
}

struct Best {
    strategy: StrategyId,
    document: Document,
    artifact: ArtifactHandle,
    removal: Option<ScheduledTask>,
}

/// Deferred removal applied to every candidate artifact as it is written.
struct Cleanup {
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
}

pub struct Supervisor {
    registry: StrategyRegistry,
    evaluator: Evaluator,
    storage: Arc<dyn WorkingStorage>,
    cleanup: Option<Cleanup>,
    return_best_below_margin: bool,
}

impl Supervisor {
    /// Exhausting the plan returns the original unless
    /// [`with_return_best_below_margin`](Self::with_return_best_below_margin) is set.
    pub fn new(registry: StrategyRegistry, evaluator: Evaluator, storage: Arc<dyn WorkingStorage>) -> Self {
        Self { registry, evaluator, storage, cleanup: None, return_best_below_margin: false }
    }

    /// Schedule removal of each candidate artifact the moment it is stored,
    /// so an abandoned execution leaves nothing behind past `delay`.
    pub fn with_cleanup(mut self, scheduler: Arc<dyn Scheduler>, delay: Duration) -> Self {
        self.cleanup = Some(Cleanup { scheduler, delay });
        self
    }

    /// On exhaustion, return the smallest candidate strictly smaller than
    /// the original instead of the original itself.
    pub fn with_return_best_below_margin(mut self, yes: bool) -> Self {
        self.return_best_below_margin = yes;
        self
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn artifact_key(request_id: &str, step: usize, strategy: StrategyId) -> String {
        format!("{request_id}_{step}_{strategy}.pdf")
    }

    pub async fn execute(
        &self,
        request_id: &str,
        original: &Document,
        plan: &CompressionPlan,
        cancel: &CancelFlag,
    ) -> Result<Execution, SqError> {
        let original_size = original.size_bytes();
        let mut attempts = Vec::with_capacity(plan.len());
        let mut best: Option<Best> = None;

        for (index, step) in plan.steps().iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(request_id, remaining = plan.len() - index, "request cancelled, abandoning plan");
                attempts.extend(plan.steps()[index..].iter().enumerate().map(|(offset, s)| AttemptRecord {
                    step: index + offset,
                    strategy: s.strategy,
                    outcome: AttemptOutcome::Skipped,
                    output_size: None,
                    elapsed_ms: 0,
                    error: None,
                }));
                break;
            }

            let started = Instant::now();
            let result = self.run_step(original, step).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let mut record = AttemptRecord {
                step: index,
                strategy: step.strategy,
                outcome: AttemptOutcome::Failed,
                output_size: None,
                elapsed_ms,
                error: None,
            };

            let candidate = match result {
                StrategyResult::Success(doc) if doc.is_empty() => {
                    record.error = Some(StrategyError::EmptyOutput.to_string());
                    tracing::warn!(request_id, strategy = %step.strategy, "strategy returned empty output");
                    attempts.push(record);
                    continue;
                }
                StrategyResult::Success(doc) => doc,
                StrategyResult::Failure(e) => {
                    tracing::warn!(request_id, strategy = %step.strategy, error = %e, elapsed_ms, "strategy failed");
                    record.error = Some(e.to_string());
                    attempts.push(record);
                    continue;
                }
                StrategyResult::Timeout(budget) => {
                    tracing::warn!(
                        request_id,
                        strategy = %step.strategy,
                        timeout_ms = budget.as_millis() as u64,
                        "strategy timed out"
                    );
                    record.outcome = AttemptOutcome::TimedOut;
                    attempts.push(record);
                    continue;
                }
            };

            let candidate_size = candidate.size_bytes();
            let accepted = self.evaluator.accept(original_size, candidate_size);
            record.output_size = Some(candidate_size);
            tracing::info!(
                request_id,
                strategy = %step.strategy,
                original_size,
                candidate_size,
                reduction_pct = crate::evaluator::reduction_pct(original_size, candidate_size),
                accepted,
                elapsed_ms,
                "candidate evaluated"
            );

            let improves = candidate_size < original_size
                && best.as_ref().map_or(true, |b| candidate_size < b.document.size_bytes());
            if improves {
                let key = Self::artifact_key(request_id, index, step.strategy);
                let artifact = self
                    .storage
                    .put(&key, candidate.bytes())
                    .await
                    .map_err(|e| SqError::Fatal(format!("writing candidate artifact: {e}")))?;
                let removal = self
                    .cleanup
                    .as_ref()
                    .map(|c| c.scheduler.schedule_removal(&artifact.key, c.delay));
                let next = Best { strategy: step.strategy, document: candidate, artifact, removal };
                if let Some(previous) = best.replace(next) {
                    self.discard(previous).await;
                }
            }

            if accepted {
                record.outcome = AttemptOutcome::Accepted;
                attempts.push(record);
                // An accepted candidate is always below the margin, hence the new best.
                return Ok(match best {
                    Some(b) => self.finish(original_size, b.document, Some(b.strategy), Some(b.artifact), attempts),
                    None => self.finish(original_size, original.clone(), None, None, attempts),
                });
            }
            record.outcome = AttemptOutcome::Rejected;
            attempts.push(record);
        }

        match best {
            Some(b) if self.return_best_below_margin => {
                tracing::info!(request_id, strategy = %b.strategy, "plan exhausted, returning best candidate");
                Ok(self.finish(original_size, b.document, Some(b.strategy), Some(b.artifact), attempts))
            }
            other => {
                if let Some(b) = other {
                    self.discard(b).await;
                }
                tracing::info!(request_id, attempts = attempts.len(), "plan exhausted, returning original");
                Ok(self.finish(original_size, original.clone(), None, None, attempts))
            }
        }
    }

    /// Invoke one step under `min(step timeout, intrinsic timeout)`.
    pub async fn run_step(&self, input: &Document, step: &PlanStep) -> StrategyResult {
        let Some(strategy) = self.registry.get(step.strategy) else {
            return StrategyResult::Failure(StrategyError::Unavailable(format!(
                "{} is not registered",
                step.strategy
            )));
        };
        run_with_timeout(strategy.as_ref(), input, step).await
    }

    fn finish(
        &self,
        original_size: u64,
        document: Document,
        strategy_used: Option<StrategyId>,
        artifact: Option<ArtifactHandle>,
        attempts: Vec<AttemptRecord>,
    ) -> Execution {
        let effective = self.evaluator.accept(original_size, document.size_bytes());
        Execution { document, strategy_used, effective, attempts, artifact }
    }

    /// Remove a superseded candidate now. Its deferred removal is cancelled
    /// only once the artifact is gone.
    async fn discard(&self, best: Best) {
        match self.storage.remove(&best.artifact.key).await {
            Ok(()) => {
                if let Some(task) = &best.removal {
                    task.cancel();
                }
            }
            Err(e) => tracing::warn!(key = %best.artifact.key, error = %e, "failed to discard artifact"),
        }
    }
}

pub async fn run_with_timeout(strategy: &dyn Strategy, input: &Document, step: &PlanStep) -> StrategyResult {
    let budget = step.timeout.min(strategy.intrinsic_timeout()).max(Duration::from_millis(1));
    let cancel = CancelFlag::new();
    match tokio::time::timeout(budget, strategy.compress(input, &step.params, &cancel)).await {
        Ok(Ok(doc)) => StrategyResult::Success(doc),
        Ok(Err(e)) => StrategyResult::Failure(e),
        Err(_) => {
            cancel.cancel();
            StrategyResult::Timeout(budget)
        }
    }
}
