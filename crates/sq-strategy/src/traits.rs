use crate::cancel::CancelFlag;
use async_trait::async_trait;
use sq_core::{CostClass, Document, StrategyError, StrategyParams};
use std::time::Duration;

/// A compression transform: input document + parameters to a new document.
///
/// Implementations must stop promptly once the future is dropped or
/// `cancel` is raised: external processes are killed, blocking workers poll
/// the flag.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn cost_class(&self) -> CostClass;

    /// Upper bound on a single invocation, whatever the plan asks for.
    fn intrinsic_timeout(&self) -> Duration;

    async fn compress(
        &self,
        input: &Document,
        params: &StrategyParams,
        cancel: &CancelFlag,
    ) -> Result<Document, StrategyError>;
}
