/// Per-call overrides for [`crate::engine::ExecutionEngine::execute`].
///
/// `max_concurrency` overrides the engine's configured default for this
/// call only; `None` keeps the engine's own setting.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub dry_run: bool,
    pub max_concurrency: Option<usize>,
    pub force: bool,
    pub continue_on_error: bool,
}

impl ExecuteOptions {
    /// Defaults for `applyDeployment`: stop and roll back on the first
    /// wave that contains a failure.
    pub fn apply(force: bool) -> Self {
        ExecuteOptions { force, ..Self::default() }
    }

    /// Defaults for `destroyDeployment`: keep tearing down the rest of the
    /// plan even if one delete fails, rather than recreating everything
    /// that already succeeded.
    pub fn destroy(force: bool) -> Self {
        ExecuteOptions { force, continue_on_error: true, ..Self::default() }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
