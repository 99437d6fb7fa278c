//! Execution collaborators used by build strategies
//!
//! A strategy never runs a rule itself. It schedules work on an
//! [`ExecutionService`] and hands the rule to a [`BuildExecutorRunner`], either
//! through the runner's default path or with a custom [`BuildExecutor`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::core::config::ExecutionConfig;
use crate::core::errors::{DistBuildError, Result};
use crate::rules::{BuildContext, BuildRule, BuildTarget, CellPathResolver};

/// A zero-argument unit of work
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Accepts units of work for asynchronous execution.
///
/// A unit that panics is dropped after logging; outcome reporting is the
/// runner's job, see [`RuleExecutorRunner`].
pub trait ExecutionService: Send + Sync {
    fn execute(&self, work: Work);
}

/// Runs the steps of whatever rule object it is given
pub trait StepRunner: Send + Sync {
    fn run_steps_for_rule(&self, rule: &dyn BuildRule) -> Result<()>;
}

/// Custom build procedure passed to [`BuildExecutorRunner::run_with_executor`]
pub trait BuildExecutor: Send {
    fn execute(self: Box<Self>, step_runner: &dyn StepRunner) -> Result<()>;
}

/// Build-engine side handle for one rule. It knows the rule it was created for
/// and reports the outcome of whichever path is used.
pub trait BuildExecutorRunner: Send + Sync {
    fn run_with_default_executor(&self);

    fn run_with_executor(&self, executor: Box<dyn BuildExecutor>);
}

/// Outcome callback of a [`RuleExecutorRunner`]
pub type RunCallback = Arc<dyn Fn(&BuildTarget, Result<()>) + Send + Sync>;

/// Bounded worker pool on a tokio runtime.
///
/// Units of work may block (a reconstruction round trip does), so each one runs
/// on the blocking pool after taking a permit.
#[derive(Clone)]
pub struct TokioExecutionService {
    handle: Handle,
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl TokioExecutionService {
    /// Use the runtime of the calling context
    pub fn new(config: &ExecutionConfig) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| DistBuildError::Internal {
            message: "execution service requires a tokio runtime".to_string(),
            source: Some(Box::new(e)),
        })?;
        Self::with_handle(handle, config)
    }

    pub fn with_handle(handle: Handle, config: &ExecutionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            handle,
            permits: Arc::new(Semaphore::new(config.max_workers)),
            max_workers: config.max_workers,
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Permits not currently held by running work
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}

impl ExecutionService for TokioExecutionService {
    fn execute(&self, work: Work) {
        let permits = self.permits.clone();
        self.handle.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                error!("Execution service closed, dropping work");
                return;
            };
            if let Err(e) = tokio::task::spawn_blocking(work).await {
                error!("Unit of work panicked: {}", e);
            }
        });
    }
}

/// Runs a rule's build steps in-process, one after another
pub struct LocalStepRunner {
    cell_resolver: Arc<CellPathResolver>,
}

impl LocalStepRunner {
    pub fn new(cell_resolver: Arc<CellPathResolver>) -> Self {
        Self { cell_resolver }
    }

    fn context_for(&self, rule: &dyn BuildRule) -> Result<BuildContext> {
        let target = rule.build_target().clone();
        let cell_root = self.cell_resolver.cell_path(target.cell())?.to_path_buf();
        let output = rule
            .source_path_to_output()
            .map(|relative| self.cell_resolver.resolve(&target, &relative))
            .transpose()?;
        Ok(BuildContext {
            target,
            cell_root,
            output,
        })
    }
}

impl StepRunner for LocalStepRunner {
    fn run_steps_for_rule(&self, rule: &dyn BuildRule) -> Result<()> {
        let ctx = self.context_for(rule)?;
        let steps = rule.build_steps(&ctx).map_err(|e| {
            DistBuildError::execution_with_source(
                ctx.target.to_string(),
                "failed to create build steps",
                e,
            )
        })?;
        for step in steps {
            debug!("Running step {} for {}", step.short_name(), ctx.target);
            step.execute(&ctx).map_err(|e| {
                DistBuildError::execution_with_source(
                    ctx.target.to_string(),
                    format!("step {} failed", step.short_name()),
                    e,
                )
                .with_context("step", step.short_name())
            })?;
        }
        Ok(())
    }
}

/// Runner for a single rule that builds through a [`StepRunner`] and reports
/// the result to a callback.
///
/// The callback fires exactly once per run, also when the build panics.
pub struct RuleExecutorRunner {
    rule: Arc<dyn BuildRule>,
    step_runner: Arc<dyn StepRunner>,
    callback: RunCallback,
}

impl RuleExecutorRunner {
    pub fn new(
        rule: Arc<dyn BuildRule>,
        step_runner: Arc<dyn StepRunner>,
        callback: RunCallback,
    ) -> Self {
        Self {
            rule,
            step_runner,
            callback,
        }
    }

    fn report(&self, result: Result<()>) {
        if let Err(e) = &result {
            error!("Build of {} failed: {}", self.rule.build_target(), e);
        }
        (self.callback)(self.rule.build_target(), result);
    }

    fn run_guarded(&self, build: impl FnOnce() -> Result<()>) {
        let result = panic::catch_unwind(AssertUnwindSafe(build)).unwrap_or_else(|payload| {
            Err(DistBuildError::execution(
                self.rule.build_target().to_string(),
                format!("build panicked: {}", panic_message(payload.as_ref())),
            ))
        });
        self.report(result);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

impl BuildExecutorRunner for RuleExecutorRunner {
    fn run_with_default_executor(&self) {
        self.run_guarded(|| self.step_runner.run_steps_for_rule(self.rule.as_ref()));
    }

    fn run_with_executor(&self, executor: Box<dyn BuildExecutor>) {
        self.run_guarded(|| executor.execute(self.step_runner.as_ref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Buildable, HasDeps, Step};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tokio_service_runs_work() {
        let service = TokioExecutionService::new(
            &ExecutionConfig::builder().max_workers(2).build().unwrap(),
        )
        .unwrap();
        assert_eq!(service.max_workers(), 2);

        let done = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for _ in 0..10 {
            let done = done.clone();
            let tx = tx.clone();
            service.execute(Box::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            }));
        }
        for _ in 0..10 {
            tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(done.load(Ordering::SeqCst), 10);
    }

    struct PanickingStepRunner;

    impl StepRunner for PanickingStepRunner {
        fn run_steps_for_rule(&self, rule: &dyn BuildRule) -> Result<()> {
            panic!("step runner blew up on {}", rule.build_target());
        }
    }

    struct EmptyRule {
        target: BuildTarget,
    }

    impl Buildable for EmptyRule {
        fn build_steps(&self, _ctx: &BuildContext) -> anyhow::Result<Vec<Box<dyn Step>>> {
            Ok(Vec::new())
        }
    }

    impl HasDeps for EmptyRule {
        fn build_deps(&self) -> Vec<BuildTarget> {
            Vec::new()
        }
    }

    impl BuildRule for EmptyRule {
        fn build_target(&self) -> &BuildTarget {
            &self.target
        }

        fn source_path_to_output(&self) -> Option<std::path::PathBuf> {
            None
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_build_still_reports() {
        let service = TokioExecutionService::new(
            &ExecutionConfig::builder().max_workers(1).build().unwrap(),
        )
        .unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let callback: RunCallback = Arc::new(move |target: &BuildTarget, result: Result<()>| {
            let _ = tx.send((target.to_string(), result));
        });
        let runner = Arc::new(RuleExecutorRunner::new(
            Arc::new(EmptyRule {
                target: "//app:boom".parse().unwrap(),
            }),
            Arc::new(PanickingStepRunner),
            callback,
        ));

        service.execute(Box::new(move || runner.run_with_default_executor()));

        let (target, result) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target, "//app:boom");
        let err = result.unwrap_err();
        assert_eq!(err.category(), "execution");
        assert!(err.to_string().contains("build panicked: step runner blew up"));
        assert_eq!(service.available_workers(), 1);
    }

    #[test]
    fn test_requires_runtime() {
        assert!(TokioExecutionService::new(&ExecutionConfig::default()).is_err());
    }
}
