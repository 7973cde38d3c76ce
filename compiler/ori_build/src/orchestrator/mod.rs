//! The build orchestrator.
//!
//! One [`Orchestrator`] serves every build of a project. It owns what has to
//! survive between builds (the change baseline and the errant set) and walks
//! each build through [`BuildPhase::Resolving`], [`BuildPhase::Compiling`] and
//! [`BuildPhase::Finalizing`] before returning to [`BuildPhase::Idle`].
//!
//! Builds run either on the calling thread ([`Orchestrator::build`]) or on a
//! worker thread ([`Orchestrator::spawn`]). Only one build is admitted at a
//! time.

mod handle;

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use ori_diagnostic::{Diagnostic, ErrorCode};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

pub use handle::BuildHandle;

use crate::consumer::{CompileConsumer, CompileConsumerExt, Partition, PartitionPolicy};
use crate::deps::{DependencyExpander, DependencySearch, TextualUsageSearch};
use crate::engine::CompileEngine;
use crate::hot_swap::{self, HotSwap};
use crate::progress::ProgressSink;
use crate::report::{BuildReport, DiagnosticsAggregator};
use crate::resolve::{ChangeKind, ChangeSet, ChangeSetResolver};
use crate::unit::{CompilationUnit, CompileResult, TypeName, TypeUnit};
use crate::{BuildConfig, BuildError, OutputDir, SourceTree};

/// Which kind of build a request asks for.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BuildMode {
    /// Incremental, unless the resolver needs a full refresh.
    Auto,
    /// Full rebuild regardless of what changed.
    Rebuild,
}

/// Where the orchestrator is in a build.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BuildPhase {
    Idle,
    Resolving,
    Compiling,
    Finalizing,
}

impl BuildPhase {
    fn to_u8(self) -> u8 {
        match self {
            BuildPhase::Idle => 0,
            BuildPhase::Resolving => 1,
            BuildPhase::Compiling => 2,
            BuildPhase::Finalizing => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => BuildPhase::Resolving,
            2 => BuildPhase::Compiling,
            3 => BuildPhase::Finalizing,
            _ => BuildPhase::Idle,
        }
    }
}

/// Cooperative cancellation of a running build.
///
/// A cancelled build stops before its next unit and still finalizes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Result of a build that ran.
///
/// Errors in units do not fail a build: they show up in the counts and the
/// report. An `Err` from the orchestrator means the build process itself
/// could not run.
#[derive(Clone, Debug)]
pub struct BuildOutcome {
    /// Whether this was a full rebuild.
    pub full: bool,
    /// Whether every planned unit was compiled (false after cancellation).
    pub completed: bool,
    /// Whether the consumer chain accepted every result.
    pub accepted: bool,
    /// Units handed to the engine.
    pub compiled: usize,
    /// Classes forwarded to the debug session.
    pub redefined: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub report: BuildReport,
}

impl BuildOutcome {
    /// Completed without a single error.
    pub fn succeeded(&self) -> bool {
        self.completed && self.error_count == 0
    }
}

/// Holds the admission slot until dropped.
struct BuildPermit(Arc<AtomicBool>);

impl Drop for BuildPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State carried from one build to the next.
#[derive(Debug, Default)]
struct BuildState {
    resolver: ChangeSetResolver,
    errant: FxHashSet<TypeName>,
    last_report: Option<BuildReport>,
}

/// What a build is going to compile.
struct BuildPlan {
    full: bool,
    units: Vec<TypeUnit>,
    /// Errant units carried into this build.
    carried: FxHashSet<TypeName>,
}

/// Drives builds of one project.
pub struct Orchestrator {
    config: BuildConfig,
    engine: Arc<dyn CompileEngine>,
    search: Arc<dyn DependencySearch>,
    state: Mutex<BuildState>,
    debugger: Mutex<Option<Arc<dyn HotSwap>>>,
    running: Arc<AtomicBool>,
    phase: AtomicU8,
}

impl Orchestrator {
    /// An orchestrator using [`TextualUsageSearch`] for dependencies.
    pub fn new(config: BuildConfig, engine: Arc<dyn CompileEngine>) -> Self {
        Orchestrator {
            config,
            engine,
            search: Arc::new(TextualUsageSearch),
            state: Mutex::new(BuildState::default()),
            debugger: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            phase: AtomicU8::new(BuildPhase::Idle.to_u8()),
        }
    }

    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn DependencySearch>) -> Self {
        self.search = search;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Attach a debug session; builds started afterwards forward clean
    /// classes to it.
    pub fn attach_debugger(&self, session: Arc<dyn HotSwap>) {
        *self.debugger.lock() = Some(session);
    }

    pub fn detach_debugger(&self) -> Option<Arc<dyn HotSwap>> {
        self.debugger.lock().take()
    }

    pub fn has_debugger(&self) -> bool {
        self.debugger.lock().is_some()
    }

    pub fn phase(&self) -> BuildPhase {
        BuildPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Units whose last compile attempt failed, ordered by name.
    pub fn errant_units(&self) -> Vec<TypeName> {
        let mut units: Vec<TypeName> = self.state.lock().errant.iter().cloned().collect();
        units.sort();
        units
    }

    pub fn last_report(&self) -> Option<BuildReport> {
        self.state.lock().last_report.clone()
    }

    /// Forget the baseline and the errant set. The next build is a full
    /// rebuild. Fails while a build is running.
    pub fn reset(&self) -> Result<(), BuildError> {
        let _permit = self.admit()?;
        let mut state = self.state.lock();
        state.resolver.reset();
        state.errant.clear();
        state.last_report = None;
        Ok(())
    }

    /// Build whatever changed (or everything, when a full refresh is due).
    pub fn make(&self) -> Result<BuildOutcome, BuildError> {
        self.build(BuildMode::Auto, &mut (), &())
    }

    /// Rebuild everything.
    pub fn rebuild(&self) -> Result<BuildOutcome, BuildError> {
        self.build(BuildMode::Rebuild, &mut (), &())
    }

    /// Build on the calling thread.
    pub fn build(
        &self,
        mode: BuildMode,
        consumer: &mut dyn CompileConsumer,
        progress: &dyn ProgressSink,
    ) -> Result<BuildOutcome, BuildError> {
        self.build_cancellable(mode, consumer, progress, &CancelToken::new())
    }

    /// Build on the calling thread, stopping early once `cancel` fires.
    pub fn build_cancellable(
        &self,
        mode: BuildMode,
        consumer: &mut dyn CompileConsumer,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, BuildError> {
        let _permit = self.admit()?;
        self.run_admitted(mode, consumer, progress, cancel)
    }

    /// Build on a worker thread.
    ///
    /// Admission is decided here: a second request while this build runs
    /// fails with [`BuildError::AlreadyRunning`].
    pub fn spawn(
        self: &Arc<Self>,
        mode: BuildMode,
        mut consumer: Box<dyn CompileConsumer + Send>,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<BuildHandle, BuildError> {
        let permit = self.admit()?;
        let (sender, receiver) = crossbeam::channel::bounded(1);
        let cancel = CancelToken::new();

        let orchestrator = Arc::clone(self);
        let worker_cancel = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("ori-build".to_string())
            .spawn(move || {
                let result =
                    orchestrator.run_admitted(mode, &mut *consumer, &*progress, &worker_cancel);
                // Free the slot before anyone waiting on the result can retry.
                drop(permit);
                if sender.send(result).is_err() {
                    tracing::debug!("build handle dropped before completion");
                }
            })
            .map_err(BuildError::Spawn)?;

        Ok(BuildHandle::new(receiver, cancel, thread))
    }

    fn admit(&self) -> Result<BuildPermit, BuildError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BuildError::AlreadyRunning)?;
        Ok(BuildPermit(Arc::clone(&self.running)))
    }

    fn set_phase(&self, phase: BuildPhase) {
        tracing::trace!(?phase, "build phase");
        self.phase.store(phase.to_u8(), Ordering::Release);
    }

    /// Run a build, turning a panic anywhere in the pipeline into
    /// [`BuildError::Aborted`].
    fn run_admitted(
        &self,
        mode: BuildMode,
        consumer: &mut dyn CompileConsumer,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, BuildError> {
        match panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(mode, consumer, progress, cancel)
        })) {
            Ok(result) => result,
            Err(payload) => {
                let message = crate::panic_message(payload.as_ref());
                tracing::error!(%message, "build process aborted");
                Err(self.abort(BuildError::Aborted(message)))
            }
        }
    }

    /// Leave state as it was before the build and record a failed report.
    fn abort(&self, error: BuildError) -> BuildError {
        {
            let mut state = self.state.lock();
            state.resolver.rollback();
            state.last_report = Some(BuildReport::failed(&error));
        }
        self.set_phase(BuildPhase::Idle);
        error
    }

    #[tracing::instrument(level = "debug", skip_all, fields(mode = ?mode))]
    fn run(
        &self,
        mode: BuildMode,
        consumer: &mut dyn CompileConsumer,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, BuildError> {
        self.set_phase(BuildPhase::Resolving);
        let tree = SourceTree::scan(&self.config);
        let plan = match self.plan(mode, &tree) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(%err, "build aborted");
                return Err(self.abort(err));
            }
        };

        self.set_phase(BuildPhase::Compiling);
        let debugger = self.debugger.lock().clone();
        let policy = if debugger.is_some() {
            PartitionPolicy::CollectClean
        } else {
            PartitionPolicy::ErrantOnly
        };
        let mut partition = Partition::new(policy, plan.carried);
        let mut aggregator = DiagnosticsAggregator::new();

        progress.set_total(plan.units.len());
        let mut compiled = 0;
        let mut accepted = true;
        let mut cancelled = false;
        {
            let mut chain = (&mut partition)
                .then(&mut aggregator)
                .then(&mut *consumer);
            for unit in &plan.units {
                if cancel.is_cancelled() {
                    tracing::debug!(
                        compiled,
                        remaining = plan.units.len() - compiled,
                        "build cancelled"
                    );
                    cancelled = true;
                    break;
                }
                let result = self.compile_unit(unit);
                accepted &= chain.accept(&result);
                compiled += 1;
                progress.advance(unit.name.as_str());
            }
        }

        self.set_phase(BuildPhase::Finalizing);
        let clean = partition.take_clean();
        let redefined = match &debugger {
            Some(session) if !clean.is_empty() => {
                if hot_swap::notify(session.as_ref(), &clean) {
                    clean.len()
                } else {
                    0
                }
            }
            _ => 0,
        };

        let report = aggregator.finish(!cancelled);
        {
            let mut state = self.state.lock();
            state.errant = partition.into_errant();
            if cancelled {
                state.resolver.rollback();
            } else {
                state.resolver.commit();
            }
            state.last_report = Some(report.clone());
        }
        self.set_phase(BuildPhase::Idle);

        tracing::debug!(
            full = plan.full,
            compiled,
            errors = report.error_count,
            warnings = report.warning_count,
            redefined,
            "build finished"
        );

        Ok(BuildOutcome {
            full: plan.full,
            completed: !cancelled,
            accepted,
            compiled,
            redefined,
            error_count: report.error_count,
            warning_count: report.warning_count,
            report,
        })
    }

    /// Decide what to compile and prepare the output directory.
    fn plan(&self, mode: BuildMode, tree: &SourceTree) -> Result<BuildPlan, BuildError> {
        let (changes, carried) = {
            let mut state = self.state.lock();
            if mode == BuildMode::Rebuild {
                state.resolver.force_full();
            }
            (state.resolver.resolve_changes(tree), state.errant.clone())
        };

        match changes {
            ChangeSet::All => {
                if self.config.static_compile {
                    if let Some(dir) = &self.config.output_dir {
                        let output = OutputDir::new(dir);
                        output.clean()?;
                        output.copy_source_path(tree)?;
                    }
                }
                let units = tree.types().cloned().collect();
                Ok(BuildPlan {
                    full: true,
                    units,
                    carried: FxHashSet::default(),
                })
            }
            ChangeSet::Changed(changes) => {
                let output = self.config.output_dir.as_ref().map(OutputDir::new);
                let mut changed_types = Vec::new();
                for change in &changes {
                    match tree.classify(&change.root, &change.path) {
                        Some(CompilationUnit::Type(unit)) => changed_types.push(unit.name),
                        Some(CompilationUnit::Resource(resource)) => {
                            if change.kind == ChangeKind::Removed {
                                continue;
                            }
                            if let Some(output) = &output {
                                output.copy_resource(&resource)?;
                            }
                        }
                        None => {}
                    }
                }

                let expander = DependencyExpander::new(self.search.as_ref(), tree);
                let mut names: BTreeSet<TypeName> =
                    expander.expand_all(&changed_types).into_iter().collect();
                names.extend(carried.iter().cloned());

                // Removed types are no longer in the tree and leave the
                // errant set with it.
                let units: Vec<TypeUnit> =
                    names.iter().filter_map(|name| tree.get(name)).cloned().collect();
                let carried = carried.into_iter().filter(|name| tree.contains(name)).collect();

                tracing::debug!(
                    changed = changes.len(),
                    changed_types = changed_types.len(),
                    units = units.len(),
                    "planned incremental build"
                );
                Ok(BuildPlan {
                    full: false,
                    units,
                    carried,
                })
            }
        }
    }

    /// Compile one unit, turning an engine panic into an internal error on
    /// that unit.
    fn compile_unit(&self, unit: &TypeUnit) -> CompileResult {
        let compiled = panic::catch_unwind(AssertUnwindSafe(|| self.engine.compile(unit)));
        let mut result = match compiled {
            Ok(result) => result,
            Err(payload) => {
                let message = crate::panic_message(payload.as_ref());
                tracing::warn!(unit = %unit.name, %message, "compile engine panicked");
                let diagnostic = Diagnostic::error(ErrorCode::E9001)
                    .with_message("internal compiler error: compile engine panicked")
                    .in_unit(unit.name.as_str())
                    .with_note(message);
                return CompileResult::failed(unit.name.clone(), vec![diagnostic]);
            }
        };

        result.unit = unit.name.clone();
        if !result.success && result.error_count() == 0 {
            result.diagnostics.push(
                Diagnostic::error(ErrorCode::E7004)
                    .with_message("compilation failed without reporting an error")
                    .in_unit(unit.name.as_str()),
            );
        }
        result
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
