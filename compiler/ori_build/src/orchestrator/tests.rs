use std::fs;
use std::sync::atomic::AtomicUsize;

use pretty_assertions::assert_eq;

use super::*;
use crate::consumer::from_fn;
use crate::deps::UsageGraph;
use crate::progress::ProgressState;
use crate::report::NodeKind;
use crate::testing::{RecordingHotSwap, Script, ScriptedEngine, SourceFixture};

fn fixture(types: &[&str]) -> SourceFixture {
    let fixture = SourceFixture::new();
    for name in types {
        fixture.write(&format!("{name}.ori"), &format!("type {name}"));
    }
    fixture
}

fn orchestrator(
    config: BuildConfig,
    engine: &Arc<ScriptedEngine>,
    graph: UsageGraph,
) -> Orchestrator {
    Orchestrator::new(config, engine.clone()).with_search(Arc::new(graph))
}

fn errant(orchestrator: &Orchestrator) -> Vec<String> {
    orchestrator
        .errant_units()
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn test_first_build_is_full_and_ordered() {
    let fixture = fixture(&["C", "A", "B"]);
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    let outcome = orchestrator.make().unwrap();

    assert!(outcome.full);
    assert!(outcome.succeeded());
    assert_eq!(outcome.compiled, 3);
    assert_eq!(engine.take_calls(), vec!["A", "B", "C"]);
    assert_eq!(orchestrator.phase(), BuildPhase::Idle);
    assert!(!orchestrator.is_running());
}

#[test]
fn test_build_without_edits_compiles_nothing() {
    let fixture = fixture(&["A", "B"]);
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    orchestrator.make().unwrap();
    engine.take_calls();

    let outcome = orchestrator.make().unwrap();
    assert!(!outcome.full);
    assert_eq!(outcome.compiled, 0);
    assert!(engine.take_calls().is_empty());
    assert_eq!(
        outcome.report.summary().unwrap().message,
        "Compilation completed with 0 errors and 0 warnings"
    );
}

#[test]
fn test_incremental_expands_multi_hop() {
    let fixture = fixture(&["A", "B", "C", "D"]);
    let engine = Arc::new(ScriptedEngine::new());
    let graph = UsageGraph::new().with_use("B", "A").with_use("C", "B");
    let orchestrator = orchestrator(fixture.config(), &engine, graph);

    orchestrator.make().unwrap();
    engine.take_calls();

    fixture.write("A.ori", "type A = int");
    orchestrator.make().unwrap();
    assert_eq!(engine.take_calls(), vec!["A", "B", "C"]);
}

#[test]
fn test_shared_dependent_compiled_once() {
    let fixture = fixture(&["A", "B", "Shared"]);
    let engine = Arc::new(ScriptedEngine::new());
    let graph = UsageGraph::new()
        .with_use("Shared", "A")
        .with_use("Shared", "B");
    let orchestrator = orchestrator(fixture.config(), &engine, graph);

    orchestrator.make().unwrap();
    engine.take_calls();

    fixture.write("A.ori", "type A = int");
    fixture.write("B.ori", "type B = int");
    orchestrator.make().unwrap();
    assert_eq!(engine.take_calls(), vec!["A", "B", "Shared"]);
}

#[test]
fn test_errant_unit_is_retried_until_clean() {
    let fixture = fixture(&["A", "B", "D"]);
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("B", Script::Fail);
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    let outcome = orchestrator.make().unwrap();
    assert!(!outcome.succeeded());
    assert_eq!(errant(&orchestrator), vec!["B"]);
    engine.take_calls();

    // B is offered again although only D changed.
    fixture.write("D.ori", "type D = int");
    orchestrator.make().unwrap();
    assert_eq!(engine.take_calls(), vec!["B", "D"]);
    assert_eq!(errant(&orchestrator), vec!["B"]);

    engine.script("B", Script::Clean);
    let outcome = orchestrator.make().unwrap();
    assert_eq!(engine.take_calls(), vec!["B"]);
    assert!(outcome.succeeded());
    assert!(errant(&orchestrator).is_empty());

    orchestrator.make().unwrap();
    assert!(engine.take_calls().is_empty());
}

#[test]
fn test_rebuild_compiles_each_unit_once() {
    let fixture = fixture(&["A", "B"]);
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("B", Script::Fail);
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    orchestrator.make().unwrap();
    engine.take_calls();
    engine.script("B", Script::Clean);

    let outcome = orchestrator.rebuild().unwrap();
    assert!(outcome.full);
    assert_eq!(engine.take_calls(), vec!["A", "B"]);
    assert!(errant(&orchestrator).is_empty());

    // The rebuild captured a fresh baseline.
    assert_eq!(orchestrator.make().unwrap().compiled, 0);
}

#[test]
fn test_removed_errant_unit_is_dropped() {
    let fixture = fixture(&["A", "B"]);
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("B", Script::Fail);
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    orchestrator.make().unwrap();
    engine.take_calls();

    fixture.remove("B.ori");
    orchestrator.make().unwrap();
    assert!(engine.take_calls().is_empty());
    assert!(errant(&orchestrator).is_empty());
}

#[test]
fn test_removed_type_recompiles_dependents() {
    let fixture = fixture(&["A", "B"]);
    let engine = Arc::new(ScriptedEngine::new());
    let graph = UsageGraph::new().with_use("B", "A");
    let orchestrator = orchestrator(fixture.config(), &engine, graph);

    orchestrator.make().unwrap();
    engine.take_calls();

    fixture.remove("A.ori");
    orchestrator.make().unwrap();
    assert_eq!(engine.take_calls(), vec!["B"]);
}

#[test]
fn test_only_clean_classes_are_hot_swapped() {
    let fixture = fixture(&["A", "B", "C"]);
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("C", Script::Fail);
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());
    let session = Arc::new(RecordingHotSwap::new());
    orchestrator.attach_debugger(session.clone());

    let outcome = orchestrator.make().unwrap();

    assert_eq!(outcome.redefined, 2);
    assert_eq!(session.batches(), vec![vec!["A", "B"]]);
    assert_eq!(errant(&orchestrator), vec!["C"]);
}

#[test]
fn test_no_hot_swap_without_clean_classes_or_session() {
    let fixture = fixture(&["A"]);
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());
    let session = Arc::new(RecordingHotSwap::new());
    orchestrator.attach_debugger(session.clone());

    orchestrator.make().unwrap();
    // Nothing changed: nothing to forward.
    orchestrator.make().unwrap();
    assert_eq!(session.batches().len(), 1);

    assert!(orchestrator.detach_debugger().is_some());
    assert!(!orchestrator.has_debugger());
    let outcome = orchestrator.rebuild().unwrap();
    assert_eq!(outcome.redefined, 0);
    assert_eq!(session.batches().len(), 1);
}

#[test]
fn test_hot_swap_failure_does_not_fail_build() {
    let fixture = fixture(&["A"]);
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());
    let session = Arc::new(RecordingHotSwap::rejecting());
    orchestrator.attach_debugger(session.clone());

    let outcome = orchestrator.make().unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.redefined, 0);
    assert_eq!(session.batches().len(), 1);
}

#[test]
fn test_report_counts() {
    let fixture = fixture(&["E1", "E2", "W", "C1", "C2"]);
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("E1", Script::Fail);
    engine.script("E2", Script::Fail);
    engine.script("W", Script::Warn);
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    let outcome = orchestrator.make().unwrap();

    assert_eq!(outcome.error_count, 2);
    assert_eq!(outcome.warning_count, 1);
    assert!(outcome.completed);
    assert!(!outcome.accepted);
    let summary = outcome.report.summary().unwrap();
    assert_eq!(summary.kind, NodeKind::Error);
    assert_eq!(
        summary.message,
        "Compilation completed with 2 errors and 1 warning"
    );
    assert_eq!(errant(&orchestrator), vec!["E1", "E2"]);
    assert_eq!(orchestrator.last_report(), Some(outcome.report));
}

#[test]
fn test_engine_panic_becomes_internal_error() {
    let fixture = fixture(&["A", "B"]);
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("A", Script::Panic);
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    let outcome = orchestrator.make().unwrap();

    assert!(outcome.completed);
    assert_eq!(outcome.compiled, 2);
    assert_eq!(errant(&orchestrator), vec!["A"]);
    let codes: Vec<Option<ErrorCode>> = outcome
        .report
        .diagnostics()
        .iter()
        .map(|d| d.code.known())
        .collect();
    assert_eq!(codes, vec![Some(ErrorCode::E9001)]);
}

#[test]
fn test_silent_failure_gets_error() {
    let fixture = fixture(&["A"]);
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("A", Script::Silent);
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    let outcome = orchestrator.make().unwrap();
    assert_eq!(outcome.error_count, 1);
    assert_eq!(
        outcome.report.diagnostics()[0].code.known(),
        Some(ErrorCode::E7004)
    );
}

#[test]
fn test_consumer_sees_every_result() {
    let fixture = fixture(&["A", "B"]);
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("B", Script::Fail);
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    let mut seen = Vec::new();
    let mut consumer = from_fn(|result: &CompileResult| {
        seen.push((result.unit.to_string(), result.is_errant()));
        true
    });
    let outcome = orchestrator
        .build(BuildMode::Auto, &mut consumer, &())
        .unwrap();

    assert!(outcome.accepted);
    assert_eq!(
        seen,
        vec![("A".to_string(), false), ("B".to_string(), true)]
    );
}

#[test]
fn test_progress_reports_unit_names() {
    let fixture = fixture(&["A", "B"]);
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());
    let progress = ProgressState::new();

    orchestrator
        .build(BuildMode::Auto, &mut (), &progress)
        .unwrap();

    let snapshot = progress.snapshot();
    assert_eq!(snapshot.total, 2);
    assert_eq!(snapshot.completed, 2);
    assert_eq!(snapshot.label.as_deref(), Some("B"));
}

#[test]
fn test_cancelled_build_finalizes_and_stays_full() {
    let fixture = fixture(&["A", "B", "C"]);
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());
    let cancel = CancelToken::new();

    let token = cancel.clone();
    let mut consumer = from_fn(move |_: &CompileResult| {
        token.cancel();
        true
    });
    let outcome = orchestrator
        .build_cancellable(BuildMode::Auto, &mut consumer, &(), &cancel)
        .unwrap();

    assert!(!outcome.completed);
    assert_eq!(outcome.compiled, 1);
    assert_eq!(
        outcome.report.summary().unwrap().kind,
        NodeKind::Failure
    );
    assert_eq!(orchestrator.phase(), BuildPhase::Idle);
    engine.take_calls();

    // The interrupted full build is not forgotten.
    let outcome = orchestrator.make().unwrap();
    assert!(outcome.full);
    assert_eq!(engine.take_calls(), vec!["A", "B", "C"]);
}

#[test]
fn test_io_failure_leaves_state_unchanged() {
    let fixture = fixture(&["A", "B"]);
    let out = fixture.path().join("out");
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("B", Script::Fail);
    let config = fixture.config().with_output_dir(&out);
    let orchestrator = orchestrator(config, &engine, UsageGraph::new());

    orchestrator.make().unwrap();
    engine.take_calls();

    fixture.write("A.ori", "type A = int");
    fixture.write("res/data.txt", "payload");
    // A file where the output directory should be makes the copy fail.
    fs::write(&out, "in the way").unwrap();

    let err = orchestrator.make().unwrap_err();
    assert!(matches!(err, BuildError::Copy { .. }));
    assert!(engine.take_calls().is_empty());
    assert_eq!(errant(&orchestrator), vec!["B"]);
    assert!(!orchestrator.last_report().unwrap().completed);
    assert_eq!(orchestrator.phase(), BuildPhase::Idle);

    // Once the output is usable the same changes are picked up again.
    fs::remove_file(&out).unwrap();
    orchestrator.make().unwrap();
    assert_eq!(engine.take_calls(), vec!["A", "B"]);
    assert_eq!(
        fs::read_to_string(out.join("res").join("data.txt")).unwrap(),
        "payload"
    );
}

#[test]
fn test_static_rebuild_cleans_and_copies_output() {
    let fixture = fixture(&["A"]);
    fixture.write("app/logo.svg", "<svg/>");
    let out = fixture.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("Stale.class"), "old").unwrap();

    let engine = Arc::new(ScriptedEngine::new());
    let config = fixture
        .config()
        .with_output_dir(&out)
        .with_static_compile(true);
    let orchestrator = orchestrator(config, &engine, UsageGraph::new());

    orchestrator.rebuild().unwrap();

    assert!(!out.join("Stale.class").exists());
    assert!(out.join("A.ori").is_file());
    assert!(out.join("app").join("logo.svg").is_file());
}

#[test]
fn test_output_dir_inside_source_root_is_not_compiled() {
    let fixture = SourceFixture::new();
    fixture.write("app/A.ori", "type A");
    let out = fixture.root().join("out");
    let engine = Arc::new(ScriptedEngine::new());
    let config = fixture
        .config()
        .with_output_dir(&out)
        .with_static_compile(true);
    let orchestrator = orchestrator(config, &engine, UsageGraph::new());

    let outcome = orchestrator.rebuild().unwrap();
    assert!(outcome.succeeded());
    assert_eq!(engine.take_calls(), vec!["app.A"]);
    assert!(out.join("app").join("A.ori").is_file());

    // The copies in the output directory are not new sources.
    let outcome = orchestrator.make().unwrap();
    assert_eq!(outcome.compiled, 0);
    assert!(engine.take_calls().is_empty());

    let outcome = orchestrator.rebuild().unwrap();
    assert!(outcome.succeeded());
    assert_eq!(engine.take_calls(), vec!["app.A"]);
    assert!(out.join("app").join("A.ori").is_file());
}

#[test]
fn test_incremental_build_copies_changed_resources() {
    let fixture = fixture(&["A"]);
    let out = fixture.path().join("out");
    let engine = Arc::new(ScriptedEngine::new());
    let config = fixture.config().with_output_dir(&out);
    let orchestrator = orchestrator(config, &engine, UsageGraph::new());

    orchestrator.make().unwrap();
    engine.take_calls();

    fixture.write("app/res/data.txt", "v1");
    let outcome = orchestrator.make().unwrap();
    assert!(!outcome.full);
    assert_eq!(outcome.compiled, 0);
    let copied = out.join("app").join("res").join("data.txt");
    assert_eq!(fs::read_to_string(&copied).unwrap(), "v1");

    fixture.write("app/res/data.txt", "v2");
    orchestrator.make().unwrap();
    assert_eq!(fs::read_to_string(&copied).unwrap(), "v2");

    // Removing a resource leaves its last copy alone.
    fixture.remove("app/res/data.txt");
    assert!(orchestrator.make().unwrap().succeeded());
    assert!(copied.is_file());
    assert!(engine.take_calls().is_empty());
}

#[test]
fn test_cancelled_build_still_hot_swaps_clean_classes() {
    let fixture = fixture(&["A", "B", "C"]);
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());
    let session = Arc::new(RecordingHotSwap::new());
    orchestrator.attach_debugger(session.clone());
    let cancel = CancelToken::new();

    let token = cancel.clone();
    let mut consumer = from_fn(move |_: &CompileResult| {
        token.cancel();
        true
    });
    let outcome = orchestrator
        .build_cancellable(BuildMode::Auto, &mut consumer, &(), &cancel)
        .unwrap();

    assert!(!outcome.completed);
    assert_eq!(outcome.compiled, 1);
    assert_eq!(outcome.redefined, 1);
    assert_eq!(session.batches(), vec![vec!["A"]]);
}

#[test]
fn test_admission_gate_rejects_second_build() {
    let fixture = fixture(&["A"]);
    let (engine, release) = ScriptedEngine::gated();
    let engine = Arc::new(engine);
    let orchestrator = Arc::new(orchestrator(fixture.config(), &engine, UsageGraph::new()));
    let progress = Arc::new(ProgressState::new());

    let handle = orchestrator
        .spawn(BuildMode::Auto, Box::new(()), progress.clone())
        .unwrap();

    assert!(orchestrator.is_running());
    assert!(matches!(
        orchestrator.make(),
        Err(BuildError::AlreadyRunning)
    ));
    assert!(matches!(
        orchestrator.spawn(BuildMode::Auto, Box::new(()), Arc::new(())),
        Err(BuildError::AlreadyRunning)
    ));
    assert!(matches!(
        orchestrator.reset(),
        Err(BuildError::AlreadyRunning)
    ));

    drop(release);
    let outcome = handle.wait().unwrap();
    assert!(outcome.succeeded());
    assert_eq!(progress.snapshot().completed, 1);

    assert!(!orchestrator.is_running());
    assert!(orchestrator.make().is_ok());
}

#[test]
fn test_spawned_build_can_be_cancelled() {
    let fixture = fixture(&["A", "B", "C"]);
    let (engine, release) = ScriptedEngine::gated();
    let engine = Arc::new(engine);
    let orchestrator = Arc::new(orchestrator(fixture.config(), &engine, UsageGraph::new()));

    let handle = orchestrator
        .spawn(BuildMode::Auto, Box::new(()), Arc::new(()))
        .unwrap();
    handle.cancel();
    drop(release);

    let outcome = handle.wait().unwrap();
    assert!(!outcome.completed);
    assert!(outcome.compiled <= 1);
}

#[test]
fn test_is_finished_keeps_result() {
    let fixture = fixture(&["A"]);
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = Arc::new(orchestrator(fixture.config(), &engine, UsageGraph::new()));

    let mut handle = orchestrator
        .spawn(BuildMode::Auto, Box::new(()), Arc::new(()))
        .unwrap();
    while !handle.is_finished() {
        std::thread::yield_now();
    }
    assert!(handle.wait().unwrap().succeeded());
}

#[test]
fn test_consumer_panic_aborts_build() {
    let fixture = fixture(&["A"]);
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    let mut consumer = from_fn(|_: &CompileResult| -> bool { panic!("listener broke") });
    let err = orchestrator
        .build(BuildMode::Auto, &mut consumer, &())
        .unwrap_err();

    assert!(matches!(err, BuildError::Aborted(ref message) if message == "listener broke"));
    assert!(!orchestrator.is_running());
    assert_eq!(orchestrator.phase(), BuildPhase::Idle);
    // The aborted full build is retried.
    assert!(orchestrator.make().unwrap().full);
}

#[test]
fn test_reset_forces_full_build() {
    let fixture = fixture(&["A"]);
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("A", Script::Fail);
    let orchestrator = orchestrator(fixture.config(), &engine, UsageGraph::new());

    orchestrator.make().unwrap();
    orchestrator.reset().unwrap();

    assert!(errant(&orchestrator).is_empty());
    assert!(orchestrator.last_report().is_none());
    assert!(orchestrator.make().unwrap().full);
}

#[test]
fn test_textual_search_by_default() {
    let fixture = SourceFixture::new();
    fixture.write("model/User.ori", "type User = { name: str }");
    fixture.write("Main.ori", "use model.User\n@main () -> void = ()");
    fixture.write("Other.ori", "type Other = int");
    let engine = Arc::new(ScriptedEngine::new());
    let orchestrator = Orchestrator::new(fixture.config(), engine.clone());

    orchestrator.make().unwrap();
    engine.take_calls();

    fixture.write("model/User.ori", "type User = { name: str, age: int }");
    orchestrator.make().unwrap();
    assert_eq!(engine.take_calls(), vec!["Main", "model.User"]);
}

#[test]
fn test_parallel_orchestrators_do_not_share_state() {
    let first = fixture(&["A"]);
    let second = fixture(&["B"]);
    let engine = Arc::new(ScriptedEngine::new());
    let builds = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for fixture in [&first, &second] {
            let engine = &engine;
            let builds = &builds;
            scope.spawn(move || {
                let orchestrator = orchestrator(fixture.config(), engine, UsageGraph::new());
                assert!(orchestrator.make().unwrap().full);
                builds.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    assert_eq!(builds.load(Ordering::SeqCst), 2);
}
