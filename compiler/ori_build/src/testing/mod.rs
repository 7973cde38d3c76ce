//! Test doubles for the orchestrator's collaborators.

use std::fs;
use std::path::{Path, PathBuf};

use crossbeam::channel::{Receiver, Sender};
use ori_diagnostic::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tempfile::TempDir;

use crate::engine::CompileEngine;
use crate::hot_swap::{HotSwap, HotSwapError};
use crate::unit::{CompileResult, CompiledClass, TypeName, TypeUnit};
use crate::BuildConfig;

/// What [`ScriptedEngine`] does with a unit.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Script {
    Clean,
    /// Compiles, with one warning.
    Warn,
    /// One error at line 1.
    Fail,
    /// Fails without any diagnostic.
    Silent,
    Panic,
}

/// Engine whose behavior per unit is set by the test. Units default to
/// [`Script::Clean`].
#[derive(Default)]
pub(crate) struct ScriptedEngine {
    scripts: Mutex<FxHashMap<TypeName, Script>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Receiver<()>>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// An engine that blocks before every unit until the returned sender
    /// releases it (one message per unit, or drop the sender).
    pub(crate) fn gated() -> (Self, Sender<()>) {
        let (sender, receiver) = crossbeam::channel::unbounded();
        let engine = ScriptedEngine {
            gate: Some(receiver),
            ..Self::default()
        };
        (engine, sender)
    }

    pub(crate) fn script(&self, name: &str, script: Script) {
        self.scripts.lock().insert(TypeName::new(name), script);
    }

    /// Units compiled since the last call, in order.
    pub(crate) fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock())
    }
}

impl CompileEngine for ScriptedEngine {
    fn compile(&self, unit: &TypeUnit) -> CompileResult {
        if let Some(gate) = &self.gate {
            gate.recv().ok();
        }
        self.calls.lock().push(unit.name.to_string());

        let script = self
            .scripts
            .lock()
            .get(&unit.name)
            .copied()
            .unwrap_or(Script::Clean);
        let name = unit.name.clone();
        let class = CompiledClass::new(name.clone(), name.as_str().as_bytes().to_vec());

        match script {
            Script::Clean => CompileResult::compiled(class),
            Script::Warn => CompileResult::compiled(class).with_diagnostic(
                Diagnostic::warning("W0001")
                    .with_message("unused binding")
                    .at(name.as_str(), 1),
            ),
            Script::Fail => CompileResult::failed(
                name.clone(),
                vec![Diagnostic::error("E2001")
                    .with_message("type mismatch")
                    .at(name.as_str(), 1)],
            ),
            Script::Silent => CompileResult::failed(name, Vec::new()),
            Script::Panic => panic!("engine exploded on {name}"),
        }
    }
}

/// Debug session that records what it is asked to redefine.
#[derive(Default)]
pub(crate) struct RecordingHotSwap {
    batches: Mutex<Vec<Vec<String>>>,
    reject: bool,
}

impl RecordingHotSwap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A session that records, then rejects every batch.
    pub(crate) fn rejecting() -> Self {
        RecordingHotSwap {
            reject: true,
            ..Self::default()
        }
    }

    pub(crate) fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }
}

impl HotSwap for RecordingHotSwap {
    fn redefine(&self, classes: &[CompiledClass]) -> Result<(), HotSwapError> {
        let names = classes.iter().map(|c| c.name.to_string()).collect();
        self.batches.lock().push(names);
        if self.reject {
            Err(HotSwapError::Rejected("schema change".to_string()))
        } else {
            Ok(())
        }
    }
}

/// A source root in a temporary directory.
pub(crate) struct SourceFixture {
    dir: TempDir,
}

impl SourceFixture {
    #[expect(clippy::unwrap_used, reason = "Test fixture")]
    pub(crate) fn new() -> Self {
        SourceFixture {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// `src` under the temporary directory; siblings are free for output.
    pub(crate) fn root(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn config(&self) -> BuildConfig {
        BuildConfig::new(self.root())
    }

    /// Write a file under the source root, creating package directories.
    #[expect(clippy::unwrap_used, reason = "Test fixture")]
    pub(crate) fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[expect(clippy::unwrap_used, reason = "Test fixture")]
    pub(crate) fn remove(&self, relative: &str) {
        fs::remove_file(self.root().join(relative)).unwrap();
    }
}
