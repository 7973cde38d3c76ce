//! Change detection between builds.
//!
//! The resolver keeps a baseline of content fingerprints per source root and
//! reports which files were added, modified or removed since that baseline.
//! The very first resolution (and any resolution after [`force_full`]) reports
//! [`ChangeSet::All`].
//!
//! Each resolution advances the baseline immediately but keeps the previous
//! one as a checkpoint, so a build that aborts can [`rollback`] and have the
//! same changes reported again.
//!
//! [`force_full`]: ChangeSetResolver::force_full
//! [`rollback`]: ChangeSetResolver::rollback

use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHasher};

use crate::SourceTree;

/// How a file differs from the baseline.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One changed file, with the source root it belongs to.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct SourceChange {
    pub root: PathBuf,
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Files selected for a build.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ChangeSet {
    /// Everything must be rebuilt.
    All,
    /// Only these files changed, ordered by path.
    Changed(Vec<SourceChange>),
}

impl ChangeSet {
    pub fn is_all(&self) -> bool {
        matches!(self, ChangeSet::All)
    }

    /// True for an incremental change set with nothing in it.
    pub fn is_empty(&self) -> bool {
        matches!(self, ChangeSet::Changed(changes) if changes.is_empty())
    }

    pub fn changes(&self) -> &[SourceChange] {
        match self {
            ChangeSet::All => &[],
            ChangeSet::Changed(changes) => changes,
        }
    }
}

/// Content fingerprint of one file.
#[derive(Copy, Clone, Debug)]
enum Fingerprint {
    Content { len: u64, hash: u64 },
    /// Could not be read; never equal to anything, so it is always reported.
    Unreadable,
}

impl Fingerprint {
    fn of(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => {
                let mut hasher = FxHasher::default();
                hasher.write(&bytes);
                Fingerprint::Content {
                    len: bytes.len() as u64,
                    hash: hasher.finish(),
                }
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "cannot fingerprint file");
                Fingerprint::Unreadable
            }
        }
    }

    fn matches(self, other: Self) -> bool {
        match (self, other) {
            (
                Fingerprint::Content { len: a, hash: h },
                Fingerprint::Content { len: b, hash: g },
            ) => a == b && h == g,
            _ => false,
        }
    }
}

type Baseline = FxHashMap<PathBuf, Fingerprint>;

#[derive(Clone, Debug)]
struct Checkpoint {
    baselines: FxHashMap<PathBuf, Baseline>,
    refresh_all: bool,
}

/// Tracks source changes across builds.
#[derive(Debug)]
pub struct ChangeSetResolver {
    /// Baseline per source root.
    baselines: FxHashMap<PathBuf, Baseline>,
    refresh_all: bool,
    /// State before the last uncommitted resolution.
    checkpoint: Option<Checkpoint>,
}

impl Default for ChangeSetResolver {
    fn default() -> Self {
        ChangeSetResolver {
            baselines: FxHashMap::default(),
            refresh_all: true,
            checkpoint: None,
        }
    }
}

impl ChangeSetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next resolution report everything.
    pub fn force_full(&mut self) {
        self.refresh_all = true;
    }

    /// Whether the next resolution will report everything.
    pub fn needs_full(&self) -> bool {
        self.refresh_all
    }

    /// Compare `tree` against the baseline and advance the baseline.
    #[tracing::instrument(level = "debug", skip_all, fields(roots = tree.roots().len()))]
    pub fn resolve_changes(&mut self, tree: &SourceTree) -> ChangeSet {
        let current: FxHashMap<PathBuf, Baseline> = tree
            .roots()
            .iter()
            .map(|root| {
                let baseline = tree
                    .files_under(root)
                    .iter()
                    .map(|path| (path.clone(), Fingerprint::of(path)))
                    .collect();
                (root.clone(), baseline)
            })
            .collect();

        // An older checkpoint wins: several resolutions without a commit
        // roll back to the last committed state.
        if self.checkpoint.is_none() {
            self.checkpoint = Some(Checkpoint {
                baselines: self.baselines.clone(),
                refresh_all: self.refresh_all,
            });
        }

        if self.refresh_all {
            self.refresh_all = false;
            self.baselines = current;
            tracing::debug!("full refresh requested");
            return ChangeSet::All;
        }

        let empty = Baseline::default();
        let mut changes = Vec::new();
        for (root, now) in &current {
            let before = self.baselines.get(root).unwrap_or(&empty);
            for (path, fingerprint) in now {
                let kind = match before.get(path) {
                    None => Some(ChangeKind::Added),
                    Some(old) if !old.matches(*fingerprint) => Some(ChangeKind::Modified),
                    Some(_) => None,
                };
                if let Some(kind) = kind {
                    changes.push(SourceChange {
                        root: root.clone(),
                        path: path.clone(),
                        kind,
                    });
                }
            }
            for path in before.keys().filter(|path| !now.contains_key(*path)) {
                changes.push(SourceChange {
                    root: root.clone(),
                    path: path.clone(),
                    kind: ChangeKind::Removed,
                });
            }
        }
        changes.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!(changed = changes.len(), "resolved changes");
        self.baselines = current;
        ChangeSet::Changed(changes)
    }

    /// Accept the last resolution as the new baseline.
    pub fn commit(&mut self) {
        self.checkpoint = None;
    }

    /// Restore the baseline from before the last uncommitted resolution.
    pub fn rollback(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            self.baselines = checkpoint.baselines;
            self.refresh_all = checkpoint.refresh_all;
        }
    }

    /// Forget all baselines; the next resolution reports everything.
    pub fn reset(&mut self) {
        self.baselines.clear();
        self.checkpoint = None;
        self.refresh_all = true;
    }
}
