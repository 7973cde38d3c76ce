//! Handle to a build running on a worker thread.

use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, TryRecvError};

use super::{BuildOutcome, CancelToken};
use crate::BuildError;

type BuildResult = Result<BuildOutcome, BuildError>;

/// A build started with [`Orchestrator::spawn`](super::Orchestrator::spawn).
///
/// The worker writes its result exactly once. Dropping the handle lets the
/// build run to completion unobserved.
pub struct BuildHandle {
    receiver: Receiver<BuildResult>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
    /// Result already taken off the channel by [`is_finished`](Self::is_finished).
    done: Option<BuildResult>,
}

impl BuildHandle {
    pub(super) fn new(
        receiver: Receiver<BuildResult>,
        cancel: CancelToken,
        thread: JoinHandle<()>,
    ) -> Self {
        BuildHandle {
            receiver,
            cancel,
            thread: Some(thread),
            done: None,
        }
    }

    /// Ask the build to stop before its next unit.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Whether the result is available without blocking.
    pub fn is_finished(&mut self) -> bool {
        if self.done.is_some() {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.done = Some(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => true,
        }
    }

    /// Block until the build finishes.
    pub fn wait(mut self) -> BuildResult {
        let result = match self.done.take() {
            Some(result) => result,
            None => self.receiver.recv().unwrap_or_else(|_| {
                Err(BuildError::Aborted(
                    "build worker exited without a result".to_string(),
                ))
            }),
        };
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("build worker panicked after reporting");
            }
        }
        result
    }
}
