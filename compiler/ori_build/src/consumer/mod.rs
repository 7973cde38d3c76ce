//! Consumers of compile results.
//!
//! Every result of a build flows through one consumer chain. The chain is
//! built per build: the [`Partition`] for the current debug policy, the
//! diagnostics aggregator, then the caller's own consumer. Every link sees
//! every result.

use std::mem;

use rustc_hash::FxHashSet;

use crate::unit::{CompileResult, CompiledClass, TypeName};

/// Receives each compile result exactly once.
pub trait CompileConsumer {
    /// Returns whether the consumer accepts the result as clean.
    fn accept(&mut self, result: &CompileResult) -> bool;
}

impl<C: CompileConsumer + ?Sized> CompileConsumer for &mut C {
    fn accept(&mut self, result: &CompileResult) -> bool {
        (**self).accept(result)
    }
}

impl<C: CompileConsumer + ?Sized> CompileConsumer for Box<C> {
    fn accept(&mut self, result: &CompileResult) -> bool {
        (**self).accept(result)
    }
}

/// Consumer that ignores results and accepts every clean one.
impl CompileConsumer for () {
    fn accept(&mut self, result: &CompileResult) -> bool {
        !result.is_errant()
    }
}

/// A closure used as a consumer. See [`from_fn`].
pub struct FnConsumer<F>(F);

/// Wrap a closure as a [`CompileConsumer`].
pub fn from_fn<F>(f: F) -> FnConsumer<F>
where
    F: FnMut(&CompileResult) -> bool,
{
    FnConsumer(f)
}

impl<F> CompileConsumer for FnConsumer<F>
where
    F: FnMut(&CompileResult) -> bool,
{
    fn accept(&mut self, result: &CompileResult) -> bool {
        (self.0)(result)
    }
}

/// Two consumers run in sequence. Both always run.
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A: CompileConsumer, B: CompileConsumer> CompileConsumer for Chain<A, B> {
    fn accept(&mut self, result: &CompileResult) -> bool {
        let first = self.first.accept(result);
        let second = self.second.accept(result);
        first || second
    }
}

pub trait CompileConsumerExt: CompileConsumer + Sized {
    /// Run `next` after `self` on every result.
    ///
    /// The chain accepts a result when either side does.
    fn then<B: CompileConsumer>(self, next: B) -> Chain<Self, B> {
        Chain {
            first: self,
            second: next,
        }
    }
}

impl<C: CompileConsumer> CompileConsumerExt for C {}

/// What the partition does with clean results.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PartitionPolicy {
    /// A debug session is attached: keep clean classes for redefinition.
    CollectClean,
    /// No debug session: only track errant units.
    ErrantOnly,
}

/// Splits results into clean classes and errant units.
///
/// Starts from the errant set carried over from earlier builds. A unit that
/// compiles cleanly leaves the errant set; one that fails joins it.
#[derive(Debug)]
pub struct Partition {
    policy: PartitionPolicy,
    clean: Vec<CompiledClass>,
    errant: FxHashSet<TypeName>,
}

impl Partition {
    pub fn new(policy: PartitionPolicy, carried: FxHashSet<TypeName>) -> Self {
        Partition {
            policy,
            clean: Vec::new(),
            errant: carried,
        }
    }

    pub fn policy(&self) -> PartitionPolicy {
        self.policy
    }

    pub fn is_errant(&self, unit: &TypeName) -> bool {
        self.errant.contains(unit)
    }

    pub fn clean(&self) -> &[CompiledClass] {
        &self.clean
    }

    /// Hand out the clean classes collected so far, leaving the list empty.
    pub fn take_clean(&mut self) -> Vec<CompiledClass> {
        mem::take(&mut self.clean)
    }

    pub fn into_errant(self) -> FxHashSet<TypeName> {
        self.errant
    }
}

impl CompileConsumer for Partition {
    fn accept(&mut self, result: &CompileResult) -> bool {
        if result.is_errant() {
            self.errant.insert(result.unit.clone());
            self.clean.retain(|class| class.name != result.unit);
            return false;
        }

        self.errant.remove(&result.unit);
        if self.policy == PartitionPolicy::CollectClean {
            if let Some(class) = &result.class {
                self.clean.push(class.clone());
            }
        }
        true
    }
}
