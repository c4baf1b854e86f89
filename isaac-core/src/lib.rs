//! JIT code generation and dispatch for dense linear-algebra expressions on
//! heterogeneous accelerators (spec.md §1-§9).
//!
//! An expression is built as a [`Tree`](expression::Tree), scheduled into a
//! sequence of kernels by [`schedule::schedule`], then each kernel is handed
//! to a [`dispatch::Dispatcher`] which resolves a concrete
//! [`generation::Template`], compiles or reuses its program through the
//! [`driver`] traits, and enqueues it. [`execute`] wires the three stages
//! together behind the public launcher API of §6.

pub mod cache;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod expression;
pub mod generation;
pub mod predictor;
pub mod profile;
pub mod schedule;
pub mod symbolic;

pub use error::{Error, Result};

use driver::{CommandQueue, Event};
use expression::Tree;
use tracing::info_span;

/// `environment` of §6: which queue to run on, and event bookkeeping.
pub struct Environment<'a> {
    pub queue: &'a dyn CommandQueue,
    /// Events the launch should wait on before starting (§6).
    pub dependencies: Vec<Box<dyn Event>>,
}

impl<'a> Environment<'a> {
    pub fn new(queue: &'a dyn CommandQueue) -> Self {
        Environment { queue, dependencies: Vec::new() }
    }
}

/// `optimize` of §6: `tune` times every candidate and remembers the winner;
/// `label` pins a specific candidate index, bypassing tuning and the
/// predictor (-1 means "let the dispatcher decide").
#[derive(Copy, Clone, Debug, Default)]
pub struct Optimize {
    pub tune: bool,
    pub label: i32,
}

/// `launcher` of §6: an expression tree plus where and how to run it.
pub struct Launcher<'a> {
    pub tree: Tree,
    pub environment: Environment<'a>,
    pub optimize: Optimize,
}

/// Schedules `launcher.tree`, dispatches every resulting kernel against
/// `launcher.environment.queue`, and returns the events produced (§6).
///
/// This is the single public entry point: callers never touch `schedule`,
/// `dispatch` or `generation` directly.
pub fn execute(launcher: Launcher<'_>, dispatcher: &dispatch::Dispatcher) -> Result<Vec<Box<dyn Event>>> {
    let _span = info_span!("execute").entered();
    let plan = schedule::schedule(&launcher.tree)?;
    let options = dispatch::DispatchOptions { tune: launcher.optimize.tune, label: launcher.optimize.label };
    dispatcher.execute_schedule(launcher.environment.queue, &plan, options)
}
