//! Dispatcher / runtime (§4.4). Owns, per `(kind, dtype)`, either a single
//! template or a candidate list plus a predictor; resolves a scheduled
//! kernel tree to a concrete `Template`, compiles (or reuses) its program,
//! and enqueues it.

mod build;

use crate::cache::hash_tree;
use crate::driver::CommandQueue;
use crate::error::{Error, Result};
use crate::expression::Tree;
use crate::generation::Template;
use crate::profile::ProfileDatabase;
use crate::schedule::{Kind, ScheduleResult};
use isaac_types::NumericType;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, info_span};

/// Per-operation workspace ceiling, in elements (§4.4 step 3/4).
const WORKSPACE_CEILING_ELEMENTS: usize = 1_000_000;

/// `options` of §6 `optimize = {tune, label}`.
#[derive(Copy, Clone, Debug, Default)]
pub struct DispatchOptions {
    pub tune: bool,
    pub label: i32,
}

/// Holds the profile database candidates are built from and the hardcoded
/// input-size override map tuning writes into (§4.4). Candidate template
/// instances are rebuilt from the profile rows on each call rather than
/// cached, since a `Box<dyn Template>` is cheap to construct and the
/// concrete parameters depend on the tree being dispatched (reduction
/// operator, axis).
pub struct Dispatcher {
    profiles: ProfileDatabase,
    /// `(kind, dtype, input_sizes) -> winning candidate index`, written only
    /// by tuning-mode timing (§4.4 step 3 "tune").
    overrides: Mutex<HashMap<(Kind, NumericType, Vec<i64>), usize>>,
}

impl Dispatcher {
    pub fn new(profiles: ProfileDatabase) -> Self {
        Dispatcher { profiles, overrides: Mutex::new(HashMap::new()) }
    }

    pub fn with_default_profiles() -> Self {
        Dispatcher::new(ProfileDatabase::load_default())
    }

    /// Runs a single scheduled kernel tree: resolves candidates, picks one
    /// (§4.4 step 3), compiles or reuses the cached program (step 2),
    /// checks the workspace ceiling (step 4), binds arguments and enqueues
    /// (step 5).
    pub fn execute_kernel(
        &self,
        queue: &dyn CommandQueue,
        kind: Kind,
        tree: &Tree,
        options: DispatchOptions,
    ) -> Result<Vec<Box<dyn crate::driver::Event>>> {
        let dtype = tree.dtype();
        let _span = info_span!("dispatch", ?kind, ?dtype).entered();

        let candidates = self.candidates_for(kind, dtype, tree)?;
        if candidates.is_empty() {
            return Err(Error::OperationNotSupported(format!("{kind:?}/{dtype:?} has no dispatch candidates")));
        }

        let table = crate::symbolic::annotate(tree);
        let hash = hash_tree(tree);
        let program = match queue.program_cache().get(&hash) {
            Some(p) => p,
            None => {
                let mut source = String::from(build::REDUCE_HELPER_PREAMBLE);
                for (i, candidate) in candidates.iter().enumerate() {
                    source.push_str(&candidate.generate(&format!("k{i}"), tree, &table, queue.backend())?);
                    source.push('\n');
                }
                let compiled = queue.compile(&source)?;
                queue.program_cache().insert(hash.clone(), compiled.clone());
                compiled
            }
        };

        let input_sizes: Vec<i64> = candidates[0].input_sizes(tree);
        let selected = self.select_candidate(kind, dtype, &candidates, &input_sizes, queue, &program, tree, &table, options)?;

        if candidates[selected].temporary_workspace(tree) > WORKSPACE_CEILING_ELEMENTS {
            return Err(Error::RuntimeError(format!(
                "candidate {selected} for {kind:?}/{dtype:?} would exceed the {WORKSPACE_CEILING_ELEMENTS}-element workspace ceiling"
            )));
        }

        info!(selected, "dispatch_execute");
        candidates[selected].enqueue(queue, program.as_ref(), &format!("k{selected}"), tree, &table)
    }

    /// Runs every temporary, then the final kernel, of a full schedule in
    /// order on `queue` (§5 "all temporary materializations are enqueued on
    /// the same queue as the final kernel").
    pub fn execute_schedule(
        &self,
        queue: &dyn CommandQueue,
        schedule: &ScheduleResult,
        options: DispatchOptions,
    ) -> Result<Vec<Box<dyn crate::driver::Event>>> {
        let mut events = Vec::new();
        for temp in &schedule.temporaries {
            events.extend(self.execute_kernel(queue, temp.kind, &temp.tree, options)?);
        }
        events.extend(self.execute_kernel(queue, schedule.final_kernel.kind, &schedule.final_kernel.tree, options)?);
        Ok(events)
    }

    fn candidates_for(&self, kind: Kind, dtype: NumericType, tree: &Tree) -> Result<Vec<Box<dyn Template>>> {
        let profile_entry = self
            .profiles
            .entry(kind, dtype)
            .ok_or_else(|| Error::OperationNotSupported(format!("no profile entry for {kind:?}/{dtype:?}")))?;
        profile_entry.profiles.iter().map(|row| build::build_template(kind, dtype, row, tree, self.backend_hint())).collect()
    }

    fn backend_hint(&self) -> crate::driver::Backend {
        // Templates don't themselves depend on backend at construction time
        // (only `generate`/`enqueue` do); any concrete value works here.
        crate::driver::Backend::OpenClLike
    }

    #[allow(clippy::too_many_arguments)]
    fn select_candidate(
        &self,
        kind: Kind,
        dtype: NumericType,
        candidates: &[Box<dyn Template>],
        input_sizes: &[i64],
        queue: &dyn CommandQueue,
        program: &std::sync::Arc<dyn crate::driver::Program>,
        tree: &Tree,
        table: &crate::symbolic::SymbolicTable,
        options: DispatchOptions,
    ) -> Result<usize> {
        if options.label >= 0 {
            return Ok(options.label as usize);
        }

        let key = (kind, dtype, input_sizes.to_vec());
        if let Some(&idx) = self.overrides.lock().unwrap().get(&key) {
            return Ok(idx);
        }

        if options.tune {
            let winner = self.tune(candidates, queue, program, tree, table)?;
            self.overrides.lock().unwrap().insert(key, winner);
            return Ok(winner);
        }

        let profile_entry = self.profiles.entry(kind, dtype);
        if let Some(forest) = profile_entry.and_then(|e| e.predictor.as_ref()) {
            for idx in forest.ranked_candidates(input_sizes) {
                if let Some(candidate) = candidates.get(idx) {
                    if candidate.temporary_workspace(tree) <= WORKSPACE_CEILING_ELEMENTS {
                        return Ok(idx);
                    }
                }
            }
        }

        Ok(0)
    }

    /// Times every candidate, catching per-candidate compile/launch
    /// failures as `+INF` so another candidate can still win (§4.4 step 3,
    /// propagation policy in spec §7).
    fn tune(
        &self,
        candidates: &[Box<dyn Template>],
        queue: &dyn CommandQueue,
        program: &std::sync::Arc<dyn crate::driver::Program>,
        tree: &Tree,
        table: &crate::symbolic::SymbolicTable,
    ) -> Result<usize> {
        let mut best = (0usize, f64::INFINITY);
        for (idx, candidate) in candidates.iter().enumerate() {
            let elapsed = candidate
                .enqueue(queue, program.as_ref(), &format!("k{idx}"), tree, table)
                .and_then(|events| {
                    queue.synchronize()?;
                    Ok(events.iter().map(|e| e.elapsed_ms()).sum::<f64>())
                })
                .unwrap_or(f64::INFINITY);
            debug!(idx, elapsed, "tune_candidate");
            if elapsed < best.1 {
                best = (idx, elapsed);
            }
        }
        Ok(best.0)
    }
}
