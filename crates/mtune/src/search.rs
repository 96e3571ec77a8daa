//! Combined elimination search.
//!
//! Trial 0 measures the baseline with every candidate flag enabled.
//! Each iteration then probes every remaining candidate in parallel,
//! disabling it alone on top of the current best vector. Probes within
//! 1% of the best result are kept; the strongest is committed outright
//! and the rest are re-measured serially against the evolving best
//! vector, committing only on strict improvement. The search stops on
//! the first iteration that commits nothing.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::flags::Flag;
use crate::{Error, Result};

/// Monotonic trial identifier, assigned at submission.
pub type TrialId = u64;

/// Executes one trial for a given flag vector.
///
/// Returns the measured scalar; zero or a negative value marks a failed
/// trial, which is ignored by the search.
pub trait RunTrial: Sync {
    fn run(&self, id: TrialId, flags: &[Flag]) -> f64;
}

/// Probes up to this factor above the best result stay in the running,
/// so small measurement errors cannot disrupt the process. Commits
/// still require strict improvement.
const IMPROVEMENT_SLACK: f64 = 1.01;

/// Final state of a finished search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    pub best_flags: Vec<Flag>,
    pub best_result: f64,
    /// Total number of trials submitted, including failures.
    pub trials: u64,
}

/// Run combined elimination over `initial_flags` with up to `jobs`
/// probe trials in flight at once.
///
/// # Errors
///
/// Fails when trial 0 (all flags enabled) does not produce a positive
/// result, or the worker pool cannot be built.
pub fn run<R: RunTrial>(runner: &R, initial_flags: Vec<Flag>, jobs: usize) -> Result<SearchOutcome> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))?;

    let mut next_id: TrialId = 0;
    let mut best_flags = initial_flags;
    // Every flag starts enabled and eligible for elimination.
    let mut candidates: Vec<String> = best_flags.iter().map(|f| f.name.clone()).collect();

    let id = take_id(&mut next_id);
    let mut best_result = runner.run(id, &best_flags);
    if best_result <= 0.0 {
        return Err(Error::InitialTrialFailed);
    }
    info!(id, result = best_result, flags = %render(&best_flags), "CE: (best)");

    loop {
        // Probe phase: disable each candidate on its own, in parallel.
        // Ids are handed out before the fan-out so they stay in
        // submission order.
        let probes: Vec<(String, TrialId, Vec<Flag>)> = candidates
            .iter()
            .map(|name| {
                let id = take_id(&mut next_id);
                (name.clone(), id, with_disabled(&best_flags, name))
            })
            .collect();

        let results: Vec<(String, TrialId, f64)> = pool.install(|| {
            probes
                .par_iter()
                .map(|(name, id, flags)| (name.clone(), *id, runner.run(*id, flags)))
                .collect()
        });

        let mut promising: Vec<(String, TrialId, f64)> = Vec::new();
        for (name, id, result) in results {
            if result <= 0.0 {
                warn!(id, "ignoring failed test run");
                continue;
            }
            info!(id, result, flag = %Flag::disabled(&name), "CE: (test)");
            if result < best_result * IMPROVEMENT_SLACK {
                promising.push((name, id, result));
            }
        }
        promising.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.1.cmp(&b.1)));

        let mut changed = false;
        let mut rest = promising.as_slice();

        // The strongest probe already beat the current best against the
        // very same vector, so it commits without re-measurement.
        if let Some((name, id, result)) = promising.first()
            && *result < best_result
        {
            disable(&mut best_flags, name);
            candidates.retain(|c| c != name);
            best_result = *result;
            changed = true;
            info!(id = *id, result = best_result, flags = %render(&best_flags), "CE: (best)");
            rest = &promising[1..];
        }

        // Re-measure the remaining promising flags against the evolving
        // best vector; earlier commits in this iteration may have
        // changed the picture.
        for (name, _, _) in rest {
            let flags = with_disabled(&best_flags, name);
            let id = take_id(&mut next_id);
            let result = runner.run(id, &flags);
            if result <= 0.0 {
                warn!(id, "ignoring failed test run");
                continue;
            }
            info!(id, result, flag = %Flag::disabled(name), "CE: (test)");
            if result < best_result {
                best_flags = flags;
                candidates.retain(|c| c != name);
                best_result = result;
                changed = true;
                info!(id, result = best_result, flags = %render(&best_flags), "CE: (best)");
            }
        }

        if !changed {
            break;
        }
    }

    Ok(SearchOutcome {
        best_flags,
        best_result,
        trials: next_id,
    })
}

fn take_id(next: &mut TrialId) -> TrialId {
    let id = *next;
    *next += 1;
    id
}

/// Copy of `flags` with the named flag flipped to its disabled form.
fn with_disabled(flags: &[Flag], name: &str) -> Vec<Flag> {
    flags
        .iter()
        .map(|f| {
            if f.name == name {
                Flag::disabled(&f.name)
            } else {
                f.clone()
            }
        })
        .collect()
}

fn disable(flags: &mut [Flag], name: &str) {
    for flag in flags {
        if flag.name == name {
            flag.enabled = false;
        }
    }
}

fn render(flags: &[Flag]) -> String {
    flags
        .iter()
        .map(Flag::token)
        .collect::<Vec<_>>()
        .join(" ")
}
