use rayon::prelude::*;
use thiserror::Error;

use crate::catalog::{Catalog, load_catalog};
use crate::eligibility::{eligible_edges, prune_catalog};
use crate::model::build_assignment_model;
use crate::provider::DataProvider;
use crate::report::{RunOutcome, extract_solution};
use crate::solver::{MipSolver, SolveLimits, SolverError};
use crate::squad::{OptimizeOptions, resolve_squad};

/// Why a single team's run failed. A batch never aborts on these; each team
/// reports its own failure.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    #[error("no feasible assignment exists")]
    InfeasibleModel,
    #[error("solver unavailable: {0}")]
    SolverUnavailable(String),
    #[error("solver exceeded its time budget")]
    SolverTimeout,
    /// Recovered internally by placeholder synthesis; surfaces only in logs.
    #[error("unknown player reference: {0}")]
    UnknownPlayerReference(String),
}

impl From<SolverError> for OptimizeError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::Infeasible => OptimizeError::InfeasibleModel,
            SolverError::Timeout => OptimizeError::SolverTimeout,
            SolverError::Unavailable(msg) => OptimizeError::SolverUnavailable(msg),
            SolverError::Unsupported(msg) => OptimizeError::SolverUnavailable(msg),
        }
    }
}

/// One team's full pipeline against an already-materialized catalog snapshot:
/// resolve squad, filter, prune, build, solve, extract. The catalog is cloned
/// so concurrent runs never share mutable state.
pub fn run_one(
    provider: &dyn DataProvider,
    solver: &dyn MipSolver,
    catalog: &Catalog,
    team: Option<&str>,
    options: &OptimizeOptions,
    limits: &SolveLimits,
) -> Result<RunOutcome, OptimizeError> {
    let sheet = provider
        .fetch_team(team)
        .map_err(|err| OptimizeError::DataUnavailable(format!("team fetch failed: {err}")))?;
    let budget = options.budget_limit.unwrap_or(sheet.budget);

    let mut catalog = catalog.clone();
    let slots = resolve_squad(&sheet, &mut catalog, provider);
    let edges = eligible_edges(&slots, &catalog, budget, options);
    prune_catalog(&mut catalog, &edges, &slots);

    // No real team specified: force exactly one signing per slot.
    let forced = team.is_none();
    let built = build_assignment_model(&slots, &catalog, &edges, budget, forced);

    let solution = solver.solve(&built.model, limits)?;
    Ok(extract_solution(
        &slots, &catalog, &edges, &built, &solution, team, options,
    ))
}

/// Convenience wrapper that also loads the catalog.
pub fn solve_transfer_problem(
    provider: &dyn DataProvider,
    solver: &dyn MipSolver,
    team: Option<&str>,
    options: &OptimizeOptions,
    limits: &SolveLimits,
) -> Result<RunOutcome, OptimizeError> {
    let catalog = load_catalog(provider)?;
    run_one(provider, solver, &catalog, team, options, limits)
}

/// One batch entry: a team (or `None` for a new-squad build) plus the options
/// to run it under, so budget sweeps can mix entries freely.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub team: Option<String>,
    pub options: OptimizeOptions,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub runs: Vec<RunOutcome>,
    /// One line per failed run; successes and failures are independent.
    pub errors: Vec<String>,
}

/// Optimize many teams in parallel. The catalog is fetched once; every run
/// gets its own copy and its own solver session from the factory.
pub fn solve_batch<F>(
    provider: &dyn DataProvider,
    make_solver: F,
    requests: &[BatchRequest],
    limits: &SolveLimits,
) -> BatchOutcome
where
    F: Fn() -> Result<Box<dyn MipSolver>, SolverError> + Sync,
{
    let catalog = match load_catalog(provider) {
        Ok(catalog) => catalog,
        Err(err) => {
            return BatchOutcome {
                runs: Vec::new(),
                errors: vec![err.to_string()],
            };
        }
    };

    let results: Vec<(Option<RunOutcome>, Option<String>)> = requests
        .par_iter()
        .map(|request| {
            let label = request.team.as_deref().unwrap_or("New Squad");
            let solver = match make_solver() {
                Ok(solver) => solver,
                Err(err) => {
                    return (
                        None,
                        Some(format!("{label}: {}", OptimizeError::from(err))),
                    );
                }
            };
            match run_one(
                provider,
                solver.as_ref(),
                &catalog,
                request.team.as_deref(),
                &request.options,
                limits,
            ) {
                Ok(outcome) => (Some(outcome), None),
                Err(err) => (None, Some(format!("{label}: {err}"))),
            }
        })
        .collect();

    let mut runs = Vec::new();
    let mut errors = Vec::new();
    for (outcome, error) in results {
        if let Some(outcome) = outcome {
            runs.push(outcome);
        }
        if let Some(error) = error {
            errors.push(error);
        }
    }
    BatchOutcome { runs, errors }
}
