use std::time::{Duration, Instant};

use thiserror::Error;

use crate::model::{MipModel, RowSense, VarKind};

const EPS: f64 = 1e-6;
const DEADLINE_CHECK_MASK: u64 = 255;

#[derive(Debug, Clone, Default)]
pub struct SolveLimits {
    /// Abort the solve once this much wall time has elapsed.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct MipSolution {
    pub objective: f64,
    /// One value per model variable, in variable order.
    pub values: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("model has no feasible assignment")]
    Infeasible,
    #[error("solve exceeded the time limit")]
    Timeout,
    #[error("solver backend unavailable: {0}")]
    Unavailable(String),
    #[error("model not supported by this backend: {0}")]
    Unsupported(String),
}

/// The one seam that knows how to optimize. Backends are caller-owned session
/// values constructed per run; nothing here is process-global, so independent
/// runs can solve concurrently.
pub trait MipSolver: Send + Sync {
    fn name(&self) -> &'static str;
    fn solve(&self, model: &MipModel, limits: &SolveLimits) -> Result<MipSolution, SolverError>;
}

/// Exact depth-first branch-and-bound over the binary variables.
///
/// Continuous variables are presolved away through their defining equality
/// rows (the assignment model's achieved-rating variables have exactly that
/// shape), leaving a pure 0/1 problem. The search is deterministic: variables
/// are ordered by reduced objective coefficient, ties by index, and the first
/// optimum found wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct BranchBound;

impl BranchBound {
    pub fn new() -> Self {
        Self
    }
}

impl MipSolver for BranchBound {
    fn name(&self) -> &'static str {
        "branch-bound"
    }

    fn solve(&self, model: &MipModel, limits: &SolveLimits) -> Result<MipSolution, SolverError> {
        let reduced = Reduced::presolve(model)?;
        let deadline = limits.timeout.map(|t| Instant::now() + t);
        let best = reduced.search(deadline)?;
        Ok(reduced.expand(model, &best))
    }
}

/// Binary-only problem left after substituting continuous variables out.
struct Reduced {
    /// Original model index per binary variable.
    bin_vars: Vec<usize>,
    /// Reduced objective coefficient per binary variable.
    coeff: Vec<f64>,
    obj_const: f64,
    rows: Vec<ReducedRow>,
    /// Per binary variable, (row, coefficient) incidences.
    var_rows: Vec<Vec<(usize, f64)>>,
    /// Branching order: coefficient descending, then variable index.
    order: Vec<usize>,
    /// Choice row (all-ones, rhs 1) each variable counts against, if any.
    /// Indexes into `choice_rows`.
    choice_group: Vec<Option<usize>>,
    /// (row index, term count) per all-ones rhs-1 row.
    choice_rows: Vec<(usize, usize)>,
    /// Substitutions for expanding solutions: (cont var, rhs, coeff, terms).
    subs: Vec<(usize, f64, f64, Vec<(usize, f64)>)>,
}

struct ReducedRow {
    sense: RowSense,
    rhs: f64,
}

struct RowState {
    fixed: f64,
    free_pos: f64,
    free_neg: f64,
}

impl Reduced {
    fn presolve(model: &MipModel) -> Result<Self, SolverError> {
        let n = model.vars.len();
        let mut bin_of: Vec<Option<usize>> = vec![None; n];
        let mut bin_vars = Vec::new();
        for (idx, var) in model.vars.iter().enumerate() {
            if var.kind == VarKind::Binary {
                bin_of[idx] = Some(bin_vars.len());
                bin_vars.push(idx);
            }
        }

        // Rows touching each continuous variable.
        let mut cont_rows: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (r, row) in model.rows.iter().enumerate() {
            for &(v, a) in &row.terms {
                if a != 0.0 && model.vars[v].kind == VarKind::Continuous {
                    cont_rows[v].push(r);
                }
            }
        }

        let mut coeff: Vec<f64> = bin_vars.iter().map(|&v| model.vars[v].obj_coeff).collect();
        let mut obj_const = 0.0;
        let mut consumed = vec![false; model.rows.len()];
        let mut subs = Vec::new();

        for (v, var) in model.vars.iter().enumerate() {
            if var.kind != VarKind::Continuous {
                continue;
            }
            let rows = &cont_rows[v];
            if rows.len() != 1 {
                return Err(SolverError::Unsupported(format!(
                    "continuous variable '{}' is not defined by exactly one row",
                    var.name
                )));
            }
            let r = rows[0];
            let row = &model.rows[r];
            if row.sense != RowSense::Eq || consumed[r] {
                return Err(SolverError::Unsupported(format!(
                    "continuous variable '{}' lacks a private defining equality",
                    var.name
                )));
            }
            let own = row
                .terms
                .iter()
                .find(|&&(tv, _)| tv == v)
                .map(|&(_, a)| a)
                .unwrap_or(0.0);
            let mut terms = Vec::new();
            for &(tv, a) in &row.terms {
                if tv == v {
                    continue;
                }
                let Some(b) = bin_of[tv] else {
                    return Err(SolverError::Unsupported(format!(
                        "defining row of '{}' mixes continuous variables",
                        var.name
                    )));
                };
                terms.push((b, a));
            }
            // x_v = (rhs - sum a_b x_b) / own
            obj_const += var.obj_coeff * row.rhs / own;
            for &(b, a) in &terms {
                coeff[b] -= var.obj_coeff * a / own;
            }
            consumed[r] = true;
            subs.push((v, row.rhs, own, terms));
        }

        let mut rows = Vec::new();
        let mut var_rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); bin_vars.len()];
        let mut choice_rows: Vec<(usize, usize)> = Vec::new();
        let mut choice_group: Vec<Option<usize>> = vec![None; bin_vars.len()];
        for (r, row) in model.rows.iter().enumerate() {
            if consumed[r] {
                continue;
            }
            let idx = rows.len();
            let mut all_ones = true;
            for &(v, a) in &row.terms {
                let Some(b) = bin_of[v] else {
                    return Err(SolverError::Unsupported(format!(
                        "row '{}' references an uneliminated continuous variable",
                        row.name
                    )));
                };
                var_rows[b].push((idx, a));
                if (a - 1.0).abs() > EPS {
                    all_ones = false;
                }
            }
            // Empty rows are decided right here.
            if row.terms.is_empty() && !empty_row_feasible(row.sense, row.rhs) {
                return Err(SolverError::Infeasible);
            }
            if all_ones
                && !row.terms.is_empty()
                && (row.rhs - 1.0).abs() < EPS
                && matches!(row.sense, RowSense::Le | RowSense::Eq)
            {
                let g = choice_rows.len();
                for &(v, _) in &row.terms {
                    let b = bin_of[v].expect("checked above");
                    // Count each variable against the widest choice row it
                    // belongs to; wide rows (one pick among many) make the
                    // bound far tighter than narrow ones.
                    let better = match choice_group[b] {
                        Some(old) => choice_rows[old].1 < row.terms.len(),
                        None => true,
                    };
                    if better {
                        choice_group[b] = Some(g);
                    }
                }
                choice_rows.push((idx, row.terms.len()));
            }
            rows.push(ReducedRow {
                sense: row.sense,
                rhs: row.rhs,
            });
        }

        let mut order: Vec<usize> = (0..bin_vars.len()).collect();
        order.sort_by(|&a, &b| {
            coeff[b]
                .partial_cmp(&coeff[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        Ok(Self {
            bin_vars,
            coeff,
            obj_const,
            rows,
            var_rows,
            order,
            choice_group,
            choice_rows,
            subs,
        })
    }

    fn search(&self, deadline: Option<Instant>) -> Result<Vec<f64>, SolverError> {
        let n = self.order.len();
        let mut state: Vec<RowState> = self
            .rows
            .iter()
            .map(|_| RowState {
                fixed: 0.0,
                free_pos: 0.0,
                free_neg: 0.0,
            })
            .collect();
        for incidences in &self.var_rows {
            for &(r, a) in incidences {
                if a > 0.0 {
                    state[r].free_pos += a;
                } else {
                    state[r].free_neg += a;
                }
            }
        }

        let mut assign: Vec<f64> = vec![0.0; n];
        let mut best: Option<(f64, Vec<f64>)> = None;
        let mut cur_obj = 0.0;
        let mut nodes: u64 = 0;

        struct Frame {
            pos: usize,
            stage: u8,
            applied: Option<f64>,
        }
        let mut stack = vec![Frame {
            pos: 0,
            stage: 0,
            applied: None,
        }];

        while let Some(top) = stack.last_mut() {
            nodes += 1;
            if nodes & DEADLINE_CHECK_MASK == 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Err(SolverError::Timeout);
                    }
                }
            }

            if top.pos == n {
                let better = best.as_ref().is_none_or(|(obj, _)| cur_obj > obj + EPS);
                if better {
                    best = Some((cur_obj, assign.clone()));
                }
                stack.pop();
                continue;
            }

            let pos = top.pos;
            let v = self.order[pos];

            if let Some(prev) = top.applied.take() {
                cur_obj -= self.coeff[v] * prev;
                self.unapply(v, prev, &mut state);
            }
            if top.stage >= 2 {
                stack.pop();
                continue;
            }

            let prefer_one = self.coeff[v] > 0.0;
            let val = match (top.stage, prefer_one) {
                (0, true) | (1, false) => 1.0,
                _ => 0.0,
            };
            top.stage += 1;

            self.apply(v, val, &mut state);
            let feasible = self.var_rows[v]
                .iter()
                .all(|&(r, _)| row_feasible(&self.rows[r], &state[r]));
            if feasible {
                cur_obj += self.coeff[v] * val;
                assign[v] = val;
                let bound = cur_obj + self.remaining_bound(pos + 1, &state);
                let worth_it = best.as_ref().is_none_or(|(obj, _)| bound > obj + EPS);
                if worth_it {
                    top.applied = Some(val);
                    stack.push(Frame {
                        pos: pos + 1,
                        stage: 0,
                        applied: None,
                    });
                    continue;
                }
                cur_obj -= self.coeff[v] * val;
            }
            self.unapply(v, val, &mut state);
        }

        match best {
            Some((_, assign)) => Ok(assign),
            None => Err(SolverError::Infeasible),
        }
    }

    fn apply(&self, v: usize, val: f64, state: &mut [RowState]) {
        for &(r, a) in &self.var_rows[v] {
            let row = &mut state[r];
            row.fixed += a * val;
            if a > 0.0 {
                row.free_pos -= a;
            } else {
                row.free_neg -= a;
            }
        }
    }

    fn unapply(&self, v: usize, val: f64, state: &mut [RowState]) {
        for &(r, a) in &self.var_rows[v] {
            let row = &mut state[r];
            row.fixed -= a * val;
            if a > 0.0 {
                row.free_pos += a;
            } else {
                row.free_neg += a;
            }
        }
    }

    /// Admissible upper bound on what the still-free variables can add: each
    /// choice row contributes at most its best free positive coefficient (and
    /// nothing once its capacity is spent), everything else contributes any
    /// positive coefficient it has.
    fn remaining_bound(&self, from: usize, state: &[RowState]) -> f64 {
        let mut group_best: Vec<f64> = vec![0.0; self.choice_rows.len()];
        let mut loose = 0.0;
        for &v in &self.order[from..] {
            let c = self.coeff[v];
            if c <= 0.0 {
                continue;
            }
            match self.choice_group[v] {
                Some(g) => {
                    if state[self.choice_rows[g].0].fixed < 1.0 - EPS && c > group_best[g] {
                        group_best[g] = c;
                    }
                }
                None => loose += c,
            }
        }
        loose + group_best.iter().sum::<f64>()
    }

    /// Expand a binary assignment back onto the full variable vector and
    /// recompute the objective in original terms.
    fn expand(&self, model: &MipModel, assign: &[f64]) -> MipSolution {
        let mut values = vec![0.0; model.vars.len()];
        for (b, &v) in self.bin_vars.iter().enumerate() {
            values[v] = assign[b];
        }
        for (v, rhs, own, terms) in &self.subs {
            let mut acc = *rhs;
            for &(b, a) in terms {
                acc -= a * assign[b];
            }
            values[*v] = acc / own;
        }
        let objective = model
            .vars
            .iter()
            .enumerate()
            .map(|(v, var)| var.obj_coeff * values[v])
            .sum::<f64>();
        debug_assert!((objective - (self.obj_const + score(&self.coeff, assign))).abs() < 1e-4);
        MipSolution { objective, values }
    }
}

fn score(coeff: &[f64], assign: &[f64]) -> f64 {
    coeff.iter().zip(assign).map(|(c, x)| c * x).sum()
}

fn row_feasible(row: &ReducedRow, state: &RowState) -> bool {
    let min = state.fixed + state.free_neg;
    let max = state.fixed + state.free_pos;
    match row.sense {
        RowSense::Le => min <= row.rhs + EPS,
        RowSense::Ge => max >= row.rhs - EPS,
        RowSense::Eq => min <= row.rhs + EPS && max >= row.rhs - EPS,
    }
}

fn empty_row_feasible(sense: RowSense, rhs: f64) -> bool {
    match sense {
        RowSense::Le => 0.0 <= rhs + EPS,
        RowSense::Ge => 0.0 >= rhs - EPS,
        RowSense::Eq => rhs.abs() <= EPS,
    }
}
