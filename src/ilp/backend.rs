//! `IlpSolver` implementations on top of `good_lp`.
//!
//! `MicroLpSolver` uses the pure Rust `microlp` solver and is always available. `CbcSolver` uses
//! COIN-OR Cbc and requires the `cbc` cargo feature (and the Cbc library on the system).

use super::{Comparison, IlpModel, IlpSolver, Sense, SolveLimits, SolverOutput, SolverStatus, VarKind};
use good_lp::solvers::microlp::microlp;
use good_lp::{variable, Expression, ProblemVariables, ResolutionError, Solution, Solver, SolverModel};
use log::{debug, warn};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

/// Output for models that need no solver run at all
fn trivial_output(model: &IlpModel) -> Option<SolverOutput> {
    if model.is_trivially_infeasible() {
        debug!("Model contains an unsatisfiable constant constraint. Skipping the solver.");
        return Some(SolverOutput::without_solution(SolverStatus::Infeasible));
    }
    if model.variables().is_empty() {
        return Some(SolverOutput {
            status: SolverStatus::Optimal,
            values: Vec::new(),
        });
    }
    None
}

/// Translate the model into a `good_lp` problem for the given solver. Returns the problem and the
/// `good_lp` variable of each model variable (indexed by `VarId`).
fn translate<S: Solver>(model: &IlpModel, solver: S) -> (S::Model, Vec<good_lp::Variable>) {
    debug!(
        "Solving model with {} variables and {} constraints",
        model.variables().len(),
        model.constraints().len()
    );
    let mut problem_variables = ProblemVariables::new();
    let handles: Vec<good_lp::Variable> = model
        .variables()
        .iter()
        .map(|v| {
            let definition = match v.kind {
                VarKind::Binary => variable().binary(),
                VarKind::Integer { lower, upper } => {
                    let definition = variable().integer().min(lower);
                    match upper {
                        Some(upper) => definition.max(upper),
                        None => definition,
                    }
                }
            };
            problem_variables.add(definition.name(v.name.clone()))
        })
        .collect();

    let mut objective = Expression::with_capacity(handles.len());
    for (v, handle) in model.variables().iter().zip(&handles) {
        if v.objective != 0.0 {
            objective.add_mul(v.objective, *handle);
        }
    }

    let unsolved = match model.sense() {
        Sense::Maximise => problem_variables.maximise(objective),
        Sense::Minimise => problem_variables.minimise(objective),
    };
    let mut problem = unsolved.using(solver);
    for constraint in model.constraints() {
        let mut lhs = Expression::with_capacity(constraint.terms.len());
        for (var, coefficient) in constraint.terms.iter() {
            lhs.add_mul(*coefficient, handles[var.index()]);
        }
        problem = problem.with(match constraint.comparison {
            Comparison::LessEq => lhs.leq(constraint.rhs),
            Comparison::GreaterEq => lhs.geq(constraint.rhs),
            Comparison::Equal => lhs.eq(constraint.rhs),
        });
    }
    (problem, handles)
}

fn values_of<S: Solution>(solution: &S, handles: &[good_lp::Variable]) -> Vec<f64> {
    handles.iter().map(|h| solution.value(*h)).collect()
}

/// Branch and bound solver shipped with `good_lp`. Runs single-threaded and deterministic.
///
/// microlp reports no intermediate solutions. A time limit is enforced by running the solver in a
/// worker thread: if it does not finish in time, the result is `TimeLimitReached` without values
/// and the worker is abandoned. Solution count, gap and presolve settings are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct MicroLpSolver;

impl MicroLpSolver {
    fn run(model: IlpModel) -> SolverOutput {
        let (problem, handles) = translate(&model, microlp);
        let start_time = Instant::now();
        let result = problem.solve();
        debug!("Solver finished after {:.2?}", start_time.elapsed());
        match result {
            Ok(solution) => SolverOutput {
                status: SolverStatus::Optimal,
                values: values_of(&solution, &handles),
            },
            Err(ResolutionError::Infeasible) => {
                SolverOutput::without_solution(SolverStatus::Infeasible)
            }
            Err(e) => {
                warn!("Solver failed: {}", e);
                SolverOutput::without_solution(SolverStatus::Error(e.to_string()))
            }
        }
    }
}

impl IlpSolver for MicroLpSolver {
    fn solve(&self, model: IlpModel, limits: &SolveLimits) -> SolverOutput {
        if let Some(output) = trivial_output(&model) {
            return output;
        }
        if limits.solution_limit.is_some()
            || limits.gap_tolerance.is_some()
            || limits.presolve.is_some()
        {
            debug!(
                "microlp only supports a time limit, ignoring the other limits of {:?}",
                limits
            );
        }
        let time_limit = match limits.time_limit() {
            Some(time_limit) => time_limit,
            None => return MicroLpSolver::run(model),
        };

        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            // The receiver is gone if the time limit has already been hit
            let _ = sender.send(MicroLpSolver::run(model));
        });
        match receiver.recv_timeout(time_limit) {
            Ok(output) => output,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "microlp found no solution within {:.2?}. Abandoning the solver thread.",
                    time_limit
                );
                SolverOutput::without_solution(SolverStatus::TimeLimitReached)
            }
            Err(RecvTimeoutError::Disconnected) => SolverOutput::without_solution(
                SolverStatus::Error(String::from("Solver thread terminated unexpectedly")),
            ),
        }
    }
}

/// COIN-OR Cbc branch and cut solver.
///
/// All limits are passed to Cbc. If Cbc stops at a limit, the best solution found so far is
/// returned with status `TimeLimitReached`.
#[cfg(feature = "cbc")]
#[derive(Clone, Copy, Debug, Default)]
pub struct CbcSolver;

#[cfg(feature = "cbc")]
impl IlpSolver for CbcSolver {
    fn solve(&self, model: IlpModel, limits: &SolveLimits) -> SolverOutput {
        use good_lp::solvers::coin_cbc::coin_cbc;
        use good_lp::solvers::SolutionStatus;

        if let Some(output) = trivial_output(&model) {
            return output;
        }
        let (mut problem, handles) = translate(&model, coin_cbc);
        problem.set_parameter("log", "0");
        if let Some(seconds) = limits.time_limit {
            problem.set_parameter("seconds", &seconds.to_string());
        }
        if let Some(count) = limits.solution_limit {
            problem.set_parameter("maxSolutions", &count.to_string());
        }
        if let Some(gap) = limits.gap_tolerance {
            problem.set_parameter("ratioGap", &gap.to_string());
        }
        if limits.presolve == Some(false) {
            problem.set_parameter("presolve", "off");
            problem.set_parameter("preprocess", "off");
        }

        let start_time = Instant::now();
        let result = problem.solve();
        let elapsed = start_time.elapsed();
        debug!("Solver finished after {:.2?}", elapsed);
        match result {
            Ok(solution) => {
                let status = match solution.status() {
                    SolutionStatus::Optimal => SolverStatus::Optimal,
                    other => {
                        debug!("Cbc stopped early ({:?})", other);
                        SolverStatus::TimeLimitReached
                    }
                };
                SolverOutput {
                    status,
                    values: values_of(&solution, &handles),
                }
            }
            Err(ResolutionError::Infeasible) => {
                SolverOutput::without_solution(SolverStatus::Infeasible)
            }
            Err(e) => match limits.time_limit() {
                Some(time_limit) if elapsed >= time_limit => {
                    debug!("Cbc hit the time limit without a solution: {}", e);
                    SolverOutput::without_solution(SolverStatus::TimeLimitReached)
                }
                _ => {
                    warn!("Solver failed: {}", e);
                    SolverOutput::without_solution(SolverStatus::Error(e.to_string()))
                }
            },
        }
    }
}
