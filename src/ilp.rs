//! Solver-independent description of integer linear programs.
//!
//! Engines build an `IlpModel` with a `ModelBuilder` and keep their own side tables from domain
//! keys to `VarId`s. Variable names are for log output only and are never parsed back. The finished
//! model is handed over to an `IlpSolver`, which consumes it and returns one value per variable.

pub mod backend;

pub use self::backend::MicroLpSolver;
#[cfg(feature = "cbc")]
pub use self::backend::CbcSolver;

use crate::FailureReason;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Handle of a variable within its `IlpModel`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VarKind {
    Binary,
    Integer { lower: f64, upper: Option<f64> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub objective: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    LessEq,
    GreaterEq,
    Equal,
}

impl Comparison {
    fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::LessEq => lhs <= rhs,
            Comparison::GreaterEq => lhs >= rhs,
            Comparison::Equal => lhs == rhs,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub comparison: Comparison,
    pub rhs: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Maximise,
    Minimise,
}

/// Finalized model description. Can only be created through `ModelBuilder::build()`.
#[derive(Debug)]
pub struct IlpModel {
    sense: Sense,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    /// Names of constant constraints (without any terms) that can never be satisfied
    violated_constants: Vec<String>,
}

impl IlpModel {
    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.0]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_trivially_infeasible(&self) -> bool {
        !self.violated_constants.is_empty()
    }

    /// Evaluate the objective function for the given variable values
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.objective * x)
            .sum()
    }
}

/// Builder for a single `IlpModel`
pub struct ModelBuilder {
    sense: Sense,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    violated_constants: Vec<String>,
}

impl ModelBuilder {
    pub fn new(sense: Sense) -> Self {
        ModelBuilder {
            sense,
            variables: Vec::new(),
            constraints: Vec::new(),
            violated_constants: Vec::new(),
        }
    }

    pub fn add_binary(&mut self, name: impl Into<String>, objective: f64) -> VarId {
        self.add_variable(name.into(), VarKind::Binary, objective)
    }

    pub fn add_integer(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: Option<f64>,
        objective: f64,
    ) -> VarId {
        self.add_variable(name.into(), VarKind::Integer { lower, upper }, objective)
    }

    fn add_variable(&mut self, name: String, kind: VarKind, objective: f64) -> VarId {
        self.variables.push(Variable {
            name,
            kind,
            objective,
        });
        VarId(self.variables.len() - 1)
    }

    /// Add the linear constraint `sum(terms) <comparison> rhs`.
    ///
    /// Terms with a coefficient of zero are dropped. If no terms are left, the constraint is
    /// evaluated right away instead of being passed to the solver.
    pub fn constrain<I>(&mut self, name: impl Into<String>, terms: I, comparison: Comparison, rhs: f64)
    where
        I: IntoIterator<Item = (VarId, f64)>,
    {
        let name = name.into();
        let terms: Vec<(VarId, f64)> = terms.into_iter().filter(|(_, c)| *c != 0.0).collect();
        if terms.is_empty() {
            if !comparison.holds(0.0, rhs) {
                self.violated_constants.push(name);
            }
            return;
        }
        self.constraints.push(Constraint {
            name,
            terms,
            comparison,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn build(self) -> IlpModel {
        IlpModel {
            sense: self.sense,
            variables: self.variables,
            constraints: self.constraints,
            violated_constants: self.violated_constants,
        }
    }
}

/// Global limits passed to the solver on each invocation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveLimits {
    /// Wall clock time limit in seconds
    pub time_limit: Option<f64>,
    /// Stop after this number of feasible solutions
    pub solution_limit: Option<u32>,
    /// Relative optimality gap tolerance
    pub gap_tolerance: Option<f64>,
    /// Set to `false` to disable presolve (deterministic runs)
    pub presolve: Option<bool>,
}

impl SolveLimits {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit.map(Duration::from_secs_f64)
    }

    pub fn is_unlimited(&self) -> bool {
        self == &SolveLimits::default()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SolverStatus {
    Optimal,
    Infeasible,
    /// The time limit was hit. `SolverOutput::values` holds the best solution found, if any.
    TimeLimitReached,
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolverOutput {
    pub status: SolverStatus,
    /// One value per model variable (indexed by `VarId`), empty if no solution is known
    pub values: Vec<f64>,
}

impl SolverOutput {
    pub fn without_solution(status: SolverStatus) -> Self {
        SolverOutput {
            status,
            values: Vec::new(),
        }
    }

    /// Whether the output carries a usable (feasible, not necessarily optimal) solution
    pub fn has_solution(&self) -> bool {
        matches!(
            self.status,
            SolverStatus::Optimal | SolverStatus::TimeLimitReached
        ) && !self.values.is_empty()
    }

    /// Failure reason to report, if this output carries no usable solution
    pub fn failure_reason(&self) -> Option<FailureReason> {
        if self.has_solution() {
            return None;
        }
        Some(match &self.status {
            SolverStatus::Infeasible => FailureReason::Infeasible,
            SolverStatus::TimeLimitReached => FailureReason::TimeLimit,
            SolverStatus::Error(message) => FailureReason::Solver(message.clone()),
            SolverStatus::Optimal => {
                FailureReason::Solver(String::from("Solver returned no variable values"))
            }
        })
    }

    /// Value of the variable rounded to the nearest integer
    pub fn rounded(&self, var: VarId) -> i64 {
        self.values.get(var.0).map(|v| v.round() as i64).unwrap_or(0)
    }

    /// Whether the binary variable is set in the solution
    pub fn is_set(&self, var: VarId) -> bool {
        self.rounded(var) == 1
    }
}

/// Black-box integer program solver
pub trait IlpSolver {
    fn solve(&self, model: IlpModel, limits: &SolveLimits) -> SolverOutput;
}

impl<S: IlpSolver + ?Sized> IlpSolver for &S {
    fn solve(&self, model: IlpModel, limits: &SolveLimits) -> SolverOutput {
        (**self).solve(model, limits)
    }
}

/// Solver for tests: solves with microlp, but reports the result as stopped at the time limit.
/// Without `keep_values`, the solution is dropped as if none had been found in time.
#[cfg(test)]
pub(crate) struct StoppedAtTimeLimit {
    pub keep_values: bool,
}

#[cfg(test)]
impl IlpSolver for StoppedAtTimeLimit {
    fn solve(&self, model: IlpModel, limits: &SolveLimits) -> SolverOutput {
        let mut output = MicroLpSolver.solve(model, limits);
        if output.status == SolverStatus::Optimal {
            output.status = SolverStatus::TimeLimitReached;
        }
        if !self.keep_values {
            output.values.clear();
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_constraints_are_evaluated() {
        let mut builder = ModelBuilder::new(Sense::Maximise);
        let x = builder.add_binary("x", 1.0);
        builder.constrain("trivial", Vec::new(), Comparison::LessEq, 3.0);
        builder.constrain("zero_coefficient", vec![(x, 0.0)], Comparison::GreaterEq, 0.0);
        let model = builder.build();
        assert!(model.constraints().is_empty());
        assert!(!model.is_trivially_infeasible());

        let mut builder = ModelBuilder::new(Sense::Maximise);
        builder.add_binary("x", 1.0);
        builder.constrain("impossible", Vec::new(), Comparison::Equal, 1.0);
        assert!(builder.build().is_trivially_infeasible());
    }

    #[test]
    fn rounding_of_solver_values() {
        let output = SolverOutput {
            status: SolverStatus::Optimal,
            values: vec![0.999_999_7, 1e-9, 2.000_001],
        };
        assert!(output.has_solution());
        assert!(output.is_set(VarId(0)));
        assert!(!output.is_set(VarId(1)));
        assert_eq!(output.rounded(VarId(2)), 2);
        assert_eq!(output.rounded(VarId(3)), 0);

        let output = SolverOutput::without_solution(SolverStatus::TimeLimitReached);
        assert!(!output.has_solution());
        assert_eq!(output.failure_reason(), Some(FailureReason::TimeLimit));
    }

    #[test]
    fn stopped_solver_with_solution_is_usable() {
        let output = SolverOutput {
            status: SolverStatus::TimeLimitReached,
            values: vec![1.0, 0.0],
        };
        assert!(output.has_solution());
        assert_eq!(output.failure_reason(), None);
    }
}
