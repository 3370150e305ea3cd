//! Scheduling of final presentations.
//!
//! Every group with a confirmed tutor gets one date slot and one evaluator. The integer program
//! contains one binary variable per feasible (group, tutor, evaluator, slot) combination. A
//! combination is feasible, if the slot is available for the group, its tutor and the evaluator,
//! and the evaluator is not the group's own tutor.
//!
//! Besides the obvious constraints (one date per group, one group per slot, a weekly maximum per
//! evaluator) the evaluators' loads are balanced. The objective minimizes the number of days each
//! evaluator has to attend, weighted by the week number. This way, presentations are packed into
//! few days and early weeks are preferred.
//!
//! The model typically has many optimal solutions. Which one is returned depends on the solver.

#[cfg(test)]
mod tests;

use crate::ilp::{Comparison, IlpModel, IlpSolver, ModelBuilder, Sense, SolveLimits, VarId};
use crate::{
    index_by_id, AssignedGroup, DateSlot, DayKey, Error, FailureReason, GroupId, Outcome, Result,
    SlotKey, Tutor, TutorId,
};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Maximum number of presentations per evaluator and week
    pub max_groups_per_week: u32,
    /// Maximum difference of the number of presentations between any two evaluators
    pub evaluator_balance: u32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        ScheduleSettings {
            max_groups_per_week: 4,
            evaluator_balance: 2,
        }
    }
}

/// Input of a scheduling run
#[derive(Clone, Copy, Debug)]
pub struct ScheduleProblem<'a> {
    /// Groups with confirmed tutor
    pub groups: &'a [AssignedGroup],
    /// All tutors. Tutors flagged as evaluator may be chosen as evaluator.
    pub tutors: &'a [Tutor],
    /// All date slots that may be used for presentations
    pub dates: &'a [DateSlot],
}

/// Scheduled final presentation of a group
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Presentation {
    pub group: GroupId,
    pub tutor: TutorId,
    pub evaluator: TutorId,
    pub date: DateSlot,
}

impl Presentation {
    /// Store date and evaluator in the group
    pub fn apply_to(&self, group: &mut AssignedGroup) {
        group.date = Some(self.date);
        group.reviewer = Some(self.evaluator);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct PresentationKey {
    pub group: GroupId,
    pub tutor: TutorId,
    pub evaluator: TutorId,
    pub slot: SlotKey,
}

/// The scheduling ILP together with the side tables to interpret its solution
pub(crate) struct ScheduleModel {
    pub model: IlpModel,
    pub presentations: BTreeMap<PresentationKey, VarId>,
    /// "Evaluator attends on that day" indicators
    pub attendance: BTreeMap<(TutorId, DayKey), VarId>,
    /// Groups without any feasible (evaluator, slot) combination
    pub unschedulable: Vec<GroupId>,
}

/// Assign a date and an evaluator to every group.
pub fn schedule_presentations<S: IlpSolver>(
    problem: &ScheduleProblem,
    settings: &ScheduleSettings,
    solver: &S,
    limits: &SolveLimits,
) -> Result<Outcome<Presentation>> {
    if problem.groups.is_empty() {
        return Ok(Outcome::success(Vec::new()));
    }
    let universe = slot_universe(problem.dates);
    let schedule_model = build_schedule_model(problem, settings)?;
    if !schedule_model.unschedulable.is_empty() {
        warn!(
            "No evaluator and date available for groups {:?}",
            schedule_model.unschedulable
        );
        return Ok(Outcome::failed(FailureReason::Infeasible));
    }

    info!(
        "Scheduling {} presentations on {} date slots",
        problem.groups.len(),
        universe.len()
    );
    let ScheduleModel {
        model,
        presentations,
        attendance,
        ..
    } = schedule_model;
    let output = solver.solve(model, limits);
    if let Some(reason) = output.failure_reason() {
        info!("No presentation schedule found: {:?}", reason);
        return Ok(Outcome::failed(reason));
    }

    let mut result = Vec::new();
    for (key, var) in presentations.iter() {
        if !output.is_set(*var) {
            continue;
        }
        // Keys are only created for slots of the universe
        if let Some(date) = universe.get(&key.slot) {
            result.push(Presentation {
                group: key.group,
                tutor: key.tutor,
                evaluator: key.evaluator,
                date: *date,
            });
        }
    }

    let scheduled: BTreeSet<GroupId> = result.iter().map(|p| p.group).collect();
    if scheduled.len() != result.len() || scheduled.len() != problem.groups.len() {
        warn!(
            "Solver returned {} presentations for {} distinct of {} groups",
            result.len(),
            scheduled.len(),
            problem.groups.len()
        );
        return Ok(Outcome::failed(FailureReason::Solver(String::from(
            "Solution does not schedule every group exactly once",
        ))));
    }
    result.sort_by_key(|p| (p.date, p.group));
    debug!(
        "Evaluators attend on {} days in total",
        attendance.values().filter(|v| output.is_set(**v)).count()
    );
    info!("Scheduled {} presentations", result.len());
    Ok(Outcome::success(result))
}

/// Map each slot key to its (first) date slot
fn slot_universe(dates: &[DateSlot]) -> BTreeMap<SlotKey, DateSlot> {
    let mut universe = BTreeMap::new();
    for date in dates.iter() {
        universe.entry(date.key()).or_insert(*date);
    }
    universe
}

/// Sum of the given variables with coefficient 1
fn sum_of<'v, I: IntoIterator<Item = &'v VarId>>(vars: I) -> Vec<(VarId, f64)> {
    vars.into_iter().map(|v| (*v, 1.0)).collect()
}

pub(crate) fn build_schedule_model(
    problem: &ScheduleProblem,
    settings: &ScheduleSettings,
) -> Result<ScheduleModel> {
    let tutors = index_by_id(problem.tutors, "tutor", |t| t.id)?;
    index_by_id(problem.groups, "group", |g| g.id)?;
    let universe: BTreeSet<SlotKey> = problem.dates.iter().map(DateSlot::key).collect();
    let evaluators: Vec<(&Tutor, BTreeSet<SlotKey>)> = problem
        .tutors
        .iter()
        .filter(|t| t.is_evaluator)
        .map(|t| (t, t.slot_keys()))
        .collect();

    let mut builder = ModelBuilder::new(Sense::Minimise);
    let mut presentations = BTreeMap::<PresentationKey, VarId>::new();
    let mut unschedulable = Vec::new();

    for group in problem.groups.iter() {
        let tutor = tutors.get(&group.tutor).ok_or(Error::UnknownTutor {
            tutor: group.tutor,
            group: group.id,
        })?;
        let tutor_slots = tutor.slot_keys();
        let common_slots: BTreeSet<SlotKey> = group
            .available
            .iter()
            .map(DateSlot::key)
            .filter(|s| universe.contains(s) && tutor_slots.contains(s))
            .collect();

        let mut has_options = false;
        for (evaluator, evaluator_slots) in evaluators.iter() {
            if evaluator.id == tutor.id {
                continue;
            }
            for slot in common_slots.intersection(evaluator_slots) {
                let key = PresentationKey {
                    group: group.id,
                    tutor: tutor.id,
                    evaluator: evaluator.id,
                    slot: *slot,
                };
                let var = builder.add_binary(
                    format!("x_g{}_u{}_e{}_{}", group.id, tutor.id, evaluator.id, slot),
                    0.0,
                );
                presentations.insert(key, var);
                has_options = true;
            }
        }
        if !has_options {
            unschedulable.push(group.id);
        }
    }
    debug!("Created {} presentation variables", presentations.len());

    // (1) exactly one date per group, linked via one indicator per (group, date)
    for (group, keys) in presentations
        .iter()
        .group_by(|(k, _)| k.group)
        .into_iter()
    {
        let by_slot = keys.into_group_map_by(|(k, _)| k.slot);
        let mut date_indicators = Vec::new();
        for (slot, vars) in by_slot.into_iter().sorted_by_key(|(s, _)| *s) {
            let indicator = builder.add_binary(format!("y_g{}_{}", group, slot), 0.0);
            builder.constrain(
                format!("link_g{}_{}", group, slot),
                sum_of(vars.iter().map(|(_, v)| *v))
                    .into_iter()
                    .chain(std::iter::once((indicator, -1.0))),
                Comparison::Equal,
                0.0,
            );
            date_indicators.push(indicator);
        }
        builder.constrain(
            format!("one_date_g{}", group),
            sum_of(date_indicators.iter()),
            Comparison::Equal,
            1.0,
        );
    }

    // (2) at most one group per slot
    for slot in universe.iter() {
        builder.constrain(
            format!("slot_{}", slot),
            sum_of(
                presentations
                    .iter()
                    .filter(|(k, _)| k.slot == *slot)
                    .map(|(_, v)| v),
            ),
            Comparison::LessEq,
            1.0,
        );
    }

    // (3) weekly maximum per evaluator
    let by_evaluator_week = presentations
        .iter()
        .into_group_map_by(|(k, _)| (k.evaluator, k.slot.week));
    for ((evaluator, week), vars) in by_evaluator_week.into_iter().sorted_by_key(|(k, _)| *k) {
        builder.constrain(
            format!("week_e{}_w{}", evaluator, week),
            sum_of(vars.iter().map(|(_, v)| *v)),
            Comparison::LessEq,
            settings.max_groups_per_week as f64,
        );
    }

    // (4) attendance indicators, weighted by week in the objective
    let mut attendance = BTreeMap::<(TutorId, DayKey), VarId>::new();
    let by_evaluator_day = presentations
        .iter()
        .into_group_map_by(|(k, _)| (k.evaluator, k.slot.day()));
    for ((evaluator, day), vars) in by_evaluator_day.into_iter().sorted_by_key(|(k, _)| *k) {
        let indicator = builder.add_binary(format!("z_e{}_{}", evaluator, day), day.week as f64);
        let normalization = 1.0 / vars.len() as f64;
        builder.constrain(
            format!("attend_e{}_{}", evaluator, day),
            std::iter::once((indicator, 1.0))
                .chain(vars.iter().map(|(_, v)| (**v, -normalization))),
            Comparison::GreaterEq,
            0.0,
        );
        attendance.insert((evaluator, day), indicator);
    }

    // (5) load counters and pairwise balance of evaluators with any option
    let mut loads = BTreeMap::<TutorId, VarId>::new();
    let by_evaluator = presentations
        .iter()
        .into_group_map_by(|(k, _)| k.evaluator);
    for (evaluator, vars) in by_evaluator.into_iter().sorted_by_key(|(e, _)| *e) {
        let count = builder.add_integer(format!("count_e{}", evaluator), 0.0, None, 0.0);
        builder.constrain(
            format!("count_e{}", evaluator),
            std::iter::once((count, 1.0)).chain(vars.iter().map(|(_, v)| (**v, -1.0))),
            Comparison::Equal,
            0.0,
        );
        loads.insert(evaluator, count);
    }
    for ((a, load_a), (b, load_b)) in loads.iter().tuple_combinations() {
        builder.constrain(
            format!("balance_e{}_e{}", a, b),
            vec![(*load_a, 1.0), (*load_b, -1.0)],
            Comparison::LessEq,
            settings.evaluator_balance as f64,
        );
        builder.constrain(
            format!("balance_e{}_e{}", b, a),
            vec![(*load_b, 1.0), (*load_a, -1.0)],
            Comparison::LessEq,
            settings.evaluator_balance as f64,
        );
    }

    Ok(ScheduleModel {
        model: builder.build(),
        presentations,
        attendance,
        unschedulable,
    })
}
