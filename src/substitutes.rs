//! Lookup of substitute evaluators for a finished presentation schedule.

use crate::schedule::Presentation;
use crate::{DateSlot, GroupId, Tutor, TutorId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Evaluators who could step in for the assigned evaluator of one presentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubstitutePool {
    pub group: GroupId,
    pub evaluator: TutorId,
    pub date: DateSlot,
    pub substitutes: BTreeSet<TutorId>,
}

/// Collect the substitute pool of every presentation.
///
/// A substitute is an evaluator available at the presentation's slot (same ISO week, weekday and
/// hour) who is neither the assigned evaluator nor the group's tutor. Pools may be empty. The
/// schedule itself is not touched.
pub fn find_substitutes(presentations: &[Presentation], tutors: &[Tutor]) -> Vec<SubstitutePool> {
    let evaluators: Vec<(TutorId, BTreeSet<_>)> = tutors
        .iter()
        .filter(|t| t.is_evaluator)
        .map(|t| (t.id, t.slot_keys()))
        .collect();

    presentations
        .iter()
        .map(|presentation| {
            let key = presentation.date.key();
            let substitutes: BTreeSet<TutorId> = evaluators
                .iter()
                .filter(|(id, slots)| {
                    *id != presentation.evaluator
                        && *id != presentation.tutor
                        && slots.contains(&key)
                })
                .map(|(id, _)| *id)
                .collect();
            if substitutes.is_empty() {
                debug!(
                    "No substitute for evaluator {} of group {} on {}",
                    presentation.evaluator, presentation.group, presentation.date
                );
            }
            SubstitutePool {
                group: presentation.group,
                evaluator: presentation.evaluator,
                date: presentation.date,
                substitutes,
            }
        })
        .collect()
}

/// Regroup substitute pools per assigned evaluator and date.
pub fn pools_by_evaluator(
    pools: &[SubstitutePool],
) -> BTreeMap<TutorId, BTreeMap<DateSlot, BTreeSet<TutorId>>> {
    let mut result = BTreeMap::<TutorId, BTreeMap<DateSlot, BTreeSet<TutorId>>>::new();
    for pool in pools.iter() {
        result
            .entry(pool.evaluator)
            .or_default()
            .entry(pool.date)
            .or_default()
            .extend(pool.substitutes.iter().cloned());
    }
    result
}
