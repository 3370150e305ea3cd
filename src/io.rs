pub mod simple;

use crate::former::FormationOutcome;
use crate::schedule::Presentation;
use crate::substitutes::SubstitutePool;
use crate::{
    FailureReason, Group, GroupId, Outcome, Status, Topic, TopicAssignment, TopicId, Tutor,
    TutorId,
};
use itertools::Itertools;
use std::collections::BTreeMap;

fn tutor_name(tutors: &BTreeMap<TutorId, &Tutor>, id: TutorId) -> String {
    match tutors.get(&id) {
        Some(t) if !t.name.is_empty() => t.name.clone(),
        _ => format!("Tutor {}", id),
    }
}

fn topic_title(topics: &BTreeMap<TopicId, &Topic>, id: TopicId) -> String {
    match topics.get(&id) {
        Some(t) if !t.title.is_empty() => t.title.clone(),
        _ => format!("Topic {}", id),
    }
}

/// One line summary of a failed solve
pub fn format_failure(reason: &FailureReason) -> String {
    match reason {
        FailureReason::Infeasible => String::from("No solution satisfies all constraints"),
        FailureReason::PartialFlow {
            routed,
            required,
            unrouted,
        } => format!(
            "Only {} of {} groups could be assigned (unassigned: {})",
            routed,
            required,
            unrouted.iter().join(", ")
        ),
        FailureReason::TimeLimit => {
            String::from("Time limit reached before any solution was found")
        }
        FailureReason::Solver(message) => format!("Solver error: {}", message),
    }
}

fn format_status<T>(outcome: &Outcome<T>) -> Option<String> {
    match outcome.status() {
        Status::Success => None,
        Status::Failed(reason) => Some(format!("FAILED: {}\n", format_failure(reason))),
    }
}

/// Format the calculated topic assignment into a human readable String (e.g. to print it to
/// stdout).
///
/// The output format will look like
/// ```text
/// ===== Tutor name =====
/// Group 3: Topic title (choice 1)
/// Group 7: Another topic (not chosen)
///
/// ===== Another tutor =====
/// …
/// ```
pub fn format_assignment(
    outcome: &Outcome<TopicAssignment>,
    groups: &[Group],
    topics: &[Topic],
    tutors: &[Tutor],
) -> String {
    if let Some(failure) = format_status(outcome) {
        return failure;
    }
    let groups: BTreeMap<GroupId, &Group> = groups.iter().map(|g| (g.id, g)).collect();
    let topics: BTreeMap<TopicId, &Topic> = topics.iter().map(|t| (t.id, t)).collect();
    let tutor_index: BTreeMap<TutorId, &Tutor> = tutors.iter().map(|t| (t.id, t)).collect();
    let by_tutor = outcome.items().iter().into_group_map_by(|a| a.tutor);

    let mut result = String::new();
    for tutor in tutors.iter() {
        result.push_str(&format!(
            "\n===== {} =====\n",
            tutor_name(&tutor_index, tutor.id)
        ));
        for assignment in by_tutor.get(&tutor.id).into_iter().flatten().sorted() {
            let choice = groups
                .get(&assignment.group)
                .and_then(|g| g.preference_rank(assignment.topic))
                .map(|rank| format!("choice {}", rank + 1))
                .unwrap_or_else(|| String::from("not chosen"));
            result.push_str(&format!(
                "Group {}: {} ({})\n",
                assignment.group,
                topic_title(&topics, assignment.topic),
                choice
            ));
        }
    }
    result
}

/// Format the formed groups, one line per group with its students and source groups.
pub fn format_formation(outcome: &FormationOutcome) -> String {
    let mut result = format!(
        "{} groups ({} unions, {} greedy merges)\n",
        outcome.groups.len(),
        outcome.ilp_unions,
        outcome.greedy_merges
    );
    for group in outcome.groups.iter() {
        result.push_str(&format!(
            "Group {} [{}]: students {}; preferences {}\n",
            group.id,
            group.sources.iter().join("+"),
            group.students.iter().join(", "),
            group.preferences.iter().join(", ")
        ));
    }
    result
}

/// Format a presentation schedule, ordered by date, including the substitute evaluators.
pub fn format_schedule(
    outcome: &Outcome<Presentation>,
    substitutes: &[SubstitutePool],
    tutors: &[Tutor],
) -> String {
    if let Some(failure) = format_status(outcome) {
        return failure;
    }
    let tutor_index: BTreeMap<TutorId, &Tutor> = tutors.iter().map(|t| (t.id, t)).collect();
    let pools: BTreeMap<GroupId, &SubstitutePool> =
        substitutes.iter().map(|p| (p.group, p)).collect();

    let mut result = String::new();
    for (day, presentations) in outcome
        .items()
        .iter()
        .sorted_by_key(|p| (p.date, p.group))
        .group_by(|p| p.date.timestamp().date())
        .into_iter()
    {
        result.push_str(&format!("\n===== {} =====\n", day.format("%a %Y-%m-%d")));
        for presentation in presentations {
            let substitutes = pools
                .get(&presentation.group)
                .map(|p| {
                    p.substitutes
                        .iter()
                        .map(|s| tutor_name(&tutor_index, *s))
                        .join(", ")
                })
                .unwrap_or_default();
            result.push_str(&format!(
                "{} Group {}: tutor {}, evaluator {}{}\n",
                presentation.date.timestamp().format("%H:%M"),
                presentation.group,
                tutor_name(&tutor_index, presentation.tutor),
                tutor_name(&tutor_index, presentation.evaluator),
                if substitutes.is_empty() {
                    String::new()
                } else {
                    format!(" (substitutes: {})", substitutes)
                }
            ));
        }
    }
    result
}
