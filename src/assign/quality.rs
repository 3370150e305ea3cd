//! Reporting metric for finished topic assignments.

use crate::{Group, GroupId, TopicAssignment, MAX_PREFERENCES};
use std::collections::BTreeMap;

/// Relevance of the first choice. Relevance drops by one per rank, unchosen topics score 0.
const TOP_RELEVANCE: f64 = MAX_PREFERENCES as f64;

/// Relevance and discount of an assignment at the given preference position
fn gain(position: usize) -> f64 {
    let relevance = TOP_RELEVANCE - position.min(MAX_PREFERENCES) as f64;
    relevance / (position as f64 + 2.0).log2()
}

/// Calculate a Discounted Cumulative Gain style quality score (0–100) of an assignment.
///
/// For each group, the position of the assigned topic in its preference list determines the gain
/// `(3 - position) / log2(position + 2)`. Topics that are not among the group's preferences and
/// groups without assignment count as position 3 (i.e. gain 0). The score is the ratio of the
/// summed gains to the ideal gain (every group gets its first choice).
///
/// The score is only meant for reporting. Without groups, the score is 100.
pub fn dcg_quality(groups: &[Group], assignments: &[TopicAssignment]) -> f64 {
    if groups.is_empty() {
        return 100.0;
    }
    let assigned: BTreeMap<GroupId, &TopicAssignment> =
        assignments.iter().map(|a| (a.group, a)).collect();

    let dcg: f64 = groups
        .iter()
        .map(|group| {
            let position = assigned
                .get(&group.id)
                .and_then(|a| group.preference_rank(a.topic))
                .unwrap_or(MAX_PREFERENCES);
            gain(position)
        })
        .sum();
    let ideal_dcg = groups.len() as f64 * gain(0);
    100.0 * dcg / ideal_dcg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StudentId, TopicId, TutorId};
    use assert_float_eq::*;

    fn group(id: u32, preferences: &[u32]) -> Group {
        Group {
            id: GroupId(id),
            students: vec![StudentId(id)],
            preferences: preferences.iter().map(|t| TopicId(*t)).collect(),
            available: Default::default(),
        }
    }

    fn assignment(group: u32, topic: u32) -> TopicAssignment {
        TopicAssignment {
            group: GroupId(group),
            tutor: TutorId(0),
            topic: TopicId(topic),
        }
    }

    #[test]
    fn all_first_choices() {
        let groups = vec![group(0, &[1, 2, 3]), group(1, &[2, 1])];
        let assignments = vec![assignment(0, 1), assignment(1, 2)];
        assert_float_absolute_eq!(dcg_quality(&groups, &assignments), 100.0, 1e-9);
    }

    #[test]
    fn lower_choices_reduce_the_score() {
        let groups = vec![group(0, &[1, 2, 3]), group(1, &[2, 1, 3])];
        // group 1 gets its second choice: gain 2 / log2(3) instead of 3
        let score = dcg_quality(&groups, &[assignment(0, 1), assignment(1, 1)]);
        let expected = 100.0 * (3.0 + 2.0 / 3f64.log2()) / 6.0;
        assert_float_absolute_eq!(score, expected, 1e-9);
        assert!(score < 100.0);

        let third = dcg_quality(&groups, &[assignment(0, 1), assignment(1, 3)]);
        assert!(third < score);
    }

    #[test]
    fn unchosen_and_missing_assignments() {
        let groups = vec![group(0, &[1, 2, 3]), group(1, &[2, 1, 3])];
        // topic 9 is none of group 0's choices, group 1 has no assignment
        assert_float_absolute_eq!(dcg_quality(&groups, &[assignment(0, 9)]), 0.0, 1e-9);
        assert_float_absolute_eq!(dcg_quality(&[], &[]), 100.0, 1e-9);
    }
}
