//! Formation of complete teams from incomplete student groups.
//!
//! Groups with fewer than `MAX_GROUP_SIZE` students are merged in two phases:
//!
//! 1. An integer program chooses disjoint unions of 2, 3 or 4 incomplete groups with exactly
//!    `MAX_GROUP_SIZE` students in total. It maximizes the number of unions, with a bonus for unions
//!    sharing a topic preference (or, weaker, a topic category).
//! 2. The leftovers are merged greedily: the first remaining group is merged with the first other
//!    group that fits, until no more merges are possible.
//!
//! Complete groups are passed through unchanged.

use crate::ilp::{Comparison, IlpSolver, ModelBuilder, Sense, SolveLimits, VarId};
use crate::util::IterSelections;
use crate::{
    index_by_id, Error, Group, GroupId, Result, StudentId, Topic, TopicId, MAX_GROUP_SIZE,
    MAX_PREFERENCES,
};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Objective weights of the union ILP
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnionWeights {
    /// Value of any union
    pub base: f64,
    /// Bonus if all groups of the union share a topic preference
    pub shared_topic_bonus: f64,
    /// Bonus if all groups of the union prefer a topic of the union's most common category
    pub shared_category_bonus: f64,
}

impl Default for UnionWeights {
    fn default() -> Self {
        UnionWeights {
            base: 1.0,
            shared_topic_bonus: 0.5,
            shared_category_bonus: 0.25,
        }
    }
}

/// A group in the result of the formation, possibly merged from multiple input groups
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormedGroup {
    /// Id of the first source group
    pub id: GroupId,
    /// Ids of the input groups this group has been formed from
    pub sources: Vec<GroupId>,
    pub students: Vec<StudentId>,
    pub preferences: Vec<TopicId>,
}

impl FormedGroup {
    pub fn size(&self) -> usize {
        self.students.len()
    }
}

impl From<&Group> for FormedGroup {
    fn from(group: &Group) -> Self {
        FormedGroup {
            id: group.id,
            sources: vec![group.id],
            students: group.students.clone(),
            preferences: group.preferences.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormationOutcome {
    pub groups: Vec<FormedGroup>,
    /// Number of unions chosen by the integer program
    pub ilp_unions: usize,
    /// Number of pairwise merges of the greedy phase
    pub greedy_merges: usize,
}

/// Merge incomplete groups into complete groups of `MAX_GROUP_SIZE` students.
pub fn form_groups<S: IlpSolver>(
    groups: &[Group],
    topics: &[Topic],
    weights: &UnionWeights,
    solver: &S,
    limits: &SolveLimits,
) -> Result<FormationOutcome> {
    let topics = validate(groups, topics)?;

    let (complete, incomplete): (Vec<&Group>, Vec<&Group>) =
        groups.iter().partition(|g| g.is_complete());
    info!(
        "Forming groups from {} incomplete groups ({} complete groups are kept)",
        incomplete.len(),
        complete.len()
    );
    let mut result: Vec<FormedGroup> = complete.into_iter().map(FormedGroup::from).collect();

    let unions = choose_unions(&incomplete, &topics, weights, solver, limits);
    let ilp_unions = unions.len();
    let mut used = BTreeSet::<GroupId>::new();
    for union in unions {
        used.extend(union.iter().map(|g| g.id));
        let mut parts = union.into_iter().map(FormedGroup::from);
        if let Some(first) = parts.next() {
            result.push(merge(first, parts.collect()));
        }
    }

    let leftovers: Vec<FormedGroup> = incomplete
        .into_iter()
        .filter(|g| !used.contains(&g.id))
        .map(FormedGroup::from)
        .collect();
    debug!("{} groups left for greedy merging", leftovers.len());
    let (merged, greedy_merges) = greedy_merge(leftovers);
    result.extend(merged);

    info!(
        "Formed {} groups ({} unions by ILP, {} greedy merges)",
        result.len(),
        ilp_unions,
        greedy_merges
    );
    Ok(FormationOutcome {
        groups: result,
        ilp_unions,
        greedy_merges,
    })
}

fn validate<'t>(groups: &[Group], topics: &'t [Topic]) -> Result<BTreeMap<TopicId, &'t Topic>> {
    let topics = index_by_id(topics, "topic", |t| t.id)?;
    index_by_id(groups, "group", |g| g.id)?;
    let mut members = BTreeMap::<StudentId, GroupId>::new();
    for group in groups.iter() {
        if group.students.is_empty() || group.size() > MAX_GROUP_SIZE {
            return Err(Error::InvalidGroupSize {
                group: group.id,
                size: group.size(),
                max: MAX_GROUP_SIZE,
            });
        }
        if group.preferences.len() > MAX_PREFERENCES {
            return Err(Error::TooManyPreferences {
                group: group.id,
                count: group.preferences.len(),
                max: MAX_PREFERENCES,
            });
        }
        for topic in group.preferences.iter() {
            if !topics.contains_key(topic) {
                return Err(Error::UnknownTopic {
                    topic: *topic,
                    referenced_by: format!("group {}", group.id),
                });
            }
        }
        for student in group.students.iter() {
            if let Some(first) = members.insert(*student, group.id) {
                return Err(Error::DuplicateStudent {
                    student: *student,
                    first,
                    second: group.id,
                });
            }
        }
    }
    Ok(topics)
}

/// Topical affinity bonus of a candidate union
fn union_bonus(members: &[&Group], topics: &BTreeMap<TopicId, &Topic>, weights: &UnionWeights) -> f64 {
    let shares_topic = members[0]
        .preferences
        .iter()
        .any(|t| members.iter().all(|g| g.preferences.contains(t)));
    if shares_topic {
        return weights.shared_topic_bonus;
    }

    let categories: Vec<BTreeSet<&str>> = members
        .iter()
        .map(|g| {
            g.preferences
                .iter()
                .filter_map(|t| topics.get(t))
                .map(|t| t.category.as_str())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .collect();
    let all_categories: Vec<&str> = members
        .iter()
        .flat_map(|g| g.preferences.iter())
        .filter_map(|t| topics.get(t))
        .map(|t| t.category.as_str())
        .filter(|c| !c.is_empty())
        .collect();
    let counts = all_categories.iter().counts();
    let most_common = counts.values().max().and_then(|max_count| {
        all_categories
            .iter()
            .find(|c| counts.get(c) == Some(max_count))
    });
    match most_common {
        Some(category) if categories.iter().all(|c| c.contains(category)) => {
            weights.shared_category_bonus
        }
        _ => 0.0,
    }
}

/// Solve the union ILP and return the chosen unions. Returns no unions if the solver fails.
fn choose_unions<'g, S: IlpSolver>(
    incomplete: &[&'g Group],
    topics: &BTreeMap<TopicId, &Topic>,
    weights: &UnionWeights,
    solver: &S,
    limits: &SolveLimits,
) -> Vec<Vec<&'g Group>> {
    let mut candidates: Vec<Vec<&'g Group>> = Vec::new();
    for k in 2..=MAX_GROUP_SIZE {
        candidates.extend(
            incomplete
                .selections_with_sum(k, MAX_GROUP_SIZE, |g| g.size())
                .into_iter()
                .map(|selection| selection.into_iter().copied().collect::<Vec<&Group>>()),
        );
    }
    debug!("Found {} candidate unions", candidates.len());
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut builder = ModelBuilder::new(Sense::Maximise);
    let variables: Vec<VarId> = candidates
        .iter()
        .map(|members| {
            builder.add_binary(
                format!("u_{}", members.iter().map(|g| g.id).join("_")),
                weights.base + union_bonus(members, topics, weights),
            )
        })
        .collect();
    for group in incomplete.iter() {
        builder.constrain(
            format!("group_{}", group.id),
            candidates
                .iter()
                .zip(&variables)
                .filter(|(members, _)| members.iter().any(|g| g.id == group.id))
                .map(|(_, v)| (*v, 1.0)),
            Comparison::LessEq,
            1.0,
        );
    }

    let output = solver.solve(builder.build(), limits);
    if let Some(reason) = output.failure_reason() {
        warn!(
            "Union ILP failed ({:?}). Falling back to greedy merging only.",
            reason
        );
        return Vec::new();
    }

    let mut used = BTreeSet::<GroupId>::new();
    let mut unions = Vec::new();
    for (members, var) in candidates.into_iter().zip(variables) {
        if !output.is_set(var) {
            continue;
        }
        if members.iter().any(|g| used.contains(&g.id)) {
            warn!(
                "Solver chose overlapping unions. Ignoring union of {:?}.",
                members.iter().map(|g| g.id).collect::<Vec<_>>()
            );
            continue;
        }
        used.extend(members.iter().map(|g| g.id));
        unions.push(members);
    }
    unions
}

/// Merge the groups greedily: take the first group and merge it with the first other group that
/// fits. Returns the resulting groups and the number of merges.
fn greedy_merge(groups: Vec<FormedGroup>) -> (Vec<FormedGroup>, usize) {
    let mut pool: VecDeque<FormedGroup> = groups.into();
    let mut result = Vec::new();
    let mut merges = 0;
    while let Some(current) = pool.pop_front() {
        if current.size() >= MAX_GROUP_SIZE {
            result.push(current);
            continue;
        }
        let partner = pool
            .iter()
            .position(|other| current.size() + other.size() <= MAX_GROUP_SIZE)
            .and_then(|i| pool.remove(i));
        match partner {
            Some(other) => {
                debug!("Merging group {} into group {}", other.id, current.id);
                merges += 1;
                pool.push_front(merge(current, vec![other]));
            }
            None => result.push(current),
        }
    }
    (result, merges)
}

/// Merge groups into the first one. Students and source ids are concatenated, the id of the first
/// group is kept. See `merge_preferences()` for the resulting topic preferences.
fn merge(mut first: FormedGroup, others: Vec<FormedGroup>) -> FormedGroup {
    let parts: Vec<&FormedGroup> = std::iter::once(&first).chain(others.iter()).collect();
    let preferences = merge_preferences(&parts);
    for part in others {
        first.sources.extend(part.sources);
        first.students.extend(part.students);
    }
    first.preferences = preferences;
    first
}

/// Preferences of merged groups: Topics preferred by all groups come first, in the order of the
/// largest group. The list is padded with the remaining preferences (larger groups first) up to
/// `MAX_PREFERENCES` entries.
fn merge_preferences(parts: &[&FormedGroup]) -> Vec<TopicId> {
    let mut by_size: Vec<&FormedGroup> = parts.to_vec();
    // stable sort: ties keep input order
    by_size.sort_by(|a, b| b.size().cmp(&a.size()));
    let largest = match by_size.first() {
        Some(g) => g,
        None => return Vec::new(),
    };

    let mut result: Vec<TopicId> = largest
        .preferences
        .iter()
        .filter(|t| parts.iter().all(|p| p.preferences.contains(t)))
        .copied()
        .collect();
    for topic in by_size.iter().flat_map(|g| g.preferences.iter()) {
        if result.len() >= MAX_PREFERENCES {
            break;
        }
        if !result.contains(topic) {
            result.push(*topic);
        }
    }
    result
}
