//! Assignment of topics and tutors to student groups.
//!
//! Two interchangeable strategies implement the `AssignmentStrategy` trait:
//!
//! * `IlpAssigner` builds an integer program with one binary variable per feasible (group, tutor,
//!   topic) triple, maximizing the preference weight of the chosen triples under topic capacity,
//!   tutor capacity and tutor balance constraints.
//! * `FlowAssigner` builds a layered min-cost-flow network (source → group → topic choice → topic →
//!   tutor offer → tutor → sink). It respects all capacities, but cannot guarantee the balance
//!   between tutors.
//!
//! Both report an infeasible problem as failed `Outcome` without any assignments.

pub mod quality;

use crate::flow::{total_outflow, trace_unit_path, FlowMap, FlowNetwork, FlowSolver};
use crate::ilp::{Comparison, IlpModel, IlpSolver, ModelBuilder, Sense, SolveLimits, VarId};
use crate::{
    index_by_id, Error, FailureReason, Group, GroupId, Outcome, Result, Topic, TopicAssignment,
    TopicId, Tutor, TutorId, MAX_GROUP_SIZE, MAX_PREFERENCES,
};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Input of a single assignment run
#[derive(Clone, Copy, Debug)]
pub struct AssignmentProblem<'a> {
    pub groups: &'a [Group],
    pub topics: &'a [Topic],
    pub tutors: &'a [Tutor],
    /// Maximum difference of the number of assigned groups between any two tutors
    pub balance_limit: u32,
}

impl<'a> AssignmentProblem<'a> {
    /// Check all references between the entities and build the topic lookup table.
    fn validate(&self) -> Result<BTreeMap<TopicId, &'a Topic>> {
        let topics = index_by_id(self.topics, "topic", |t| t.id)?;
        index_by_id(self.groups, "group", |g| g.id)?;
        index_by_id(self.tutors, "tutor", |t| t.id)?;
        for group in self.groups.iter() {
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
        }
        for tutor in self.tutors.iter() {
            for offer in tutor.offered_topics.iter() {
                if !topics.contains_key(&offer.topic) {
                    return Err(Error::UnknownTopic {
                        topic: offer.topic,
                        referenced_by: format!("tutor {}", tutor.id),
                    });
                }
            }
            index_by_id(&tutor.offered_topics, "offered topic", |o| o.topic)?;
            if tutor.capacity == 0 || tutor.offered_topics.is_empty() {
                warn!(
                    "Tutor {} cannot take any group. The balance limit caps every other tutor's \
                     load at {} groups.",
                    tutor.id, self.balance_limit
                );
            }
        }
        Ok(topics)
    }
}

/// Objective weights of the ILP formulation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceWeights {
    /// Weights of the first, second, third, … choice
    pub ranked: Vec<f64>,
    /// Weight of a non-chosen topic from the group's most common category
    pub category: f64,
    /// Weight of any other topic
    pub floor: f64,
}

impl Default for PreferenceWeights {
    fn default() -> Self {
        PreferenceWeights {
            ranked: vec![100.0, 90.0, 80.0],
            category: 50.0,
            floor: 10.0,
        }
    }
}

impl PreferenceWeights {
    fn weight(&self, group: &Group, topic: &Topic, favourite_category: Option<&str>) -> f64 {
        if let Some(w) = group
            .preference_rank(topic.id)
            .and_then(|rank| self.ranked.get(rank))
        {
            return *w;
        }
        match favourite_category {
            Some(category) if category == topic.category => self.category,
            _ => self.floor,
        }
    }
}

/// The category occurring most often among the group's preferred topics. Ties are broken in favour
/// of the category of the better ranked topic.
pub(crate) fn most_common_category<'t>(
    group: &Group,
    topics: &BTreeMap<TopicId, &'t Topic>,
) -> Option<&'t str> {
    let categories: Vec<&'t str> = group
        .preferences
        .iter()
        .filter_map(|t| topics.get(t))
        .map(|t| t.category.as_str())
        .filter(|c| !c.is_empty())
        .collect();
    let counts = categories.iter().counts();
    let max_count = counts.values().max()?;
    categories
        .iter()
        .find(|c| counts.get(c) == Some(max_count))
        .copied()
}

/// Common contract of the assignment formulations
pub trait AssignmentStrategy {
    fn assign(&self, problem: &AssignmentProblem) -> Result<Outcome<TopicAssignment>>;
}

/// Integer program formulation
pub struct IlpAssigner<S> {
    pub solver: S,
    pub limits: SolveLimits,
    pub weights: PreferenceWeights,
}

impl<S: IlpSolver> IlpAssigner<S> {
    pub fn new(solver: S, limits: SolveLimits, weights: PreferenceWeights) -> Self {
        IlpAssigner {
            solver,
            limits,
            weights,
        }
    }
}

impl<S: IlpSolver> AssignmentStrategy for IlpAssigner<S> {
    fn assign(&self, problem: &AssignmentProblem) -> Result<Outcome<TopicAssignment>> {
        let topics = problem.validate()?;
        if problem.groups.is_empty() {
            return Ok(Outcome::success(Vec::new()));
        }
        info!(
            "Assigning {} groups to {} topics of {} tutors (ILP, balance limit {})",
            problem.groups.len(),
            problem.topics.len(),
            problem.tutors.len(),
            problem.balance_limit
        );

        let (model, variables) = build_assignment_model(problem, &topics, &self.weights);
        let output = self.solver.solve(model, &self.limits);
        if let Some(reason) = output.failure_reason() {
            info!("No assignment found: {:?}", reason);
            return Ok(Outcome::failed(reason));
        }

        let assignments: Vec<TopicAssignment> = variables
            .iter()
            .filter(|(_, var)| output.is_set(**var))
            .map(|(key, _)| *key)
            .collect();
        Ok(check_complete(problem.groups, assignments))
    }
}

/// Build the ILP model and the side table from (group, tutor, topic) triple to its variable.
pub(crate) fn build_assignment_model(
    problem: &AssignmentProblem,
    topics: &BTreeMap<TopicId, &Topic>,
    weights: &PreferenceWeights,
) -> (IlpModel, BTreeMap<TopicAssignment, VarId>) {
    let mut builder = ModelBuilder::new(Sense::Maximise);
    let mut variables = BTreeMap::<TopicAssignment, VarId>::new();

    for group in problem.groups.iter() {
        let favourite_category = most_common_category(group, topics);
        for tutor in problem.tutors.iter() {
            for offer in tutor.offered_topics.iter() {
                let topic = topics[&offer.topic];
                let key = TopicAssignment {
                    group: group.id,
                    tutor: tutor.id,
                    topic: topic.id,
                };
                let objective =
                    weights.weight(group, topic, favourite_category) - offer.cost as f64;
                let var = builder.add_binary(
                    format!("x_g{}_u{}_t{}", group.id, tutor.id, topic.id),
                    objective,
                );
                variables.insert(key, var);
            }
        }
    }
    debug!("Created {} assignment variables", variables.len());

    // (1) each group gets exactly one (tutor, topic)
    for group in problem.groups.iter() {
        builder.constrain(
            format!("group_{}", group.id),
            variables
                .iter()
                .filter(|(k, _)| k.group == group.id)
                .map(|(_, v)| (*v, 1.0)),
            Comparison::Equal,
            1.0,
        );
    }

    // (2) topic capacities
    for topic in problem.topics.iter() {
        builder.constrain(
            format!("topic_{}", topic.id),
            variables
                .iter()
                .filter(|(k, _)| k.topic == topic.id)
                .map(|(_, v)| (*v, 1.0)),
            Comparison::LessEq,
            topic.capacity as f64,
        );
    }

    // (3) tutor capacities, in total and per offered topic
    let tutor_load = |tutor: TutorId| -> Vec<(VarId, f64)> {
        variables
            .iter()
            .filter(|(k, _)| k.tutor == tutor)
            .map(|(_, v)| (*v, 1.0))
            .collect()
    };
    for tutor in problem.tutors.iter() {
        builder.constrain(
            format!("tutor_{}", tutor.id),
            tutor_load(tutor.id),
            Comparison::LessEq,
            tutor.capacity as f64,
        );
        for offer in tutor.offered_topics.iter() {
            builder.constrain(
                format!("tutor_{}_topic_{}", tutor.id, offer.topic),
                variables
                    .iter()
                    .filter(|(k, _)| k.tutor == tutor.id && k.topic == offer.topic)
                    .map(|(_, v)| (*v, 1.0)),
                Comparison::LessEq,
                offer.capacity as f64,
            );
        }
    }

    // (4) |load(a) - load(b)| <= balance_limit for every pair of tutors
    for (a, b) in problem.tutors.iter().tuple_combinations() {
        let load_a = tutor_load(a.id);
        let load_b = tutor_load(b.id);
        let difference = |plus: &[(VarId, f64)], minus: &[(VarId, f64)]| -> Vec<(VarId, f64)> {
            plus.iter()
                .copied()
                .chain(minus.iter().map(|(v, c)| (*v, -c)))
                .collect()
        };
        builder.constrain(
            format!("balance_{}_{}", a.id, b.id),
            difference(&load_a, &load_b),
            Comparison::LessEq,
            problem.balance_limit as f64,
        );
        builder.constrain(
            format!("balance_{}_{}", b.id, a.id),
            difference(&load_b, &load_a),
            Comparison::LessEq,
            problem.balance_limit as f64,
        );
    }

    (builder.build(), variables)
}

/// Make sure every group got exactly one assignment. Otherwise, the whole result is discarded.
fn check_complete(groups: &[Group], assignments: Vec<TopicAssignment>) -> Outcome<TopicAssignment> {
    let assigned: BTreeSet<GroupId> = assignments.iter().map(|a| a.group).collect();
    if assigned.len() != assignments.len() || assigned.len() != groups.len() {
        warn!(
            "Solver returned {} assignments for {} distinct of {} groups",
            assignments.len(),
            assigned.len(),
            groups.len()
        );
        return Outcome::failed(FailureReason::Solver(String::from(
            "Solution does not assign every group exactly once",
        )));
    }
    Outcome::success(assignments)
}

/// Nodes of the assignment flow network
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum FlowNode {
    Source,
    Group(GroupId),
    Choice(GroupId, TopicId),
    TopicIn(TopicId),
    TopicOut(TopicId),
    Offer(TopicId, TutorId),
    Tutor(TutorId),
    Sink,
}

/// Min-cost-flow formulation. Ignores the problem's balance limit.
pub struct FlowAssigner<F> {
    pub solver: F,
}

impl<F: FlowSolver> FlowAssigner<F> {
    pub fn new(solver: F) -> Self {
        FlowAssigner { solver }
    }
}

impl<F: FlowSolver> AssignmentStrategy for FlowAssigner<F> {
    fn assign(&self, problem: &AssignmentProblem) -> Result<Outcome<TopicAssignment>> {
        let topics = problem.validate()?;
        if problem.groups.is_empty() {
            return Ok(Outcome::success(Vec::new()));
        }
        info!(
            "Assigning {} groups to {} topics of {} tutors (min cost flow)",
            problem.groups.len(),
            problem.topics.len(),
            problem.tutors.len()
        );
        debug!(
            "Balance limit {} is not enforced by the flow formulation",
            problem.balance_limit
        );

        let network = build_flow_network(problem, &topics);
        let flow = self.solver.min_cost_max_flow(&network);
        let (assignments, unrouted) = route_groups(problem.groups, flow);
        if !unrouted.is_empty() {
            info!(
                "Only {} of {} groups could be routed through the network",
                assignments.len(),
                problem.groups.len()
            );
            return Ok(Outcome::failed(FailureReason::PartialFlow {
                routed: assignments.len(),
                required: problem.groups.len(),
                unrouted,
            }));
        }
        Ok(check_complete(problem.groups, assignments))
    }
}

/// Preference distance of a topic for a group: the rank of a chosen topic, MAX_PREFERENCES otherwise
fn preference_distance(group: &Group, topic: TopicId) -> i64 {
    group.preference_rank(topic).unwrap_or(MAX_PREFERENCES) as i64
}

pub(crate) fn build_flow_network(
    problem: &AssignmentProblem,
    topics: &BTreeMap<TopicId, &Topic>,
) -> FlowNetwork<FlowNode> {
    let mut network = FlowNetwork::new(FlowNode::Source, FlowNode::Sink);
    let offered: BTreeSet<TopicId> = problem
        .tutors
        .iter()
        .flat_map(|t| t.offered_topics.iter().map(|o| o.topic))
        .collect();

    for group in problem.groups.iter() {
        network.add_edge(FlowNode::Source, FlowNode::Group(group.id), 1, 1);
        for topic in offered.iter() {
            let choice = FlowNode::Choice(group.id, *topic);
            network.add_edge(
                FlowNode::Group(group.id),
                choice.clone(),
                1,
                preference_distance(group, *topic),
            );
            network.add_edge(choice, FlowNode::TopicIn(*topic), 1, 0);
        }
    }
    for topic in offered.iter() {
        network.add_edge(
            FlowNode::TopicIn(*topic),
            FlowNode::TopicOut(*topic),
            topics[topic].capacity,
            0,
        );
    }
    for tutor in problem.tutors.iter() {
        for offer in tutor.offered_topics.iter() {
            let node = FlowNode::Offer(offer.topic, tutor.id);
            network.add_edge(
                FlowNode::TopicOut(offer.topic),
                node.clone(),
                offer.capacity,
                offer.cost as i64,
            );
            network.add_edge(node, FlowNode::Tutor(tutor.id), offer.capacity, 0);
        }
        network.add_edge(FlowNode::Tutor(tutor.id), FlowNode::Sink, tutor.capacity, 1);
    }
    debug!(
        "Created flow network with {} nodes and {} edges",
        network.num_nodes(),
        network.edges().len()
    );
    network
}

/// Decompose the flow into one unit path per group and read topic and tutor off each path.
///
/// Returns the assignments of all routed groups and the ids of the groups without flow.
pub(crate) fn route_groups(
    groups: &[Group],
    mut flow: FlowMap<FlowNode>,
) -> (Vec<TopicAssignment>, Vec<GroupId>) {
    let mut assignments = Vec::new();
    let mut unrouted = Vec::new();
    for group in groups.iter() {
        let start = FlowNode::Group(group.id);
        if total_outflow(&flow, &start) == 0 {
            unrouted.push(group.id);
            continue;
        }
        let path = match trace_unit_path(&mut flow, &start, &FlowNode::Sink) {
            Some(path) => path,
            None => {
                warn!("Flow of group {} does not reach the sink", group.id);
                unrouted.push(group.id);
                continue;
            }
        };
        let topic = path.iter().find_map(|n| match n {
            FlowNode::Choice(_, t) => Some(*t),
            _ => None,
        });
        let tutor = path.iter().find_map(|n| match n {
            FlowNode::Offer(_, u) => Some(*u),
            _ => None,
        });
        match (topic, tutor) {
            (Some(topic), Some(tutor)) => assignments.push(TopicAssignment {
                group: group.id,
                tutor,
                topic,
            }),
            _ => unrouted.push(group.id),
        }
    }
    (assignments, unrouted)
}
