//! Assignment and scheduling engine for student project courses.
//!
//! The crate takes already loaded groups, topics, tutors and date slots and answers three
//! questions:
//!
//! * which topic and tutor does each group get (`assign`, ILP or min-cost-flow formulation),
//! * how are incomplete groups merged into complete teams of four (`former`),
//! * when and in front of which evaluator does each group present (`schedule`), including
//!   substitute evaluators for each date (`substitutes`).
//!
//! The actual integer program solver and min-cost-flow algorithm live behind the `ilp::IlpSolver`
//! and `flow::FlowSolver` traits.

pub mod assign;
pub mod config;
mod error;
pub mod flow;
pub mod former;
pub mod ilp;
pub mod io;
pub mod schedule;
mod slot;
pub mod substitutes;
mod util;

pub use error::{Error, Result};
pub use slot::{DateSlot, DayKey, SlotKey};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Target size of a complete group
pub const MAX_GROUP_SIZE: usize = 4;
/// Maximum number of ranked topic preferences per group
pub const MAX_PREFERENCES: usize = 3;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Id of a student group (as used by the surrounding course administration)
    GroupId
);
id_type!(
    /// Id of a thesis/project topic
    TopicId
);
id_type!(
    /// Id of a tutor. Evaluators are tutors with the `is_evaluator` flag.
    TutorId
);
id_type!(StudentId);

/// Representation of a project topic
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    /// Topic title. Only used for reports and log output.
    #[serde(default)]
    pub title: String,
    /// Topical category, used to reward assignments close to a group's interests
    #[serde(default)]
    pub category: String,
    /// Maximum number of groups working on this topic at the same time
    pub capacity: u32,
}

/// A topic a tutor is willing to supervise
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfferedTopic {
    pub topic: TopicId,
    /// Maximum number of groups the tutor supervises on this topic
    pub capacity: u32,
    /// Tutor's cost for supervising this topic (lower is preferred)
    #[serde(default = "default_offer_cost")]
    pub cost: u32,
}

fn default_offer_cost() -> u32 {
    1
}

/// Representation of a tutor, who may also act as evaluator of final presentations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tutor {
    pub id: TutorId,
    #[serde(default)]
    pub name: String,
    /// Maximum number of groups in total
    pub capacity: u32,
    /// Offered topics in order of the tutor's listing
    #[serde(default)]
    pub offered_topics: Vec<OfferedTopic>,
    #[serde(default)]
    pub available: BTreeSet<DateSlot>,
    #[serde(default)]
    pub is_evaluator: bool,
}

impl Tutor {
    pub fn offer(&self, topic: TopicId) -> Option<&OfferedTopic> {
        self.offered_topics.iter().find(|o| o.topic == topic)
    }

    pub fn slot_keys(&self) -> BTreeSet<SlotKey> {
        self.available.iter().map(DateSlot::key).collect()
    }
}

/// A group of students that has not been assigned a topic yet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub students: Vec<StudentId>,
    /// Topic choices, first choice first
    #[serde(default)]
    pub preferences: Vec<TopicId>,
    /// Date slots the whole group can attend. Only needed to schedule presentations later on.
    #[serde(default)]
    pub available: BTreeSet<DateSlot>,
}

impl Group {
    pub fn size(&self) -> usize {
        self.students.len()
    }

    pub fn is_complete(&self) -> bool {
        self.size() >= MAX_GROUP_SIZE
    }

    /// Position of the topic in the group's preference list (0 = first choice)
    pub fn preference_rank(&self, topic: TopicId) -> Option<usize> {
        self.preferences.iter().position(|t| *t == topic)
    }
}

/// A group with confirmed topic and tutor, as consumed by the presentation scheduler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignedGroup {
    pub id: GroupId,
    pub tutor: TutorId,
    pub topic: TopicId,
    #[serde(default)]
    pub available: BTreeSet<DateSlot>,
    #[serde(default)]
    pub date: Option<DateSlot>,
    /// The evaluator (reviewer) of the final presentation
    #[serde(default)]
    pub reviewer: Option<TutorId>,
}

/// One result tuple of the group-topic-tutor assignment
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicAssignment {
    pub group: GroupId,
    pub tutor: TutorId,
    pub topic: TopicId,
}

impl TopicAssignment {
    pub fn into_assigned_group(self, available: BTreeSet<DateSlot>) -> AssignedGroup {
        AssignedGroup {
            id: self.group,
            tutor: self.tutor,
            topic: self.topic,
            available,
            date: None,
            reviewer: None,
        }
    }
}

/// Reason for a failed solve
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FailureReason {
    /// No assignment satisfies all constraints
    Infeasible,
    /// The flow formulation could only route a part of the groups
    PartialFlow {
        routed: usize,
        required: usize,
        unrouted: Vec<GroupId>,
    },
    /// The solver stopped at its time limit without any feasible solution
    TimeLimit,
    /// The solver reported an error or returned an inconsistent solution
    Solver(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Status {
    Success,
    Failed(FailureReason),
}

/// Result of a single solve invocation. A failed outcome never carries any items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
    status: Status,
    items: Vec<T>,
}

impl<T> Outcome<T> {
    pub fn success(items: Vec<T>) -> Self {
        Outcome {
            status: Status::Success,
            items,
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        Outcome {
            status: Status::Failed(reason),
            items: Vec::new(),
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Status::Success)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            Status::Success => None,
            Status::Failed(reason) => Some(reason),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Build a lookup table from id to entity, failing on duplicate ids
pub(crate) fn index_by_id<'a, T, K, F>(
    items: &'a [T],
    kind: &'static str,
    id_of: F,
) -> Result<BTreeMap<K, &'a T>>
where
    K: Ord + Copy + Into<u32>,
    F: Fn(&T) -> K,
{
    let mut index = BTreeMap::new();
    for item in items {
        let id = id_of(item);
        if index.insert(id, item).is_some() {
            return Err(Error::DuplicateId {
                kind,
                id: id.into(),
            });
        }
    }
    Ok(index)
}

impl From<GroupId> for u32 {
    fn from(id: GroupId) -> u32 {
        id.0
    }
}

impl From<TopicId> for u32 {
    fn from(id: TopicId) -> u32 {
        id.0
    }
}

impl From<TutorId> for u32 {
    fn from(id: TutorId) -> u32 {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_is_empty() {
        let outcome: Outcome<TopicAssignment> = Outcome::failed(FailureReason::Infeasible);
        assert!(!outcome.is_success());
        assert!(outcome.items().is_empty());
        assert_eq!(outcome.failure(), Some(&FailureReason::Infeasible));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let topics = vec![
            Topic {
                id: TopicId(1),
                title: String::from("A"),
                category: String::new(),
                capacity: 1,
            },
            Topic {
                id: TopicId(1),
                title: String::from("B"),
                category: String::new(),
                capacity: 1,
            },
        ];
        match index_by_id(&topics, "topic", |t| t.id) {
            Err(Error::DuplicateId { kind, id }) => {
                assert_eq!(kind, "topic");
                assert_eq!(id, 1);
            }
            x => panic!("Expected duplicate id error, got {:?}", x.map(|m| m.len())),
        }
    }

    #[test]
    fn preference_rank() {
        let group = Group {
            id: GroupId(7),
            students: vec![StudentId(1), StudentId(2)],
            preferences: vec![TopicId(3), TopicId(1)],
            available: BTreeSet::new(),
        };
        assert_eq!(group.preference_rank(TopicId(3)), Some(0));
        assert_eq!(group.preference_rank(TopicId(1)), Some(1));
        assert_eq!(group.preference_rank(TopicId(2)), None);
        assert!(!group.is_complete());
    }
}
