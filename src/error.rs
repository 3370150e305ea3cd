//! Error type for input contract violations and IO failures.
//!
//! Note that an infeasible optimization problem is *not* an error: it is reported as a failed
//! `Outcome`, so the caller can relax constraints and try again.

use crate::{GroupId, StudentId, TopicId, TutorId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Topic {topic} referenced by {referenced_by} does not exist")]
    UnknownTopic {
        topic: TopicId,
        referenced_by: String,
    },
    #[error("Tutor {tutor} of group {group} does not exist")]
    UnknownTutor { tutor: TutorId, group: GroupId },
    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },
    #[error("Group {group} has {size} students, expected 1 to {max}")]
    InvalidGroupSize {
        group: GroupId,
        size: usize,
        max: usize,
    },
    #[error("Group {group} lists {count} topic preferences, at most {max} are allowed")]
    TooManyPreferences {
        group: GroupId,
        count: usize,
        max: usize,
    },
    #[error("Student {student} is a member of groups {first} and {second}")]
    DuplicateStudent {
        student: StudentId,
        first: GroupId,
        second: GroupId,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
