use crate::former::FormationOutcome;
use crate::schedule::Presentation;
use crate::substitutes::SubstitutePool;
use crate::{
    AssignedGroup, DateSlot, Group, Outcome, Result, Topic, TopicAssignment, Tutor,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Input entities of all solve runs. Every list is optional in the JSON representation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemData {
    pub groups: Vec<Group>,
    pub topics: Vec<Topic>,
    pub tutors: Vec<Tutor>,
    /// Groups with confirmed tutor, waiting for their presentation date
    pub assigned_groups: Vec<AssignedGroup>,
    /// Date slots available for presentations
    pub dates: Vec<DateSlot>,
}

/// Read the problem data from the simple JSON representation (canonical serde_json serialization
/// of the entity objects).
pub fn read<R: std::io::Read>(reader: R) -> Result<ProblemData> {
    Ok(serde_json::from_reader(reader)?)
}

/// Write the problem data to the simple JSON representation.
pub fn write_input_data<W: std::io::Write>(writer: W, data: &ProblemData) -> Result<()> {
    let data = json!({
        "format": "X-tutorplan-data",
        "version": "1.0",
        "groups": serde_json::to_value(&data.groups)?,
        "topics": serde_json::to_value(&data.topics)?,
        "tutors": serde_json::to_value(&data.tutors)?,
        "assigned_groups": serde_json::to_value(&data.assigned_groups)?,
        "dates": serde_json::to_value(&data.dates)?,
    });
    serde_json::to_writer(writer, &data)?;
    Ok(())
}

/// Write the calculated topic assignment together with its quality score.
pub fn write_assignment<W: std::io::Write>(
    writer: W,
    outcome: &Outcome<TopicAssignment>,
    quality: f64,
) -> Result<()> {
    let data = json!({
        "format": "X-tutorplan-assignment",
        "version": "1.0",
        "status": serde_json::to_value(outcome.status())?,
        "assignment": serde_json::to_value(outcome.items())?,
        "quality": quality,
    });
    serde_json::to_writer(writer, &data)?;
    Ok(())
}

/// Write the formed groups.
pub fn write_formation<W: std::io::Write>(writer: W, outcome: &FormationOutcome) -> Result<()> {
    let data = json!({
        "format": "X-tutorplan-groups",
        "version": "1.0",
        "groups": serde_json::to_value(&outcome.groups)?,
        "ilp_unions": outcome.ilp_unions,
        "greedy_merges": outcome.greedy_merges,
    });
    serde_json::to_writer(writer, &data)?;
    Ok(())
}

/// Write the presentation schedule and the substitute evaluators.
pub fn write_schedule<W: std::io::Write>(
    writer: W,
    outcome: &Outcome<Presentation>,
    substitutes: &[SubstitutePool],
) -> Result<()> {
    let data = json!({
        "format": "X-tutorplan-schedule",
        "version": "1.0",
        "status": serde_json::to_value(outcome.status())?,
        "presentations": serde_json::to_value(outcome.items())?,
        "substitutes": serde_json::to_value(substitutes)?,
    });
    serde_json::to_writer(writer, &data)?;
    Ok(())
}

/// Write the result of a complete planning run (assignment, schedule and substitutes).
pub fn write_plan<W: std::io::Write>(
    writer: W,
    assignment: &Outcome<TopicAssignment>,
    quality: f64,
    schedule: &Outcome<Presentation>,
    substitutes: &[SubstitutePool],
) -> Result<()> {
    let data = json!({
        "format": "X-tutorplan-plan",
        "version": "1.0",
        "assignment_status": serde_json::to_value(assignment.status())?,
        "assignment": serde_json::to_value(assignment.items())?,
        "quality": quality,
        "schedule_status": serde_json::to_value(schedule.status())?,
        "presentations": serde_json::to_value(schedule.items())?,
        "substitutes": serde_json::to_value(substitutes)?,
    });
    serde_json::to_writer(writer, &data)?;
    Ok(())
}
