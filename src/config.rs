//! Run configuration, read from an optional JSON file.
//!
//! Every field has a default, so an empty object `{}` is a valid configuration. The command line
//! interface overrides selected fields afterwards.

use crate::assign::PreferenceWeights;
use crate::former::UnionWeights;
use crate::ilp::SolveLimits;
use crate::schedule::ScheduleSettings;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Formulation used to assign topics and tutors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Integer program (supports tutor balance)
    #[default]
    Ilp,
    /// Min-cost-flow network
    Flow,
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ilp" => Ok(Strategy::Ilp),
            "flow" => Ok(Strategy::Flow),
            other => Err(Error::Config(format!("Unknown assignment strategy '{}'", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentSettings {
    /// Maximum difference of the number of groups between any two tutors
    pub balance_limit: u32,
    pub strategy: Strategy,
    pub weights: PreferenceWeights,
}

impl Default for AssignmentSettings {
    fn default() -> Self {
        AssignmentSettings {
            balance_limit: 2,
            strategy: Strategy::default(),
            weights: PreferenceWeights::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationSettings {
    pub weights: UnionWeights,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Limits passed to every solver invocation
    pub limits: SolveLimits,
    pub assignment: AssignmentSettings,
    pub formation: FormationSettings,
    pub schedule: ScheduleSettings,
}

impl Config {
    /// Parse a configuration from its JSON representation and check its values.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Config> {
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(limit) = self.limits.time_limit {
            if !(limit > 0.0) {
                return Err(Error::Config(format!(
                    "Time limit must be positive, got {}",
                    limit
                )));
            }
        }
        if let Some(gap) = self.limits.gap_tolerance {
            if !(0.0..=1.0).contains(&gap) {
                return Err(Error::Config(format!(
                    "Gap tolerance must be within [0, 1], got {}",
                    gap
                )));
            }
        }
        let weights = &self.assignment.weights;
        if weights
            .ranked
            .iter()
            .chain([weights.category, weights.floor].iter())
            .any(|w| !w.is_finite())
        {
            return Err(Error::Config(String::from(
                "Preference weights must be finite numbers",
            )));
        }
        if self.schedule.max_groups_per_week == 0 {
            return Err(Error::Config(String::from(
                "max_groups_per_week must be at least 1",
            )));
        }
        Ok(())
    }
}
