use std::fmt::{self, Debug, Display};
use std::io;

use crate::characters::{CharacterId, HealthCondition};
use crate::disease::VaccineId;

/// Provides `OutbreakError` and maps other errors to it
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum OutbreakError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// A second-of-day outside `[0, day_length)` was used to schedule an event
    SecondOutOfRange {
        second: u32,
        day_length: u32,
    },
    /// A one-shot event was scheduled for an instant the clock already passed
    EventInPast {
        day: u32,
        second: u32,
    },
    /// A health transition was requested from a state that does not allow it
    InvalidTransition {
        character: CharacterId,
        from: HealthCondition,
        operation: &'static str,
    },
    UnknownCharacter(CharacterId),
    UnknownDisease(String),
    UnknownVaccine(String),
    UnknownZone(usize),
    UnknownFacility(usize),
    /// Facility parameters that cannot run a stay
    InvalidFacility(String),
    /// The vaccine stock has no dose left to give
    NoVaccineDose(VaccineId),
    ConfigError(String),
    ReportError(String),
    OutbreakError(String),
}

impl From<io::Error> for OutbreakError {
    fn from(error: io::Error) -> Self {
        OutbreakError::IoError(error)
    }
}

impl From<serde_json::Error> for OutbreakError {
    fn from(error: serde_json::Error) -> Self {
        OutbreakError::JsonError(error)
    }
}

impl From<csv::Error> for OutbreakError {
    fn from(error: csv::Error) -> Self {
        OutbreakError::CSVError(error)
    }
}

impl From<String> for OutbreakError {
    fn from(error: String) -> Self {
        OutbreakError::OutbreakError(error)
    }
}

impl From<&str> for OutbreakError {
    fn from(error: &str) -> Self {
        OutbreakError::OutbreakError(error.to_string())
    }
}

impl std::error::Error for OutbreakError {}

impl Display for OutbreakError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutbreakError::SecondOutOfRange { second, day_length } => write!(
                f,
                "Error: second {second} is outside of a {day_length}-second day"
            )?,
            OutbreakError::EventInPast { day, second } => {
                write!(f, "Error: day {day} second {second} is in the past")?;
            }
            OutbreakError::InvalidTransition {
                character,
                from,
                operation,
            } => write!(
                f,
                "Error: cannot {operation} character {} while {from:?}",
                character.index()
            )?,
            _ => write!(f, "Error: {self:?}")?,
        }
        Ok(())
    }
}
