//! Notifications emitted by the simulation for observers such as the presentation layer,
//! statistics and reports. Subscribe with [`Context::subscribe_to_event`].
//!
//! [`Context::subscribe_to_event`]: crate::context::Context::subscribe_to_event
use crate::characters::{CharacterId, HealthCondition};
use crate::disease::{DiseaseId, VaccineId};
use crate::facility::{FacilityId, FacilityKind};
use crate::statistics::Outcome;

/// Marker for types that can be sent through `Context::emit_event`
pub trait Event: Copy + 'static {}

/// Emitted whenever a character's health changes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HealthChangeEvent {
    pub character: CharacterId,
    pub previous: HealthCondition,
    pub current: HealthCondition,
    pub disease: Option<DiseaseId>,
}
impl Event for HealthChangeEvent {}

/// Where a transmission attempt came from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransmissionSource {
    Zone(usize),
    Contact(CharacterId),
    Direct,
}

/// Emitted after every successful transmission
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransmissionEvent {
    pub victim: CharacterId,
    pub disease: DiseaseId,
    pub source: TransmissionSource,
}
impl Event for TransmissionEvent {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TreatmentStage {
    Queued,
    Admitted,
    Diagnosed,
    Cured,
    Vaccinated,
    Released,
}

/// Emitted as a patient moves through a facility
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TreatmentEvent {
    pub facility: FacilityId,
    pub kind: FacilityKind,
    pub character: CharacterId,
    pub stage: TreatmentStage,
    pub vaccine: Option<VaccineId>,
}
impl Event for TreatmentEvent {}

/// Emitted once, when the game is won or lost
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OutcomeEvent {
    pub outcome: Outcome,
    pub day: u32,
}
impl Event for OutcomeEvent {}
