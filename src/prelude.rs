pub use crate::characters::{
    Activity, Character, CharacterId, ContextCharacterExt, ContextHealthExt, HealthCondition,
    PopulationParams,
};
pub use crate::clock::{SimulationSpeed, VirtualClock};
pub use crate::config::SimulationConfig;
pub use crate::context::{Context, ExecutionStatus};
pub use crate::disease::{ContextDiseaseExt, DiseaseDefinition, DiseaseId, VaccineId};
pub use crate::economy::{ContextEconomyExt, EconomyParams};
pub use crate::encounters::{ContextEncountersExt, EncounterParams};
pub use crate::error::OutbreakError;
pub use crate::event::{
    HealthChangeEvent, OutcomeEvent, TransmissionEvent, TransmissionSource, TreatmentEvent,
    TreatmentStage,
};
pub use crate::facility::{Admission, ContextFacilityExt, FacilityId, FacilityKind, FacilityParams};
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::random::ContextRandomExt;
pub use crate::report::{ContextReportExt, DailySummary, Report};
pub use crate::research::ContextResearchExt;
pub use crate::statistics::{ContextStatisticsExt, DailyTally, Outcome};
pub use crate::transmission::{ContextTransmissionExt, TransmissionCap};
pub use crate::zone::{ContextZoneExt, ZoneId};
pub use crate::{define_data_plugin, define_report, define_rng};
