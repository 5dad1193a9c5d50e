//! The transmission model shared by zone exposure and character contact.
//!
//! A transmission attempt is decided in four steps:
//!
//! 1. `exposure = transmissibility - immune_system`; nothing happens if it is not positive.
//! 2. The daily cap on successful transmissions is checked.
//! 3. A victim holding a vaccine against the disease is never infected.
//! 4. A draw uniform in `0..100` infects when it is at most `exposure`.
//!
//! [`evaluate_transmission`] is the pure decision; [`ContextTransmissionExt::try_transmit`]
//! performs the draw and applies the result.
use serde::{Deserialize, Serialize};

use crate::characters::{Activity, CharacterId, ContextCharacterExt, ContextHealthExt, HealthCondition};
use crate::context::Context;
use crate::disease::{ContextDiseaseExt, DiseaseId};
use crate::error::OutbreakError;
use crate::event::{TransmissionEvent, TransmissionSource};
use crate::log::{debug, trace};
use crate::random::ContextRandomExt;
use crate::{define_data_plugin, define_rng};

define_rng!(TransmissionRng);

/// How many successful transmissions are allowed per simulated day
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionCap {
    /// At most as many transmissions as the current day number.
    #[default]
    DayNumber,
    Fixed(u32),
    Unlimited,
}

impl TransmissionCap {
    #[must_use]
    pub fn is_reached(self, daily_counter: u32, current_day: u32) -> bool {
        match self {
            TransmissionCap::DayNumber => daily_counter >= current_day,
            TransmissionCap::Fixed(cap) => daily_counter >= cap,
            TransmissionCap::Unlimited => false,
        }
    }
}

/// Everything the decision depends on besides the random draw
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransmissionInput {
    pub transmissibility: u32,
    pub immune_system: u32,
    pub vaccinated: bool,
    pub daily_counter: u32,
    pub current_day: u32,
    pub cap: TransmissionCap,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransmissionDecision {
    /// The immune system fully offsets the exposure.
    Resisted,
    CapReached,
    /// The victim is vaccinated against the disease.
    Immune,
    /// The draw came in above the exposure.
    Escaped,
    Infected,
}

impl TransmissionDecision {
    #[must_use]
    pub fn is_infected(self) -> bool {
        self == TransmissionDecision::Infected
    }
}

#[must_use]
pub fn exposure(transmissibility: u32, immune_system: u32) -> i64 {
    i64::from(transmissibility) - i64::from(immune_system)
}

/// Steps 1 to 3. Returns the exposure when a draw is needed, or the final decision otherwise.
///
/// # Errors
///
/// The `Err` variant carries a decision that needs no draw; it is not a failure.
pub fn screen_transmission(input: &TransmissionInput) -> Result<u32, TransmissionDecision> {
    let exposure = exposure(input.transmissibility, input.immune_system);
    if exposure <= 0 {
        return Err(TransmissionDecision::Resisted);
    }
    if input.cap.is_reached(input.daily_counter, input.current_day) {
        return Err(TransmissionDecision::CapReached);
    }
    if input.vaccinated {
        return Err(TransmissionDecision::Immune);
    }
    // Bounded by the transmissibility, itself at most 100.
    Ok(u32::try_from(exposure).unwrap_or(u32::MAX))
}

/// Decide a transmission attempt given a draw in `0..100`
#[must_use]
pub fn evaluate_transmission(input: &TransmissionInput, draw: u32) -> TransmissionDecision {
    match screen_transmission(input) {
        Ok(exposure) if draw <= exposure => TransmissionDecision::Infected,
        Ok(_) => TransmissionDecision::Escaped,
        Err(decision) => decision,
    }
}

struct TransmissionSettings {
    cap: TransmissionCap,
}

define_data_plugin!(
    TransmissionPlugin,
    TransmissionSettings,
    TransmissionSettings {
        cap: TransmissionCap::default(),
    }
);

pub trait ContextTransmissionExt {
    fn set_transmission_cap(&mut self, cap: TransmissionCap);
    fn transmission_cap(&self) -> TransmissionCap;

    /// Attempt to pass `disease` to `victim`. On success the victim is infected, the daily
    /// counter goes up and a `TransmissionEvent` is emitted.
    ///
    /// Victims that are not healthy, not eligible for infection, or in treatment are skipped
    /// and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// `UnknownCharacter` or `UnknownDisease` for ids missing from the context.
    fn try_transmit(
        &mut self,
        disease: DiseaseId,
        victim: CharacterId,
        source: TransmissionSource,
    ) -> Result<bool, OutbreakError>;

    /// Two characters met. If exactly one of them is sick, it may infect the other with its
    /// disease.
    ///
    /// # Errors
    ///
    /// `UnknownCharacter` for ids missing from the context.
    fn contact(&mut self, first: CharacterId, second: CharacterId) -> Result<bool, OutbreakError>;
}

impl ContextTransmissionExt for Context {
    fn set_transmission_cap(&mut self, cap: TransmissionCap) {
        self.get_data_mut(TransmissionPlugin).cap = cap;
    }

    fn transmission_cap(&self) -> TransmissionCap {
        self.get_data(TransmissionPlugin)
            .map_or_else(TransmissionCap::default, |settings| settings.cap)
    }

    fn try_transmit(
        &mut self,
        disease: DiseaseId,
        victim: CharacterId,
        source: TransmissionSource,
    ) -> Result<bool, OutbreakError> {
        let transmissibility = self
            .get_disease(disease)
            .ok_or_else(|| OutbreakError::UnknownDisease(format!("{disease:?}")))?
            .transmissibility;
        let character = self.character(victim)?;
        if character.health() != HealthCondition::Healthy
            || !character.is_infection_eligible()
            || character.is_in_treatment()
            || character.activity() == Activity::InFacility
        {
            return Ok(false);
        }

        let input = TransmissionInput {
            transmissibility,
            immune_system: character.immune_system(),
            vaccinated: self.is_immune_to(victim, disease),
            daily_counter: self.daily_transmissions(),
            current_day: self.current_day(),
            cap: self.transmission_cap(),
        };
        let decision = match screen_transmission(&input) {
            Ok(_) => {
                let draw = self.sample_range(TransmissionRng, 0..100);
                evaluate_transmission(&input, draw)
            }
            Err(decision) => decision,
        };
        trace!(
            "transmission of disease {} to character {}: {decision:?}",
            disease.index(),
            victim.index()
        );
        if !decision.is_infected() {
            return Ok(false);
        }

        self.infect(victim, disease)?;
        self.record_transmission();
        debug!(
            "character {} infected by {source:?} ({} today)",
            victim.index(),
            self.daily_transmissions()
        );
        self.emit_event(TransmissionEvent {
            victim,
            disease,
            source,
        });
        Ok(true)
    }

    fn contact(&mut self, first: CharacterId, second: CharacterId) -> Result<bool, OutbreakError> {
        let a = self.character(first)?;
        let b = self.character(second)?;
        let (carrier, victim) = match (a.health(), b.health()) {
            (HealthCondition::Sick, HealthCondition::Healthy) => (a, b),
            (HealthCondition::Healthy, HealthCondition::Sick) => (b, a),
            _ => return Ok(false),
        };
        if carrier.is_in_treatment() || carrier.activity() == Activity::InFacility {
            return Ok(false);
        }
        let Some(disease) = carrier.disease() else {
            return Ok(false);
        };
        let (carrier, victim) = (carrier.id(), victim.id());
        self.try_transmit(disease, victim, TransmissionSource::Contact(carrier))
    }
}
