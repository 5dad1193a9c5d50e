//! The per-character health state machine.
//!
//! ```text
//! Healthy --infect--> Sick --heal--> Healthy
//!                      |
//!                      +--lethality check / die--> Dead
//! ```
//!
//! A sick character owns one every-day event, registered at the second of day it got sick,
//! that rolls for death. The event exists exactly while the character is sick and not
//! suspended for treatment. Every transition is re-validated when it runs: a roll that fires
//! after the character was already healed or killed does nothing.
use crate::characters::{character_mut, Activity, CharacterId, ContextCharacterExt, HealthCondition, LethalityCheck};
use crate::context::Context;
use crate::define_rng;
use crate::disease::{ContextDiseaseExt, DiseaseId, VaccineId};
use crate::error::OutbreakError;
use crate::event::HealthChangeEvent;
use crate::log::{debug, trace, warn};
use crate::random::ContextRandomExt;
use crate::statistics::{record_tally, TallyKind};
use crate::zone::ContextZoneExt;

define_rng!(LethalityRng);

/// A lethality roll kills when `draw` (uniform in `0..100`) is at most `lethality`
#[must_use]
pub fn lethality_roll(lethality: u32, draw: u32) -> bool {
    draw <= lethality
}

fn invalid_transition(
    character: CharacterId,
    from: HealthCondition,
    operation: &'static str,
) -> OutbreakError {
    warn!(
        "refusing to {operation} character {} while {from:?}",
        character.index()
    );
    OutbreakError::InvalidTransition {
        character,
        from,
        operation,
    }
}

fn register_lethality_check(
    context: &mut Context,
    id: CharacterId,
    disease: DiseaseId,
) -> Result<LethalityCheck, OutbreakError> {
    let second = context.current_second();
    let handle = context.register_every_day(second, move |context| {
        context.lethality_check(id, disease)
    })?;
    trace!(
        "lethality check for character {} registered at second {second}",
        id.index()
    );
    Ok(LethalityCheck { second, handle })
}

fn unregister_lethality_check(context: &mut Context, id: CharacterId) -> Result<(), OutbreakError> {
    if let Some(check) = character_mut(context, id)?.lethality_check.take() {
        context.unregister_every_day(check.second, check.handle);
    }
    Ok(())
}

pub trait ContextHealthExt {
    /// Make a healthy character sick with `disease` and anchor its daily lethality check to the
    /// current second of day
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the character is healthy; `UnknownDisease` for a disease
    /// missing from the catalog.
    fn infect(&mut self, id: CharacterId, disease: DiseaseId) -> Result<(), OutbreakError>;

    /// Roll for death. Returns true if the character died.
    ///
    /// Does nothing and returns false unless the character is sick with `disease`, not in
    /// treatment, and the disease is known.
    fn lethality_check(&mut self, id: CharacterId, disease: DiseaseId) -> bool;

    /// # Errors
    ///
    /// `InvalidTransition` unless the character is sick.
    fn die(&mut self, id: CharacterId) -> Result<(), OutbreakError>;

    /// Cure a sick character, optionally granting a vaccine
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the character is sick; `UnknownVaccine` for a vaccine missing
    /// from the catalog.
    fn heal(&mut self, id: CharacterId, vaccine: Option<VaccineId>) -> Result<(), OutbreakError>;

    /// Remove the lethality check while a facility holds the character. Health is unchanged.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the character is sick and not already in treatment.
    fn suspend_for_treatment(&mut self, id: CharacterId) -> Result<(), OutbreakError>;

    /// End a treatment suspension. A character that is still sick gets its lethality check back,
    /// anchored to the current second.
    ///
    /// # Errors
    ///
    /// `UnknownCharacter` only; resuming a character that is not in treatment is a no-op.
    fn resume_from_treatment(&mut self, id: CharacterId) -> Result<(), OutbreakError>;

    /// Add a vaccine to the immunity record. Returns false if it was already there.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for dead characters; `UnknownVaccine` for a vaccine missing from the
    /// catalog.
    fn vaccinate(&mut self, id: CharacterId, vaccine: VaccineId) -> Result<bool, OutbreakError>;

    /// # Errors
    ///
    /// `InvalidTransition` when marking a character that is not sick as diagnosed.
    fn set_diagnosed(&mut self, id: CharacterId, diagnosed: bool) -> Result<(), OutbreakError>;

    /// # Errors
    ///
    /// `UnknownCharacter` only.
    fn set_activity(&mut self, id: CharacterId, activity: Activity) -> Result<(), OutbreakError>;

    /// # Errors
    ///
    /// `UnknownCharacter` only.
    fn set_infection_eligible(&mut self, id: CharacterId, eligible: bool) -> Result<(), OutbreakError>;
}

impl ContextHealthExt for Context {
    fn infect(&mut self, id: CharacterId, disease: DiseaseId) -> Result<(), OutbreakError> {
        let health = self.character(id)?.health;
        if health != HealthCondition::Healthy {
            return Err(invalid_transition(id, health, "infect"));
        }
        if self.get_disease(disease).is_none() {
            return Err(OutbreakError::UnknownDisease(format!("{disease:?}")));
        }

        let check = register_lethality_check(self, id, disease)?;
        let character = character_mut(self, id)?;
        character.health = HealthCondition::Sick;
        character.disease = Some(disease);
        character.diagnosed = false;
        character.lethality_check = Some(check);
        debug!(
            "character {} got sick with disease {} at second {}",
            id.index(),
            disease.index(),
            check.second
        );

        record_tally(self, TallyKind::Infected);
        self.emit_event(HealthChangeEvent {
            character: id,
            previous: HealthCondition::Healthy,
            current: HealthCondition::Sick,
            disease: Some(disease),
        });
        Ok(())
    }

    fn lethality_check(&mut self, id: CharacterId, disease: DiseaseId) -> bool {
        let Some(character) = self.get_character(id) else {
            return false;
        };
        if character.health != HealthCondition::Sick
            || character.disease != Some(disease)
            || character.in_treatment
        {
            trace!("skipping stale lethality check for character {}", id.index());
            return false;
        }
        let Some(lethality) = self.get_disease(disease).map(|disease| disease.lethality) else {
            return false;
        };

        let draw = self.sample_range(LethalityRng, 0..100);
        if !lethality_roll(lethality, draw) {
            trace!(
                "character {} survived the day (draw {draw}, lethality {lethality})",
                id.index()
            );
            return false;
        }
        self.die(id).is_ok()
    }

    fn die(&mut self, id: CharacterId) -> Result<(), OutbreakError> {
        let health = self.character(id)?.health;
        if health != HealthCondition::Sick {
            return Err(invalid_transition(id, health, "kill"));
        }

        unregister_lethality_check(self, id)?;
        let character = character_mut(self, id)?;
        let disease = character.disease.take();
        character.health = HealthCondition::Dead;
        character.cause_of_death = disease;
        character.diagnosed = false;
        character.in_treatment = false;
        character.activity = Activity::Free;
        debug!("character {} died", id.index());

        if let Some(disease) = disease {
            self.add_corpse_zone(id, disease)?;
        }
        record_tally(self, TallyKind::Died);
        self.emit_event(HealthChangeEvent {
            character: id,
            previous: HealthCondition::Sick,
            current: HealthCondition::Dead,
            disease,
        });
        Ok(())
    }

    fn heal(&mut self, id: CharacterId, vaccine: Option<VaccineId>) -> Result<(), OutbreakError> {
        let health = self.character(id)?.health;
        if health != HealthCondition::Sick {
            return Err(invalid_transition(id, health, "heal"));
        }
        if let Some(vaccine) = vaccine {
            if self.get_vaccine(vaccine).is_none() {
                return Err(OutbreakError::UnknownVaccine(format!("{vaccine:?}")));
            }
        }

        unregister_lethality_check(self, id)?;
        let character = character_mut(self, id)?;
        let disease = character.disease.take();
        character.health = HealthCondition::Healthy;
        character.diagnosed = false;
        character.in_treatment = false;
        if let Some(vaccine) = vaccine {
            character.vaccines.insert(vaccine);
        }
        debug!("character {} was healed", id.index());

        record_tally(self, TallyKind::Healed);
        self.emit_event(HealthChangeEvent {
            character: id,
            previous: HealthCondition::Sick,
            current: HealthCondition::Healthy,
            disease,
        });
        Ok(())
    }

    fn suspend_for_treatment(&mut self, id: CharacterId) -> Result<(), OutbreakError> {
        let character = self.character(id)?;
        if character.health != HealthCondition::Sick || character.in_treatment {
            return Err(invalid_transition(id, character.health, "suspend"));
        }
        unregister_lethality_check(self, id)?;
        character_mut(self, id)?.in_treatment = true;
        trace!("lethality check of character {} suspended", id.index());
        Ok(())
    }

    fn resume_from_treatment(&mut self, id: CharacterId) -> Result<(), OutbreakError> {
        let character = self.character(id)?;
        if !character.in_treatment {
            return Ok(());
        }
        let disease = character.disease;
        let character = character_mut(self, id)?;
        character.in_treatment = false;
        if let Some(disease) = disease {
            let check = register_lethality_check(self, id, disease)?;
            character_mut(self, id)?.lethality_check = Some(check);
        }
        Ok(())
    }

    fn vaccinate(&mut self, id: CharacterId, vaccine: VaccineId) -> Result<bool, OutbreakError> {
        let health = self.character(id)?.health;
        if health == HealthCondition::Dead {
            return Err(invalid_transition(id, health, "vaccinate"));
        }
        if self.get_vaccine(vaccine).is_none() {
            return Err(OutbreakError::UnknownVaccine(format!("{vaccine:?}")));
        }
        let added = character_mut(self, id)?.vaccines.insert(vaccine);
        if added {
            debug!("character {} took vaccine {}", id.index(), vaccine.index());
            record_tally(self, TallyKind::Vaccinated);
        }
        Ok(added)
    }

    fn set_diagnosed(&mut self, id: CharacterId, diagnosed: bool) -> Result<(), OutbreakError> {
        let health = self.character(id)?.health;
        if diagnosed && health != HealthCondition::Sick {
            return Err(invalid_transition(id, health, "diagnose"));
        }
        character_mut(self, id)?.diagnosed = diagnosed;
        Ok(())
    }

    fn set_activity(&mut self, id: CharacterId, activity: Activity) -> Result<(), OutbreakError> {
        character_mut(self, id)?.activity = activity;
        Ok(())
    }

    fn set_infection_eligible(&mut self, id: CharacterId, eligible: bool) -> Result<(), OutbreakError> {
        character_mut(self, id)?.infection_eligible = eligible;
        Ok(())
    }
}
