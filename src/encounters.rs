//! Random encounters standing in for the movement layer.
//!
//! A headless run has no characters walking around the city, so overlaps are drawn at random
//! every simulated second: with `contact_probability` two free, living characters meet, and
//! with `zone_probability` a free, healthy character walks through an active disease zone.
use serde::{Deserialize, Serialize};

use crate::characters::{Activity, CharacterId, ContextCharacterExt, HealthCondition};
use crate::context::Context;
use crate::define_rng;
use crate::error::OutbreakError;
use crate::log::warn;
use crate::random::ContextRandomExt;
use crate::schedule::HookHandle;
use crate::transmission::ContextTransmissionExt;
use crate::zone::ContextZoneExt;

define_rng!(EncounterRng);

/// Per-second encounter probabilities
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncounterParams {
    pub contact_probability: f64,
    pub zone_probability: f64,
}

impl Default for EncounterParams {
    fn default() -> Self {
        EncounterParams {
            contact_probability: 0.01,
            zone_probability: 0.005,
        }
    }
}

// Characters out in the city: alive, not queued and not held by a facility.
fn wandering(context: &Context) -> Vec<CharacterId> {
    context
        .character_ids()
        .into_iter()
        .filter(|id| {
            context.get_character(*id).is_some_and(|character| {
                character.health() != HealthCondition::Dead
                    && character.activity() == Activity::Free
                    && !character.is_in_treatment()
            })
        })
        .collect()
}

fn pick<T: Copy>(context: &Context, items: &[T]) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    Some(items[context.sample_range(EncounterRng, 0..items.len())])
}

fn random_contact(context: &mut Context) -> Result<bool, OutbreakError> {
    let candidates = wandering(context);
    if candidates.len() < 2 {
        return Ok(false);
    }
    let first = context.sample_range(EncounterRng, 0..candidates.len());
    let mut second = context.sample_range(EncounterRng, 0..candidates.len() - 1);
    if second >= first {
        second += 1;
    }
    context.contact(candidates[first], candidates[second])
}

fn random_zone_visit(context: &mut Context) -> Result<bool, OutbreakError> {
    let Some(zone) = pick(context, &context.active_zones()) else {
        return Ok(false);
    };
    let healthy: Vec<CharacterId> = wandering(context)
        .into_iter()
        .filter(|id| {
            context
                .get_character(*id)
                .is_some_and(|character| character.health() == HealthCondition::Healthy)
        })
        .collect();
    let Some(visitor) = pick(context, &healthy) else {
        return Ok(false);
    };
    context.enter_zone(zone, visitor)
}

fn draw_encounters(context: &mut Context, params: EncounterParams) {
    if params.contact_probability > 0.0 && context.sample_bool(EncounterRng, params.contact_probability) {
        if let Err(e) = random_contact(context) {
            warn!("random contact failed: {e}");
        }
    }
    if params.zone_probability > 0.0 && context.sample_bool(EncounterRng, params.zone_probability) {
        if let Err(e) = random_zone_visit(context) {
            warn!("random zone visit failed: {e}");
        }
    }
}

pub trait ContextEncountersExt {
    /// Start drawing random encounters every simulated second. The returned handle stops them
    /// through [`Context::unsubscribe_per_second`].
    fn init_encounters(&mut self, params: EncounterParams) -> HookHandle;
}

impl ContextEncountersExt for Context {
    fn init_encounters(&mut self, params: EncounterParams) -> HookHandle {
        self.subscribe_per_second(move |context| draw_encounters(context, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::ContextHealthExt;
    use crate::clock::VirtualClock;
    use crate::disease::{ContextDiseaseExt, DiseaseDefinition, DiseaseId};
    use crate::transmission::TransmissionCap;

    fn setup(seed: u64) -> (Context, DiseaseId) {
        let mut context = Context::with_clock(VirtualClock::starting_at(100, 1, 0).unwrap());
        context.init_random(seed);
        context.set_transmission_cap(TransmissionCap::Unlimited);
        let flu = context
            .add_disease(DiseaseDefinition {
                name: "Flu".to_string(),
                transmissibility: 100,
                lethality: 0,
                symptoms: vec![],
            })
            .unwrap();
        (context, flu)
    }

    #[test]
    fn certain_contacts_spread_the_disease() {
        let (mut context, flu) = setup(3);
        let sick = context.add_character("A", 20, 0).unwrap();
        let healthy = context.add_character("B", 20, 0).unwrap();
        context.infect(sick, flu).unwrap();
        context.init_encounters(EncounterParams {
            contact_probability: 1.0,
            zone_probability: 0.0,
        });
        context.execute_until(1, 1);
        assert_eq!(context.character(healthy).unwrap().health(), HealthCondition::Sick);
    }

    #[test]
    fn zone_visits_only_use_active_zones() {
        let (mut context, flu) = setup(3);
        let zone = context.add_zone("Market", flu).unwrap();
        let visitor = context.add_character("A", 20, 0).unwrap();
        let dead = context.add_character("B", 20, 0).unwrap();
        context.infect(dead, flu).unwrap();
        context.die(dead).unwrap();
        context.collect_corpse(dead).unwrap();
        assert_eq!(context.active_zones(), vec![zone]);

        context.init_encounters(EncounterParams {
            contact_probability: 0.0,
            zone_probability: 1.0,
        });
        context.execute_until(1, 1);
        assert_eq!(context.character(visitor).unwrap().disease(), Some(flu));
    }

    #[test]
    fn queued_and_treated_characters_stay_out() {
        let (mut context, flu) = setup(3);
        let sick = context.add_character("A", 20, 0).unwrap();
        let healthy = context.add_character("B", 20, 0).unwrap();
        context.infect(sick, flu).unwrap();
        context.suspend_for_treatment(sick).unwrap();
        context.set_activity(healthy, Activity::Queued).unwrap();
        context.init_encounters(EncounterParams {
            contact_probability: 1.0,
            zone_probability: 1.0,
        });
        context.execute_until(1, 50);
        assert_eq!(context.character(healthy).unwrap().health(), HealthCondition::Healthy);
    }

    #[test]
    fn unsubscribing_stops_encounters() {
        let (mut context, flu) = setup(3);
        let sick = context.add_character("A", 20, 0).unwrap();
        let healthy = context.add_character("B", 20, 0).unwrap();
        context.infect(sick, flu).unwrap();
        let handle = context.init_encounters(EncounterParams {
            contact_probability: 1.0,
            zone_probability: 0.0,
        });
        assert!(context.unsubscribe_per_second(handle));
        context.execute_until(1, 50);
        assert_eq!(context.character(healthy).unwrap().health(), HealthCondition::Healthy);
    }
}
