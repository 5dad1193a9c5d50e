//! The population of simulated characters.
//!
//! Characters are stored in a data plugin and addressed by [`CharacterId`]. Everything
//! mutable about a character's health goes through [`ContextHealthExt`]; this module only
//! creates characters and answers queries about them.
use std::collections::BTreeSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::disease::{ContextDiseaseExt, DiseaseId, VaccineId};
use crate::error::OutbreakError;
use crate::log::trace;
use crate::random::ContextRandomExt;
use crate::schedule::EventHandle;
use crate::{define_data_plugin, define_rng};

mod health;
pub use health::{lethality_roll, ContextHealthExt};

define_rng!(PopulationRng);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharacterId(usize);

impl CharacterId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthCondition {
    Healthy,
    Sick,
    Dead,
}

/// Whether a character is out in the city, waiting in a facility line or staying in a facility
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activity {
    #[default]
    Free,
    Queued,
    InFacility,
}

/// A daily lethality roll registered in the scheduler
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LethalityCheck {
    pub second: u32,
    pub handle: EventHandle,
}

#[derive(Clone, Debug)]
pub struct Character {
    id: CharacterId,
    name: String,
    age: u32,
    immune_system: u32,
    pub(crate) health: HealthCondition,
    pub(crate) disease: Option<DiseaseId>,
    pub(crate) vaccines: BTreeSet<VaccineId>,
    pub(crate) diagnosed: bool,
    pub(crate) activity: Activity,
    pub(crate) lethality_check: Option<LethalityCheck>,
    pub(crate) in_treatment: bool,
    pub(crate) infection_eligible: bool,
    pub(crate) cause_of_death: Option<DiseaseId>,
}

impl Character {
    #[must_use]
    pub fn id(&self) -> CharacterId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Percentage subtracted from a disease's transmissibility on exposure
    #[must_use]
    pub fn immune_system(&self) -> u32 {
        self.immune_system
    }

    #[must_use]
    pub fn health(&self) -> HealthCondition {
        self.health
    }

    /// The disease carried right now. `Some` exactly while sick.
    #[must_use]
    pub fn disease(&self) -> Option<DiseaseId> {
        self.disease
    }

    #[must_use]
    pub fn vaccines(&self) -> &BTreeSet<VaccineId> {
        &self.vaccines
    }

    #[must_use]
    pub fn is_diagnosed(&self) -> bool {
        self.diagnosed
    }

    #[must_use]
    pub fn activity(&self) -> Activity {
        self.activity
    }

    #[must_use]
    pub fn lethality_check(&self) -> Option<LethalityCheck> {
        self.lethality_check
    }

    #[must_use]
    pub fn is_in_treatment(&self) -> bool {
        self.in_treatment
    }

    #[must_use]
    pub fn is_infection_eligible(&self) -> bool {
        self.infection_eligible
    }

    #[must_use]
    pub fn cause_of_death(&self) -> Option<DiseaseId> {
        self.cause_of_death
    }
}

/// How randomly generated characters are drawn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopulationParams {
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
    pub age: Range<u32>,
    pub immune_system: Range<u32>,
}

impl Default for PopulationParams {
    fn default() -> Self {
        let names = |list: &[&str]| -> Vec<String> { list.iter().map(ToString::to_string).collect() };
        PopulationParams {
            first_names: names(&["Ana", "Bruno", "Carla", "Diego", "Elisa", "Fabio", "Gabriela", "Hugo"]),
            last_names: names(&["Almeida", "Barbosa", "Costa", "Dias", "Esteves", "Ferreira"]),
            age: 10..60,
            immune_system: 40..80,
        }
    }
}

#[derive(Default)]
struct PopulationData {
    characters: Vec<Character>,
}

define_data_plugin!(PopulationPlugin, PopulationData, PopulationData::default());

pub trait ContextCharacterExt {
    /// Add a healthy, infection-eligible character
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `immune_system` is above 100.
    fn add_character(&mut self, name: &str, age: u32, immune_system: u32)
        -> Result<CharacterId, OutbreakError>;

    /// Add a character with a random name, age and immune system drawn from `params`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a name list or range in `params` is empty.
    fn add_random_character(&mut self, params: &PopulationParams) -> Result<CharacterId, OutbreakError>;

    fn get_character(&self, id: CharacterId) -> Option<&Character>;

    /// # Errors
    ///
    /// Returns `UnknownCharacter` if `id` does not belong to this context.
    fn character(&self, id: CharacterId) -> Result<&Character, OutbreakError>;

    fn population_size(&self) -> usize;
    fn character_ids(&self) -> Vec<CharacterId>;
    fn query_characters(&self, health: HealthCondition) -> Vec<CharacterId>;
    fn count_by_health(&self, health: HealthCondition) -> usize;

    /// True when any vaccine the character took prevents `disease`
    fn is_immune_to(&self, id: CharacterId, disease: DiseaseId) -> bool;
}

fn population(context: &Context) -> &[Character] {
    context
        .get_data(PopulationPlugin)
        .map(|data| data.characters.as_slice())
        .unwrap_or_default()
}

pub(crate) fn character_mut(
    context: &mut Context,
    id: CharacterId,
) -> Result<&mut Character, OutbreakError> {
    context
        .get_data_mut(PopulationPlugin)
        .characters
        .get_mut(id.0)
        .ok_or(OutbreakError::UnknownCharacter(id))
}

impl ContextCharacterExt for Context {
    fn add_character(
        &mut self,
        name: &str,
        age: u32,
        immune_system: u32,
    ) -> Result<CharacterId, OutbreakError> {
        if immune_system > 100 {
            return Err(OutbreakError::ConfigError(format!(
                "immune system of {name} is above 100"
            )));
        }
        let data = self.get_data_mut(PopulationPlugin);
        let id = CharacterId(data.characters.len());
        trace!("adding character {} ({name})", id.0);
        data.characters.push(Character {
            id,
            name: name.to_string(),
            age,
            immune_system,
            health: HealthCondition::Healthy,
            disease: None,
            vaccines: BTreeSet::new(),
            diagnosed: false,
            activity: Activity::Free,
            lethality_check: None,
            in_treatment: false,
            infection_eligible: true,
            cause_of_death: None,
        });
        Ok(id)
    }

    fn add_random_character(&mut self, params: &PopulationParams) -> Result<CharacterId, OutbreakError> {
        if params.first_names.is_empty() || params.last_names.is_empty() {
            return Err(OutbreakError::ConfigError(
                "population needs at least one first and one last name".to_string(),
            ));
        }
        if params.age.is_empty() || params.immune_system.is_empty() {
            return Err(OutbreakError::ConfigError(
                "population ranges must not be empty".to_string(),
            ));
        }
        let first = self.sample_range(PopulationRng, 0..params.first_names.len());
        let last = self.sample_range(PopulationRng, 0..params.last_names.len());
        let age = self.sample_range(PopulationRng, params.age.clone());
        let immune_system = self.sample_range(PopulationRng, params.immune_system.clone());
        let name = format!("{} {}", params.first_names[first], params.last_names[last]);
        self.add_character(&name, age, immune_system)
    }

    fn get_character(&self, id: CharacterId) -> Option<&Character> {
        population(self).get(id.0)
    }

    fn character(&self, id: CharacterId) -> Result<&Character, OutbreakError> {
        self.get_character(id)
            .ok_or(OutbreakError::UnknownCharacter(id))
    }

    fn population_size(&self) -> usize {
        population(self).len()
    }

    fn character_ids(&self) -> Vec<CharacterId> {
        population(self).iter().map(Character::id).collect()
    }

    fn query_characters(&self, health: HealthCondition) -> Vec<CharacterId> {
        population(self)
            .iter()
            .filter(|character| character.health == health)
            .map(Character::id)
            .collect()
    }

    fn count_by_health(&self, health: HealthCondition) -> usize {
        population(self)
            .iter()
            .filter(|character| character.health == health)
            .count()
    }

    fn is_immune_to(&self, id: CharacterId, disease: DiseaseId) -> bool {
        let Some(character) = self.get_character(id) else {
            return false;
        };
        character.vaccines.iter().any(|vaccine| {
            self.get_vaccine(*vaccine)
                .is_some_and(|vaccine| vaccine.prevents == disease)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_characters_are_healthy_and_eligible() {
        let mut context = Context::new();
        let id = context.add_character("Ana Costa", 30, 50).unwrap();
        let character = context.character(id).unwrap();
        assert_eq!(character.name(), "Ana Costa");
        assert_eq!(character.health(), HealthCondition::Healthy);
        assert!(character.disease().is_none());
        assert!(character.is_infection_eligible());
        assert_eq!(character.activity(), Activity::Free);
        assert_eq!(context.population_size(), 1);
    }

    #[test]
    fn unknown_character_is_an_error() {
        let context = Context::new();
        assert!(matches!(
            context.character(CharacterId(3)),
            Err(OutbreakError::UnknownCharacter(CharacterId(3)))
        ));
    }

    #[test]
    fn rejects_immune_system_above_100() {
        let mut context = Context::new();
        assert!(context.add_character("Bruno Dias", 20, 101).is_err());
    }

    #[test]
    fn random_characters_respect_ranges() {
        let mut context = Context::new();
        context.init_random(42);
        let params = PopulationParams::default();
        for _ in 0..50 {
            let id = context.add_random_character(&params).unwrap();
            let character = context.character(id).unwrap();
            assert!(params.age.contains(&character.age()));
            assert!(params.immune_system.contains(&character.immune_system()));
            assert_eq!(character.name().split(' ').count(), 2);
        }
        assert_eq!(context.count_by_health(HealthCondition::Healthy), 50);
    }

    #[test]
    fn random_characters_need_names() {
        let mut context = Context::new();
        context.init_random(42);
        let params = PopulationParams {
            first_names: vec![],
            ..PopulationParams::default()
        };
        assert!(matches!(
            context.add_random_character(&params),
            Err(OutbreakError::ConfigError(_))
        ));
    }

    #[test]
    fn queries_by_health() {
        let mut context = Context::new();
        let a = context.add_character("A", 20, 50).unwrap();
        let b = context.add_character("B", 20, 50).unwrap();
        character_mut(&mut context, b).unwrap().health = HealthCondition::Dead;
        assert_eq!(context.query_characters(HealthCondition::Healthy), vec![a]);
        assert_eq!(context.query_characters(HealthCondition::Dead), vec![b]);
        assert_eq!(context.character_ids(), vec![a, b]);
    }
}
