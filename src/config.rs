//! Scenario configuration.
//!
//! A [`SimulationConfig`] describes a whole game: clock, population, treasury, disease and
//! vaccine catalog, facilities, zones, patients zero and the random encounter rates. It is read
//! from JSON; every field is optional and falls back to the default scenario.
//!
//! ```json
//! {
//!   "day_length": 5000,
//!   "base_interval": "250ms",
//!   "population": { "size": 30 },
//!   "diseases": [{ "name": "Flu", "transmissibility": 70, "lethality": 5 }],
//!   "vaccines": [{ "name": "Flu vaccine", "prevents": "Flu" }],
//!   "patients_zero": [{ "disease": "Flu", "count": 2 }]
//! }
//! ```
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::characters::{CharacterId, ContextCharacterExt, ContextHealthExt, HealthCondition, PopulationParams};
use crate::clock::{SimulationSpeed, VirtualClock, DEFAULT_DAY_LENGTH};
use crate::context::Context;
use crate::define_rng;
use crate::disease::{ContextDiseaseExt, DiseaseDefinition};
use crate::economy::{ContextEconomyExt, EconomyParams};
use crate::encounters::{ContextEncountersExt, EncounterParams};
use crate::error::OutbreakError;
use crate::facility::{ContextFacilityExt, FacilityKind, FacilityParams};
use crate::log::info;
use crate::random::ContextRandomExt;
use crate::research::ContextResearchExt;
use crate::transmission::{ContextTransmissionExt, TransmissionCap};
use crate::zone::ContextZoneExt;

define_rng!(SeedingRng);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopulationConfig {
    pub size: usize,
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
    pub age: Range<u32>,
    pub immune_system: Range<u32>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        let params = PopulationParams::default();
        PopulationConfig {
            size: 20,
            first_names: params.first_names,
            last_names: params.last_names,
            age: params.age,
            immune_system: params.immune_system,
        }
    }
}

impl PopulationConfig {
    #[must_use]
    pub fn params(&self) -> PopulationParams {
        PopulationParams {
            first_names: self.first_names.clone(),
            last_names: self.last_names.clone(),
            age: self.age.clone(),
            immune_system: self.immune_system.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaccineConfig {
    pub name: String,
    /// Name of the disease the vaccine prevents
    pub prevents: String,
    /// Doses in stock at the start of the game
    #[serde(default)]
    pub doses: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacilityConfig {
    pub name: String,
    pub kind: FacilityKind,
    /// Overrides the defaults of the facility's kind
    #[serde(default)]
    pub params: Option<FacilityParams>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneConfig {
    pub name: String,
    pub disease: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientsZeroConfig {
    pub disease: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub day_length: u32,
    pub start_day: u32,
    /// Defaults to midday
    pub start_second: Option<u32>,
    /// Real time per simulated second at normal speed, e.g. `"1s"` or `"250ms"`
    pub base_interval: String,
    pub speed: SimulationSpeed,
    pub population: PopulationConfig,
    pub economy: EconomyParams,
    pub diseases: Vec<DiseaseDefinition>,
    pub vaccines: Vec<VaccineConfig>,
    pub facilities: Vec<FacilityConfig>,
    pub zones: Vec<ZoneConfig>,
    pub patients_zero: Vec<PatientsZeroConfig>,
    pub transmission_cap: TransmissionCap,
    pub encounters: EncounterParams,
    /// End the run as soon as the game is won or lost
    pub stop_on_outcome: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            day_length: DEFAULT_DAY_LENGTH,
            start_day: 1,
            start_second: None,
            base_interval: "1s".to_string(),
            speed: SimulationSpeed::Normal,
            population: PopulationConfig::default(),
            economy: EconomyParams::default(),
            diseases: vec![DiseaseDefinition {
                name: "Flu".to_string(),
                transmissibility: 70,
                lethality: 5,
                symptoms: vec!["Fever".to_string(), "Cough".to_string()],
            }],
            vaccines: vec![VaccineConfig {
                name: "Flu vaccine".to_string(),
                prevents: "Flu".to_string(),
                doses: 0,
            }],
            facilities: vec![
                FacilityConfig {
                    name: "Hospital".to_string(),
                    kind: FacilityKind::Hospital,
                    params: None,
                },
                FacilityConfig {
                    name: "Laboratory".to_string(),
                    kind: FacilityKind::Laboratory,
                    params: None,
                },
                FacilityConfig {
                    name: "Health center".to_string(),
                    kind: FacilityKind::HealthCenter,
                    params: None,
                },
            ],
            zones: vec![ZoneConfig {
                name: "Market".to_string(),
                disease: "Flu".to_string(),
            }],
            patients_zero: vec![PatientsZeroConfig {
                disease: "Flu".to_string(),
                count: 1,
            }],
            transmission_cap: TransmissionCap::default(),
            encounters: EncounterParams::default(),
            stop_on_outcome: true,
        }
    }
}

fn config_error(message: impl Into<String>) -> OutbreakError {
    OutbreakError::ConfigError(message.into())
}

impl SimulationConfig {
    /// Read a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// `IoError` if the file cannot be read, `JsonError` if it does not parse and `ConfigError`
    /// if it parses but is inconsistent.
    pub fn from_file(path: &Path) -> Result<SimulationConfig, OutbreakError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a configuration from a JSON string
    ///
    /// # Errors
    ///
    /// As [`SimulationConfig::from_file`], minus the I/O.
    pub fn from_json(content: &str) -> Result<SimulationConfig, OutbreakError> {
        let config: SimulationConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn start_second(&self) -> u32 {
        self.start_second.unwrap_or(self.day_length / 2)
    }

    /// # Errors
    ///
    /// `ConfigError` if `base_interval` is not a humantime duration.
    pub fn base_interval(&self) -> Result<Duration, OutbreakError> {
        humantime::parse_duration(&self.base_interval)
            .map_err(|e| config_error(format!("invalid base_interval {:?}: {e}", self.base_interval)))
    }

    /// Check what serde cannot: ranges, probabilities and references between sections
    ///
    /// # Errors
    ///
    /// `ConfigError` describing the first problem found.
    pub fn validate(&self) -> Result<(), OutbreakError> {
        if self.day_length == 0 {
            return Err(config_error("day_length must be positive"));
        }
        if self.start_day == 0 || self.start_second() >= self.day_length {
            return Err(config_error("the start instant is outside the clock"));
        }
        self.base_interval()?;
        let population = &self.population;
        if population.size > 0 && (population.first_names.is_empty() || population.last_names.is_empty()) {
            return Err(config_error("population needs first and last names"));
        }
        if population.age.is_empty() || population.immune_system.is_empty() {
            return Err(config_error("population ranges must not be empty"));
        }
        for probability in [self.encounters.contact_probability, self.encounters.zone_probability] {
            if !(0.0..=1.0).contains(&probability) {
                return Err(config_error(format!("{probability} is not a probability")));
            }
        }
        let known = |name: &str| self.diseases.iter().any(|disease| disease.name == name);
        let references = self
            .vaccines
            .iter()
            .map(|vaccine| &vaccine.prevents)
            .chain(self.zones.iter().map(|zone| &zone.disease))
            .chain(self.patients_zero.iter().map(|patients| &patients.disease));
        for disease in references {
            if !known(disease) {
                return Err(config_error(format!("unknown disease {disease}")));
            }
        }
        let infected: usize = self.patients_zero.iter().map(|patients| patients.count).sum();
        if infected > population.size {
            return Err(config_error(format!(
                "{infected} patients zero in a population of {}",
                population.size
            )));
        }
        for facility in &self.facilities {
            if facility.params.is_some_and(|params| params.treatment_days == 0) {
                return Err(config_error(format!("{} treats in zero days", facility.name)));
            }
        }
        Ok(())
    }
}

// Infect `count` random healthy characters.
fn seed_patients_zero(context: &mut Context, disease: &str, count: usize) -> Result<Vec<CharacterId>, OutbreakError> {
    let disease = context
        .find_disease(disease)
        .ok_or_else(|| OutbreakError::UnknownDisease(disease.to_string()))?;
    let mut healthy = context.query_characters(HealthCondition::Healthy);
    let mut infected = Vec::with_capacity(count);
    for _ in 0..count {
        if healthy.is_empty() {
            break;
        }
        let index = context.sample_range(SeedingRng, 0..healthy.len());
        let id = healthy.swap_remove(index);
        context.infect(id, disease)?;
        infected.push(id);
    }
    Ok(infected)
}

impl Context {
    /// Build a ready-to-run context from a configuration. The random number generator is
    /// seeded with `seed` before the population is drawn.
    ///
    /// # Errors
    ///
    /// `ConfigError` for an inconsistent configuration and any error raised while adding the
    /// catalog, facilities, zones or population.
    pub fn from_config(config: &SimulationConfig, seed: u64) -> Result<Context, OutbreakError> {
        config.validate()?;
        let clock = VirtualClock::starting_at(config.day_length, config.start_day, config.start_second())?
            .with_base_interval(config.base_interval()?);
        let mut context = Context::with_clock(clock);
        context.set_speed(config.speed);
        context.init_random(seed);
        context.init_economy(config.economy);
        context.set_transmission_cap(config.transmission_cap);

        for disease in &config.diseases {
            context.add_disease(disease.clone())?;
        }
        for vaccine in &config.vaccines {
            let prevents = context
                .find_disease(&vaccine.prevents)
                .ok_or_else(|| OutbreakError::UnknownDisease(vaccine.prevents.clone()))?;
            let id = context.add_vaccine(&vaccine.name, prevents)?;
            if vaccine.doses > 0 {
                context.add_vaccine_doses(id, vaccine.doses);
            }
        }
        for facility in &config.facilities {
            match facility.params {
                Some(params) => context.add_facility_with(&facility.name, facility.kind, params)?,
                None => context.add_facility(&facility.name, facility.kind),
            };
        }
        for zone in &config.zones {
            let disease = context
                .find_disease(&zone.disease)
                .ok_or_else(|| OutbreakError::UnknownDisease(zone.disease.clone()))?;
            context.add_zone(&zone.name, disease)?;
        }

        let params = config.population.params();
        for _ in 0..config.population.size {
            context.add_random_character(&params)?;
        }
        for patients in &config.patients_zero {
            seed_patients_zero(&mut context, &patients.disease, patients.count)?;
        }
        context.init_encounters(config.encounters);

        info!(
            "scenario ready: {} characters, {} diseases, {} facilities",
            context.population_size(),
            config.diseases.len(),
            config.facilities.len()
        );
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn data_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/data")
            .join(name)
    }

    #[test]
    fn default_scenario_is_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.start_second(), 2500);
        assert_eq!(config.base_interval().unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = SimulationConfig::from_json(r#"{ "day_length": 100 }"#).unwrap();
        assert_eq!(config.day_length, 100);
        assert_eq!(config.start_second(), 50);
        assert_eq!(config.economy.starting_money, 400);
        assert_eq!(config.population.size, 20);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            SimulationConfig::from_json(r#"{ "day_lenght": 100 }"#),
            Err(OutbreakError::JsonError(_))
        ));
    }

    #[test]
    fn dangling_disease_names_are_rejected() {
        let result = SimulationConfig::from_json(r#"{ "zones": [{ "name": "Park", "disease": "Plague" }] }"#);
        assert!(matches!(result, Err(OutbreakError::ConfigError(message)) if message.contains("Plague")));
    }

    #[test]
    fn bad_intervals_and_probabilities_are_rejected() {
        assert!(SimulationConfig::from_json(r#"{ "base_interval": "soon" }"#).is_err());
        assert!(SimulationConfig::from_json(r#"{ "encounters": { "contact_probability": 1.5 } }"#).is_err());
        assert!(SimulationConfig::from_json(r#"{ "start_second": 6000 }"#).is_err());
    }

    #[test]
    fn loads_a_scenario_file() {
        let config = SimulationConfig::from_file(&data_path("small_town.json")).unwrap();
        assert_eq!(config.day_length, 100);
        assert_eq!(config.population.size, 10);
        assert_eq!(config.transmission_cap, TransmissionCap::Unlimited);
        assert_eq!(config.base_interval().unwrap(), Duration::from_millis(10));
    }

    #[test]
    fn builds_the_context() {
        let config = SimulationConfig::from_file(&data_path("small_town.json")).unwrap();
        let context = Context::from_config(&config, 8).unwrap();
        assert_eq!(context.population_size(), 10);
        assert_eq!(context.count_by_health(HealthCondition::Sick), 2);
        assert_eq!(context.clock().now(), (1, 50));
        assert_eq!(context.facility_ids().len(), 3);
        assert_eq!(context.active_zones().len(), 1);
        assert_eq!(context.money(), 400);
        assert_eq!(context.transmission_cap(), TransmissionCap::Unlimited);
        let shot = context.find_vaccine("Flu vaccine").unwrap();
        assert_eq!(context.vaccine_doses(shot), 2);
    }

    #[test]
    fn same_seed_same_population() {
        let config = SimulationConfig::from_file(&data_path("small_town.json")).unwrap();
        let first = Context::from_config(&config, 8).unwrap();
        let second = Context::from_config(&config, 8).unwrap();
        assert_eq!(
            first.query_characters(HealthCondition::Sick),
            second.query_characters(HealthCondition::Sick)
        );
        for id in first.character_ids() {
            assert_eq!(
                first.character(id).unwrap().name(),
                second.character(id).unwrap().name()
            );
        }
    }
}
