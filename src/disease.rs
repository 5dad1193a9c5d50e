//! The catalog of diseases and vaccines known to a simulation.
//!
//! Definitions are immutable once added; characters, zones and facilities refer to them by
//! [`DiseaseId`] and [`VaccineId`].
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::OutbreakError;
use crate::log::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiseaseId(pub(crate) usize);

impl DiseaseId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VaccineId(pub(crate) usize);

impl VaccineId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disease {
    pub id: DiseaseId,
    pub name: String,
    /// Percentage in `0..=100`, offset by the victim's immune system.
    pub transmissibility: u32,
    /// Chance in percent of dying at each daily check.
    pub lethality: u32,
    pub symptoms: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vaccine {
    pub id: VaccineId,
    pub name: String,
    pub prevents: DiseaseId,
}

/// Parameters of a new disease, as found in configuration files
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiseaseDefinition {
    pub name: String,
    pub transmissibility: u32,
    pub lethality: u32,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

struct DiseaseCatalog {
    diseases: Vec<Disease>,
    vaccines: Vec<Vaccine>,
}

define_data_plugin!(
    DiseasePlugin,
    DiseaseCatalog,
    DiseaseCatalog {
        diseases: Vec::new(),
        vaccines: Vec::new(),
    }
);

pub trait ContextDiseaseExt {
    /// Add a disease to the catalog
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a percentage is above 100 or the name is already taken.
    fn add_disease(&mut self, definition: DiseaseDefinition) -> Result<DiseaseId, OutbreakError>;

    /// Add a vaccine granting immunity against `prevents`
    ///
    /// # Errors
    ///
    /// Returns `UnknownDisease` if `prevents` is not in the catalog.
    fn add_vaccine(&mut self, name: &str, prevents: DiseaseId) -> Result<VaccineId, OutbreakError>;

    fn get_disease(&self, id: DiseaseId) -> Option<&Disease>;
    fn get_vaccine(&self, id: VaccineId) -> Option<&Vaccine>;
    fn find_disease(&self, name: &str) -> Option<DiseaseId>;
    fn find_vaccine(&self, name: &str) -> Option<VaccineId>;

    /// The first vaccine that prevents `disease`, if any
    fn vaccine_for(&self, disease: DiseaseId) -> Option<VaccineId>;

    fn disease_ids(&self) -> Vec<DiseaseId>;
    fn vaccine_ids(&self) -> Vec<VaccineId>;
}

fn catalog(context: &Context) -> Option<&DiseaseCatalog> {
    context.get_data(DiseasePlugin)
}

impl ContextDiseaseExt for Context {
    fn add_disease(&mut self, definition: DiseaseDefinition) -> Result<DiseaseId, OutbreakError> {
        if definition.transmissibility > 100 || definition.lethality > 100 {
            return Err(OutbreakError::ConfigError(format!(
                "disease {} has a percentage above 100",
                definition.name
            )));
        }
        if self.find_disease(&definition.name).is_some() {
            return Err(OutbreakError::ConfigError(format!(
                "disease {} is defined twice",
                definition.name
            )));
        }
        let catalog = self.get_data_mut(DiseasePlugin);
        let id = DiseaseId(catalog.diseases.len());
        debug!(
            "disease {} added (transmissibility {}, lethality {})",
            definition.name, definition.transmissibility, definition.lethality
        );
        catalog.diseases.push(Disease {
            id,
            name: definition.name,
            transmissibility: definition.transmissibility,
            lethality: definition.lethality,
            symptoms: definition.symptoms,
        });
        Ok(id)
    }

    fn add_vaccine(&mut self, name: &str, prevents: DiseaseId) -> Result<VaccineId, OutbreakError> {
        if self.get_disease(prevents).is_none() {
            return Err(OutbreakError::UnknownDisease(format!("{prevents:?}")));
        }
        let catalog = self.get_data_mut(DiseasePlugin);
        let id = VaccineId(catalog.vaccines.len());
        catalog.vaccines.push(Vaccine {
            id,
            name: name.to_string(),
            prevents,
        });
        Ok(id)
    }

    fn get_disease(&self, id: DiseaseId) -> Option<&Disease> {
        catalog(self)?.diseases.get(id.0)
    }

    fn get_vaccine(&self, id: VaccineId) -> Option<&Vaccine> {
        catalog(self)?.vaccines.get(id.0)
    }

    fn find_disease(&self, name: &str) -> Option<DiseaseId> {
        catalog(self)?
            .diseases
            .iter()
            .find(|disease| disease.name == name)
            .map(|disease| disease.id)
    }

    fn find_vaccine(&self, name: &str) -> Option<VaccineId> {
        catalog(self)?
            .vaccines
            .iter()
            .find(|vaccine| vaccine.name == name)
            .map(|vaccine| vaccine.id)
    }

    fn vaccine_for(&self, disease: DiseaseId) -> Option<VaccineId> {
        catalog(self)?
            .vaccines
            .iter()
            .find(|vaccine| vaccine.prevents == disease)
            .map(|vaccine| vaccine.id)
    }

    fn disease_ids(&self) -> Vec<DiseaseId> {
        catalog(self)
            .map(|catalog| catalog.diseases.iter().map(|disease| disease.id).collect())
            .unwrap_or_default()
    }

    fn vaccine_ids(&self) -> Vec<VaccineId> {
        catalog(self)
            .map(|catalog| catalog.vaccines.iter().map(|vaccine| vaccine.id).collect())
            .unwrap_or_default()
    }
}
