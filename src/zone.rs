//! Disease zones: areas from which healthy characters passing through may catch a disease.
//!
//! Zones are either placed in the city at the start of a game or left behind by a character
//! who died, carrying the disease that killed them. The spatial side (who is inside which zone)
//! is owned by the movement layer; it reports entries through [`ContextZoneExt::enter_zone`].
use serde::Serialize;

use crate::characters::{CharacterId, ContextCharacterExt, HealthCondition};
use crate::context::Context;
use crate::define_data_plugin;
use crate::disease::{ContextDiseaseExt, DiseaseId};
use crate::error::OutbreakError;
use crate::event::TransmissionSource;
use crate::log::{debug, info};
use crate::transmission::ContextTransmissionExt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ZoneId(usize);

impl ZoneId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZoneKind {
    /// A hotspot placed in the city.
    Placed { name: String },
    /// The body of a character who died.
    Corpse(CharacterId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Zone {
    pub id: ZoneId,
    pub disease: DiseaseId,
    pub kind: ZoneKind,
    /// Collected corpses stop spreading their disease.
    pub active: bool,
}

#[derive(Default)]
struct ZoneData {
    zones: Vec<Zone>,
}

define_data_plugin!(ZonePlugin, ZoneData, ZoneData::default());

pub trait ContextZoneExt {
    /// Place a zone carrying `disease`
    ///
    /// # Errors
    ///
    /// `UnknownDisease` if `disease` is not in the catalog.
    fn add_zone(&mut self, name: &str, disease: DiseaseId) -> Result<ZoneId, OutbreakError>;

    /// Leave a zone where `character` died. Called by the health state machine.
    ///
    /// # Errors
    ///
    /// `UnknownDisease` if `disease` is not in the catalog.
    fn add_corpse_zone(&mut self, character: CharacterId, disease: DiseaseId) -> Result<ZoneId, OutbreakError>;

    /// A character walked into a zone. Healthy, eligible characters are exposed to the zone's
    /// disease; returns whether they got infected.
    ///
    /// # Errors
    ///
    /// `UnknownZone` or `UnknownCharacter` for ids missing from the context.
    fn enter_zone(&mut self, zone: ZoneId, character: CharacterId) -> Result<bool, OutbreakError>;

    /// Remove the body of a dead character so it stops spreading disease. Returns false if
    /// there was no active corpse zone for it.
    ///
    /// # Errors
    ///
    /// `UnknownCharacter` for an id missing from the context.
    fn collect_corpse(&mut self, character: CharacterId) -> Result<bool, OutbreakError>;

    fn get_zone(&self, zone: ZoneId) -> Option<&Zone>;
    fn corpse_zone_of(&self, character: CharacterId) -> Option<ZoneId>;

    /// Ids of zones still spreading disease
    fn active_zones(&self) -> Vec<ZoneId>;
}

fn push_zone(context: &mut Context, disease: DiseaseId, kind: ZoneKind) -> Result<ZoneId, OutbreakError> {
    if context.get_disease(disease).is_none() {
        return Err(OutbreakError::UnknownDisease(format!("{disease:?}")));
    }
    let data = context.get_data_mut(ZonePlugin);
    let id = ZoneId(data.zones.len());
    data.zones.push(Zone {
        id,
        disease,
        kind,
        active: true,
    });
    Ok(id)
}

impl ContextZoneExt for Context {
    fn add_zone(&mut self, name: &str, disease: DiseaseId) -> Result<ZoneId, OutbreakError> {
        let id = push_zone(
            self,
            disease,
            ZoneKind::Placed {
                name: name.to_string(),
            },
        )?;
        debug!("zone {name} placed with disease {}", disease.index());
        Ok(id)
    }

    fn add_corpse_zone(&mut self, character: CharacterId, disease: DiseaseId) -> Result<ZoneId, OutbreakError> {
        let id = push_zone(self, disease, ZoneKind::Corpse(character))?;
        info!(
            "the body of character {} is spreading disease {}",
            character.index(),
            disease.index()
        );
        Ok(id)
    }

    fn enter_zone(&mut self, zone: ZoneId, character: CharacterId) -> Result<bool, OutbreakError> {
        let Some(entered) = self.get_zone(zone) else {
            return Err(OutbreakError::UnknownZone(zone.0));
        };
        if !entered.active {
            return Ok(false);
        }
        let disease = entered.disease;
        if self.character(character)?.health() != HealthCondition::Healthy {
            return Ok(false);
        }
        self.try_transmit(disease, character, TransmissionSource::Zone(zone.0))
    }

    fn collect_corpse(&mut self, character: CharacterId) -> Result<bool, OutbreakError> {
        self.character(character)?;
        let Some(zone) = self.corpse_zone_of(character) else {
            return Ok(false);
        };
        let data = self.get_data_mut(ZonePlugin);
        let Some(zone) = data.zones.get_mut(zone.0).filter(|zone| zone.active) else {
            return Ok(false);
        };
        zone.active = false;
        debug!("body of character {} collected", character.index());
        Ok(true)
    }

    fn get_zone(&self, zone: ZoneId) -> Option<&Zone> {
        self.get_data(ZonePlugin)?.zones.get(zone.0)
    }

    fn corpse_zone_of(&self, character: CharacterId) -> Option<ZoneId> {
        self.get_data(ZonePlugin)?
            .zones
            .iter()
            .find(|zone| zone.kind == ZoneKind::Corpse(character))
            .map(|zone| zone.id)
    }

    fn active_zones(&self) -> Vec<ZoneId> {
        self.get_data(ZonePlugin)
            .map(|data| {
                data.zones
                    .iter()
                    .filter(|zone| zone.active)
                    .map(|zone| zone.id)
                    .collect()
            })
            .unwrap_or_default()
    }
}
