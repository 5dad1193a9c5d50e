//! Treatment facilities: hospitals, laboratories and health centers.
//!
//! A facility takes a patient out of circulation, suspends their daily lethality check and
//! schedules what happens next as one-shot events anchored to the second of admission:
//!
//! * **Hospital**: diagnosis the next day, a bill every day of the stay, and a cure with the
//!   matching vaccine when the stay ends. Patients beyond the bed count wait in a queue and are
//!   admitted as beds free up.
//! * **Laboratory**: diagnosis after the stay, billed the next day; the patient comes back
//!   still sick, with the lethality check re-anchored to the second of release.
//! * **Health center**: vaccination after the stay, using one dose from the vaccine stock and
//!   billed daily. Sick patients get their lethality check back on release.
//!
//! Every scheduled step re-validates the patient before acting.
use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::characters::{Activity, CharacterId, ContextCharacterExt, ContextHealthExt, HealthCondition};
use crate::context::Context;
use crate::define_data_plugin;
use crate::disease::{ContextDiseaseExt, VaccineId};
use crate::economy::ContextEconomyExt;
use crate::error::OutbreakError;
use crate::event::{TreatmentEvent, TreatmentStage};
use crate::log::{debug, info};
use crate::research::ContextResearchExt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FacilityId(usize);

impl FacilityId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    Hospital,
    Laboratory,
    HealthCenter,
}

/// Operating parameters of one facility
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacilityParams {
    pub treatment_days: u32,
    /// Cost of a whole stay, billed in equal daily parts.
    pub total_cost: i64,
    /// Patients treated at once. Health centers and laboratories are not limited.
    pub beds: usize,
    pub max_beds: usize,
    /// Price of the next bed; doubles with every purchase.
    pub bed_price: i64,
}

impl FacilityParams {
    #[must_use]
    pub fn for_kind(kind: FacilityKind) -> FacilityParams {
        match kind {
            FacilityKind::Hospital => FacilityParams {
                treatment_days: 4,
                total_cost: 80,
                beds: 1,
                max_beds: 8,
                bed_price: 50,
            },
            FacilityKind::Laboratory => FacilityParams {
                treatment_days: 1,
                total_cost: 15,
                beds: usize::MAX,
                max_beds: usize::MAX,
                bed_price: 0,
            },
            FacilityKind::HealthCenter => FacilityParams {
                treatment_days: 1,
                total_cost: 10,
                beds: usize::MAX,
                max_beds: usize::MAX,
                bed_price: 0,
            },
        }
    }

    #[must_use]
    pub fn cost_per_day(&self) -> i64 {
        self.total_cost / i64::from(self.treatment_days.max(1))
    }

    /// # Errors
    ///
    /// `InvalidFacility` when a stay would end on the day it starts or the bed count exceeds
    /// the maximum.
    pub fn validate(&self) -> Result<(), OutbreakError> {
        if self.treatment_days == 0 {
            return Err(OutbreakError::InvalidFacility(
                "treatment must last at least one day".to_string(),
            ));
        }
        if self.beds > self.max_beds {
            return Err(OutbreakError::InvalidFacility(format!(
                "{} beds exceed the maximum of {}",
                self.beds, self.max_beds
            )));
        }
        Ok(())
    }
}

/// Whether a patient was taken in or has to wait
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Queued,
}

#[derive(Clone, Debug)]
pub struct Facility {
    pub id: FacilityId,
    pub name: String,
    pub kind: FacilityKind,
    pub params: FacilityParams,
    pub patients: BTreeSet<CharacterId>,
    pub queue: VecDeque<CharacterId>,
}

impl Facility {
    #[must_use]
    pub fn has_free_bed(&self) -> bool {
        self.patients.len() < self.params.beds
    }
}

#[derive(Default)]
struct FacilityData {
    facilities: Vec<Facility>,
}

define_data_plugin!(FacilityPlugin, FacilityData, FacilityData::default());

fn facility_mut(context: &mut Context, id: FacilityId) -> Result<&mut Facility, OutbreakError> {
    context
        .get_data_mut(FacilityPlugin)
        .facilities
        .get_mut(id.0)
        .ok_or(OutbreakError::UnknownFacility(id.0))
}

fn emit(context: &mut Context, facility: &Facility, character: CharacterId, stage: TreatmentStage, vaccine: Option<VaccineId>) {
    context.emit_event(TreatmentEvent {
        facility: facility.id,
        kind: facility.kind,
        character,
        stage,
        vaccine,
    });
}

/// Schedule `days` daily bills starting tomorrow, at the current second
fn schedule_bills(context: &mut Context, facility: &Facility, days: u32) -> Result<(), OutbreakError> {
    let (day, second) = context.clock().now();
    let cost = facility.params.cost_per_day();
    let name = facility.name.clone();
    for offset in 1..=days {
        let reason = name.clone();
        context.register_once(day + offset, second, move |context| {
            context.spend(cost, &reason);
            true
        })?;
    }
    Ok(())
}

fn admit(context: &mut Context, facility: &Facility, patient: CharacterId, vaccine: Option<VaccineId>) -> Result<(), OutbreakError> {
    let days = facility.params.treatment_days;
    if days == 0 {
        return Err(OutbreakError::InvalidFacility(format!(
            "{} treats in zero days",
            facility.name
        )));
    }
    if facility.kind == FacilityKind::HealthCenter && vaccine.is_none() {
        return Err(OutbreakError::InvalidFacility(
            "health center visits need a vaccine".to_string(),
        ));
    }

    // Every event lies at least a day ahead, so scheduling cannot fail halfway.
    let (day, second) = context.clock().now();
    let id = facility.id;
    match (facility.kind, vaccine) {
        (FacilityKind::Hospital, _) => {
            context.register_once(day + days, second, move |context| {
                finish_hospital_stay(context, id, patient).is_ok()
            })?;
            context.register_once(day + 1, second, move |context| {
                let diagnosed = context.set_diagnosed(patient, true).is_ok();
                if diagnosed {
                    notify(context, id, patient, TreatmentStage::Diagnosed, None);
                }
                diagnosed
            })?;
            schedule_bills(context, facility, days.saturating_sub(1))?;
        }
        (FacilityKind::Laboratory, _) => {
            context.register_once(day + days, second, move |context| {
                finish_lab_exam(context, id, patient).is_ok()
            })?;
            schedule_bills(context, facility, 1)?;
        }
        (FacilityKind::HealthCenter, Some(vaccine)) => {
            context.register_once(day + days, second, move |context| {
                finish_vaccination(context, id, patient, vaccine).is_ok()
            })?;
            schedule_bills(context, facility, days)?;
        }
        (FacilityKind::HealthCenter, None) => {}
    }

    if context.character(patient)?.health() == HealthCondition::Sick {
        context.suspend_for_treatment(patient)?;
    }
    context.set_activity(patient, Activity::InFacility)?;
    facility_mut(context, facility.id)?.patients.insert(patient);
    debug!("{} admitted character {}", facility.name, patient.index());
    emit(context, facility, patient, TreatmentStage::Admitted, vaccine);
    Ok(())
}

fn notify(context: &mut Context, id: FacilityId, patient: CharacterId, stage: TreatmentStage, vaccine: Option<VaccineId>) {
    if let Some(facility) = context.get_facility(id).cloned() {
        emit(context, &facility, patient, stage, vaccine);
    }
}

fn release(context: &mut Context, id: FacilityId, patient: CharacterId) -> Result<(), OutbreakError> {
    if !facility_mut(context, id)?.patients.remove(&patient) {
        return Ok(());
    }
    context.set_activity(patient, Activity::Free)?;
    context.resume_from_treatment(patient)?;
    notify(context, id, patient, TreatmentStage::Released, None);
    Ok(())
}

fn finish_hospital_stay(context: &mut Context, id: FacilityId, patient: CharacterId) -> Result<(), OutbreakError> {
    if let Some(disease) = context.character(patient)?.disease() {
        let vaccine = context.vaccine_for(disease);
        context.heal(patient, vaccine)?;
        info!("character {} left the hospital cured", patient.index());
        notify(context, id, patient, TreatmentStage::Cured, vaccine);
    }
    release(context, id, patient)?;
    admit_from_queue(context, id)
}

fn finish_lab_exam(context: &mut Context, id: FacilityId, patient: CharacterId) -> Result<(), OutbreakError> {
    if context.character(patient)?.health() == HealthCondition::Sick {
        context.set_diagnosed(patient, true)?;
        notify(context, id, patient, TreatmentStage::Diagnosed, None);
    }
    release(context, id, patient)
}

fn finish_vaccination(context: &mut Context, id: FacilityId, patient: CharacterId, vaccine: VaccineId) -> Result<(), OutbreakError> {
    if context.character(patient)?.health() != HealthCondition::Dead {
        context.vaccinate(patient, vaccine)?;
        notify(context, id, patient, TreatmentStage::Vaccinated, Some(vaccine));
    }
    release(context, id, patient)
}

/// Admit waiting patients while beds are free. Patients who died or recovered while waiting
/// leave the queue.
fn admit_from_queue(context: &mut Context, id: FacilityId) -> Result<(), OutbreakError> {
    loop {
        let facility = context
            .get_facility(id)
            .cloned()
            .ok_or(OutbreakError::UnknownFacility(id.0))?;
        if !facility.has_free_bed() {
            return Ok(());
        }
        let Some(patient) = facility_mut(context, id)?.queue.pop_front() else {
            return Ok(());
        };
        if context.character(patient)?.health() != HealthCondition::Sick {
            context.set_activity(patient, Activity::Free)?;
            continue;
        }
        admit(context, &facility, patient, None)?;
    }
}

pub trait ContextFacilityExt {
    /// Open a facility with the default parameters of its kind
    fn add_facility(&mut self, name: &str, kind: FacilityKind) -> FacilityId;

    /// # Errors
    ///
    /// `InvalidFacility` when `params` do not validate.
    fn add_facility_with(&mut self, name: &str, kind: FacilityKind, params: FacilityParams) -> Result<FacilityId, OutbreakError>;

    fn get_facility(&self, id: FacilityId) -> Option<&Facility>;
    fn facility_ids(&self) -> Vec<FacilityId>;

    /// Send a sick character to a hospital or laboratory. A full hospital queues the patient.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the patient is sick and not already in treatment or queued;
    /// `UnknownFacility` for a missing id or a health center.
    fn treat_patient(&mut self, id: FacilityId, patient: CharacterId) -> Result<Admission, OutbreakError>;

    /// Vaccinate a living character at a health center, using one dose from the stock
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for dead or busy patients; `NoVaccineDose` when the stock is empty;
    /// `UnknownFacility` for a missing id or a facility of another kind.
    fn vaccinate_at(&mut self, id: FacilityId, patient: CharacterId, vaccine: VaccineId) -> Result<(), OutbreakError>;

    /// Buy one more hospital bed. Returns false when the hospital is at its maximum or the
    /// treasury cannot afford it.
    ///
    /// # Errors
    ///
    /// `UnknownFacility` for a missing id or a facility other than a hospital.
    fn buy_bed(&mut self, id: FacilityId) -> Result<bool, OutbreakError>;
}

fn open_facility(context: &mut Context, name: &str, kind: FacilityKind, params: FacilityParams) -> FacilityId {
    let data = context.get_data_mut(FacilityPlugin);
    let id = FacilityId(data.facilities.len());
    data.facilities.push(Facility {
        id,
        name: name.to_string(),
        kind,
        params,
        patients: BTreeSet::new(),
        queue: VecDeque::new(),
    });
    debug!("{kind:?} {name} opened");
    id
}

fn check_free_patient(context: &Context, patient: CharacterId, operation: &'static str) -> Result<(), OutbreakError> {
    let character = context.character(patient)?;
    if character.is_in_treatment() || character.activity() != Activity::Free {
        return Err(OutbreakError::InvalidTransition {
            character: patient,
            from: character.health(),
            operation,
        });
    }
    Ok(())
}

impl ContextFacilityExt for Context {
    fn add_facility(&mut self, name: &str, kind: FacilityKind) -> FacilityId {
        open_facility(self, name, kind, FacilityParams::for_kind(kind))
    }

    fn add_facility_with(&mut self, name: &str, kind: FacilityKind, params: FacilityParams) -> Result<FacilityId, OutbreakError> {
        params.validate()?;
        Ok(open_facility(self, name, kind, params))
    }

    fn get_facility(&self, id: FacilityId) -> Option<&Facility> {
        self.get_data(FacilityPlugin)?.facilities.get(id.0)
    }

    fn facility_ids(&self) -> Vec<FacilityId> {
        self.get_data(FacilityPlugin)
            .map(|data| data.facilities.iter().map(|facility| facility.id).collect())
            .unwrap_or_default()
    }

    fn treat_patient(&mut self, id: FacilityId, patient: CharacterId) -> Result<Admission, OutbreakError> {
        let facility = self
            .get_facility(id)
            .cloned()
            .filter(|facility| facility.kind != FacilityKind::HealthCenter)
            .ok_or(OutbreakError::UnknownFacility(id.0))?;
        check_free_patient(self, patient, "treat")?;
        let health = self.character(patient)?.health();
        if health != HealthCondition::Sick {
            return Err(OutbreakError::InvalidTransition {
                character: patient,
                from: health,
                operation: "treat",
            });
        }

        if !facility.has_free_bed() {
            self.set_activity(patient, Activity::Queued)?;
            facility_mut(self, id)?.queue.push_back(patient);
            debug!("{} is full, character {} waits", facility.name, patient.index());
            emit(self, &facility, patient, TreatmentStage::Queued, None);
            return Ok(Admission::Queued);
        }
        admit(self, &facility, patient, None)?;
        Ok(Admission::Admitted)
    }

    fn vaccinate_at(&mut self, id: FacilityId, patient: CharacterId, vaccine: VaccineId) -> Result<(), OutbreakError> {
        let facility = self
            .get_facility(id)
            .cloned()
            .filter(|facility| facility.kind == FacilityKind::HealthCenter)
            .ok_or(OutbreakError::UnknownFacility(id.0))?;
        check_free_patient(self, patient, "vaccinate")?;
        let health = self.character(patient)?.health();
        if health == HealthCondition::Dead {
            return Err(OutbreakError::InvalidTransition {
                character: patient,
                from: health,
                operation: "vaccinate",
            });
        }
        if self.get_vaccine(vaccine).is_none() {
            return Err(OutbreakError::UnknownVaccine(format!("{vaccine:?}")));
        }
        if self.vaccine_doses(vaccine) == 0 {
            return Err(OutbreakError::NoVaccineDose(vaccine));
        }
        admit(self, &facility, patient, Some(vaccine))?;
        self.take_vaccine_dose(vaccine)
    }

    fn buy_bed(&mut self, id: FacilityId) -> Result<bool, OutbreakError> {
        let facility = self
            .get_facility(id)
            .filter(|facility| facility.kind == FacilityKind::Hospital)
            .ok_or(OutbreakError::UnknownFacility(id.0))?;
        if facility.params.beds >= facility.params.max_beds {
            return Ok(false);
        }
        let price = facility.params.bed_price;
        if !self.try_spend(price, "hospital bed") {
            return Ok(false);
        }
        let facility = facility_mut(self, id)?;
        facility.params.beds += 1;
        facility.params.bed_price = price.saturating_mul(2);
        info!("{} now has {} beds", facility.name, facility.params.beds);
        admit_from_queue(self, id)?;
        Ok(true)
    }
}
