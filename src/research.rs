//! Vaccine research and dose production.
//!
//! The research lab runs one job at a time. Researching a vaccine takes two days and yields the
//! first dose; every further dose takes half a day. Both are paid up front and refused when the
//! treasury cannot cover them.
use crate::context::Context;
use crate::define_data_plugin;
use crate::disease::{ContextDiseaseExt, VaccineId};
use crate::economy::ContextEconomyExt;
use crate::error::OutbreakError;
use crate::hashing::{HashMap, HashSet};
use crate::log::{debug, info};

pub const RESEARCH_COST: i64 = 50;
pub const RESEARCH_DAYS: u32 = 2;
pub const DOSE_COST: i64 = 15;

/// The job the research lab is busy with
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResearchJob {
    Research(VaccineId),
    Dose(VaccineId),
}

#[derive(Default)]
struct ResearchData {
    researched: HashSet<VaccineId>,
    doses: HashMap<VaccineId, u32>,
    current: Option<ResearchJob>,
}

define_data_plugin!(ResearchPlugin, ResearchData, ResearchData::default());

fn finish_job(context: &mut Context, job: ResearchJob) {
    let data = context.get_data_mut(ResearchPlugin);
    data.current = None;
    let vaccine = match job {
        ResearchJob::Research(vaccine) => {
            data.researched.insert(vaccine);
            info!("vaccine {} researched", vaccine.index());
            vaccine
        }
        ResearchJob::Dose(vaccine) => vaccine,
    };
    *data.doses.entry(vaccine).or_insert(0) += 1;
    debug!("one more dose of vaccine {}", vaccine.index());
}

/// Start `job` if the lab is idle and the treasury pays `cost`. The job completes at
/// `(day, second)`.
fn start_job(
    context: &mut Context,
    job: ResearchJob,
    cost: i64,
    day: u32,
    second: u32,
) -> Result<bool, OutbreakError> {
    if context.research_job().is_some() {
        debug!("research lab is busy, {job:?} refused");
        return Ok(false);
    }
    if context.money() < cost {
        debug!("cannot afford {job:?} ({cost})");
        return Ok(false);
    }
    context.register_once(day, second, move |context| {
        finish_job(context, job);
        true
    })?;
    context.spend(cost, "vaccine research");
    context.get_data_mut(ResearchPlugin).current = Some(job);
    Ok(true)
}

fn check_vaccine(context: &Context, vaccine: VaccineId) -> Result<(), OutbreakError> {
    match context.get_vaccine(vaccine) {
        Some(_) => Ok(()),
        None => Err(OutbreakError::UnknownVaccine(format!("{vaccine:?}"))),
    }
}

pub trait ContextResearchExt {
    /// Start researching `vaccine`. Returns false if it is already known, the lab is busy or
    /// the treasury cannot pay.
    ///
    /// # Errors
    ///
    /// `UnknownVaccine` if `vaccine` is not in the catalog.
    fn research_vaccine(&mut self, vaccine: VaccineId) -> Result<bool, OutbreakError>;

    /// Start producing one more dose of a researched vaccine. Returns false if the vaccine was
    /// not researched yet, the lab is busy or the treasury cannot pay.
    ///
    /// # Errors
    ///
    /// `UnknownVaccine` if `vaccine` is not in the catalog.
    fn produce_vaccine_dose(&mut self, vaccine: VaccineId) -> Result<bool, OutbreakError>;

    fn is_vaccine_researched(&self, vaccine: VaccineId) -> bool;
    fn vaccine_doses(&self, vaccine: VaccineId) -> u32;
    fn research_job(&self) -> Option<ResearchJob>;

    /// Stock doses directly, e.g. from a scenario file
    fn add_vaccine_doses(&mut self, vaccine: VaccineId, doses: u32);

    /// Remove one dose from the stock
    ///
    /// # Errors
    ///
    /// `NoVaccineDose` when the stock is empty.
    fn take_vaccine_dose(&mut self, vaccine: VaccineId) -> Result<(), OutbreakError>;
}

impl ContextResearchExt for Context {
    fn research_vaccine(&mut self, vaccine: VaccineId) -> Result<bool, OutbreakError> {
        check_vaccine(self, vaccine)?;
        if self.is_vaccine_researched(vaccine) {
            return Ok(false);
        }
        let (day, second) = self.clock().now();
        start_job(
            self,
            ResearchJob::Research(vaccine),
            RESEARCH_COST,
            day + RESEARCH_DAYS,
            second,
        )
    }

    fn produce_vaccine_dose(&mut self, vaccine: VaccineId) -> Result<bool, OutbreakError> {
        check_vaccine(self, vaccine)?;
        if !self.is_vaccine_researched(vaccine) {
            return Ok(false);
        }
        let (day, second) = self.clock().now();
        let second = second + self.day_length() / 2;
        let (day, second) = if second >= self.day_length() {
            (day + 1, second - self.day_length())
        } else {
            (day, second)
        };
        start_job(self, ResearchJob::Dose(vaccine), DOSE_COST, day, second)
    }

    fn is_vaccine_researched(&self, vaccine: VaccineId) -> bool {
        self.get_data(ResearchPlugin)
            .is_some_and(|data| data.researched.contains(&vaccine))
    }

    fn vaccine_doses(&self, vaccine: VaccineId) -> u32 {
        self.get_data(ResearchPlugin)
            .and_then(|data| data.doses.get(&vaccine).copied())
            .unwrap_or(0)
    }

    fn research_job(&self) -> Option<ResearchJob> {
        self.get_data(ResearchPlugin).and_then(|data| data.current)
    }

    fn add_vaccine_doses(&mut self, vaccine: VaccineId, doses: u32) {
        *self
            .get_data_mut(ResearchPlugin)
            .doses
            .entry(vaccine)
            .or_insert(0) += doses;
    }

    fn take_vaccine_dose(&mut self, vaccine: VaccineId) -> Result<(), OutbreakError> {
        match self.get_data_mut(ResearchPlugin).doses.get_mut(&vaccine) {
            Some(doses) if *doses > 0 => {
                *doses -= 1;
                Ok(())
            }
            _ => Err(OutbreakError::NoVaccineDose(vaccine)),
        }
    }
}
