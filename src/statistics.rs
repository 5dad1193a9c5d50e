//! Daily epidemic tallies and the end-of-game outcome.
//!
//! Every health transition is counted against the day it happened on. The outcome is
//! re-evaluated after each counted transition and, once decided, never changes:
//!
//! * the player loses when every character is dead;
//! * the player wins when every character is healthy and holds every vaccine in the catalog.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::characters::{ContextCharacterExt, HealthCondition};
use crate::context::Context;
use crate::define_data_plugin;
use crate::disease::ContextDiseaseExt;
use crate::event::OutcomeEvent;
use crate::log::info;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TallyKind {
    Infected,
    Healed,
    Died,
    Vaccinated,
}

/// Transitions counted during one simulated day
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DailyTally {
    pub day: u32,
    pub infected: u32,
    pub healed: u32,
    pub died: u32,
    pub vaccinated: u32,
}

impl DailyTally {
    fn add(&mut self, kind: TallyKind) {
        match kind {
            TallyKind::Infected => self.infected += 1,
            TallyKind::Healed => self.healed += 1,
            TallyKind::Died => self.died += 1,
            TallyKind::Vaccinated => self.vaccinated += 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Won,
    Lost,
}

#[derive(Default)]
struct StatisticsData {
    tallies: BTreeMap<u32, DailyTally>,
    outcome: Option<Outcome>,
}

define_data_plugin!(StatisticsPlugin, StatisticsData, StatisticsData::default());

pub(crate) fn record_tally(context: &mut Context, kind: TallyKind) {
    let day = context.current_day();
    context
        .get_data_mut(StatisticsPlugin)
        .tallies
        .entry(day)
        .or_insert_with(|| DailyTally {
            day,
            ..DailyTally::default()
        })
        .add(kind);
    update_outcome(context);
}

fn update_outcome(context: &mut Context) {
    if context.outcome().is_some() {
        return;
    }
    let Some(outcome) = context.evaluate_outcome() else {
        return;
    };
    info!("game over on day {}: {outcome:?}", context.current_day());
    context.get_data_mut(StatisticsPlugin).outcome = Some(outcome);
    context.emit_event(OutcomeEvent {
        outcome,
        day: context.current_day(),
    });
}

pub trait ContextStatisticsExt {
    /// Tally for `day`; all zeros if nothing happened that day
    fn daily_tally(&self, day: u32) -> DailyTally;

    /// All days with at least one transition, in order
    fn tallies(&self) -> Vec<DailyTally>;

    /// Sum over every day, with `day` set to the current day
    fn total_tally(&self) -> DailyTally;

    /// The recorded outcome, if the game is over
    fn outcome(&self) -> Option<Outcome>;

    /// Check the win and lose conditions against the current population
    fn evaluate_outcome(&self) -> Option<Outcome>;
}

impl ContextStatisticsExt for Context {
    fn daily_tally(&self, day: u32) -> DailyTally {
        self.get_data(StatisticsPlugin)
            .and_then(|data| data.tallies.get(&day).copied())
            .unwrap_or(DailyTally {
                day,
                ..DailyTally::default()
            })
    }

    fn tallies(&self) -> Vec<DailyTally> {
        self.get_data(StatisticsPlugin)
            .map(|data| data.tallies.values().copied().collect())
            .unwrap_or_default()
    }

    fn total_tally(&self) -> DailyTally {
        let mut total = DailyTally {
            day: self.current_day(),
            ..DailyTally::default()
        };
        for tally in self.tallies() {
            total.infected += tally.infected;
            total.healed += tally.healed;
            total.died += tally.died;
            total.vaccinated += tally.vaccinated;
        }
        total
    }

    fn outcome(&self) -> Option<Outcome> {
        self.get_data(StatisticsPlugin).and_then(|data| data.outcome)
    }

    fn evaluate_outcome(&self) -> Option<Outcome> {
        let population = self.population_size();
        if population == 0 {
            return None;
        }
        if self.count_by_health(HealthCondition::Dead) == population {
            return Some(Outcome::Lost);
        }
        let vaccines = self.vaccine_ids();
        if vaccines.is_empty() || self.count_by_health(HealthCondition::Healthy) < population {
            return None;
        }
        let everyone_vaccinated = self.character_ids().into_iter().all(|id| {
            self.get_character(id)
                .is_some_and(|character| vaccines.iter().all(|vaccine| character.vaccines().contains(vaccine)))
        });
        everyone_vaccinated.then_some(Outcome::Won)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::characters::ContextHealthExt;
    use crate::disease::DiseaseDefinition;
    use crate::random::ContextRandomExt;

    fn setup() -> Context {
        let mut context = Context::new();
        context.init_random(42);
        let flu = context
            .add_disease(DiseaseDefinition {
                name: "Flu".to_string(),
                transmissibility: 80,
                lethality: 20,
                symptoms: vec![],
            })
            .unwrap();
        context.add_vaccine("Flu shot", flu).unwrap();
        context
    }

    #[test]
    fn counts_transitions_per_day() {
        let mut context = setup();
        let flu = context.find_disease("Flu").unwrap();
        let a = context.add_character("A", 20, 50).unwrap();
        let b = context.add_character("B", 20, 50).unwrap();
        context.infect(a, flu).unwrap();
        context.infect(b, flu).unwrap();
        context.execute_until(2, 0);
        context.heal(a, None).unwrap();

        assert_eq!(context.daily_tally(1).infected, 2);
        assert_eq!(context.daily_tally(2).healed, 1);
        assert_eq!(context.daily_tally(5), DailyTally { day: 5, ..DailyTally::default() });
        assert_eq!(context.tallies().len(), 2);
        assert_eq!(context.total_tally().infected, 2);
    }

    #[test]
    fn lost_when_everyone_dies() {
        let mut context = setup();
        let flu = context.find_disease("Flu").unwrap();
        let a = context.add_character("A", 20, 50).unwrap();
        let b = context.add_character("B", 20, 50).unwrap();
        context.infect(a, flu).unwrap();
        context.infect(b, flu).unwrap();
        context.die(a).unwrap();
        assert_eq!(context.outcome(), None);
        context.die(b).unwrap();
        assert_eq!(context.outcome(), Some(Outcome::Lost));
    }

    #[test]
    fn won_when_everyone_is_healthy_and_vaccinated() {
        let mut context = setup();
        let shot = context.find_vaccine("Flu shot").unwrap();
        let a = context.add_character("A", 20, 50).unwrap();
        let b = context.add_character("B", 20, 50).unwrap();
        assert_eq!(context.evaluate_outcome(), None);

        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&outcomes);
        context.subscribe_to_event(move |_, event: OutcomeEvent| sink.borrow_mut().push(event.outcome));

        context.vaccinate(a, shot).unwrap();
        assert_eq!(context.outcome(), None);
        context.vaccinate(b, shot).unwrap();
        assert_eq!(context.outcome(), Some(Outcome::Won));
        context.execute_queued_callbacks();
        assert_eq!(*outcomes.borrow(), vec![Outcome::Won]);
    }

    #[test]
    fn no_outcome_without_population() {
        let context = setup();
        assert_eq!(context.evaluate_outcome(), None);
    }
}
