use std::cell::RefCell;
use std::rc::Rc;

use outbreak::prelude::*;

fn flu(context: &mut Context, transmissibility: u32, lethality: u32) -> DiseaseId {
    context
        .add_disease(DiseaseDefinition {
            name: "Flu".to_string(),
            transmissibility,
            lethality,
            symptoms: vec!["Fever".to_string()],
        })
        .unwrap()
}

#[test]
fn lethality_check_follows_the_second_of_infection() {
    let mut context = Context::with_clock(VirtualClock::starting_at(5000, 1, 1199).unwrap());
    context.init_random(1200);
    let flu = flu(&mut context, 80, 20);
    let id = context.add_character("Ana Costa", 30, 50).unwrap();

    context.execute_until(1, 1200);
    context.infect(id, flu).unwrap();
    let check = context.character(id).unwrap().lethality_check().unwrap();
    assert_eq!(check.second, 1200);
    assert_eq!(context.scheduler().every_day_count(), 1);

    let death_times = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&death_times);
    context.subscribe_to_event(move |context, event: HealthChangeEvent| {
        if event.current == HealthCondition::Dead {
            sink.borrow_mut().push(context.current_second());
        }
    });

    // Survival over 200 daily 21% rolls is practically impossible.
    for _ in 0..200 {
        if context.character(id).unwrap().health() == HealthCondition::Dead {
            break;
        }
        context.execute_days(1);
    }

    let character = context.character(id).unwrap();
    assert_eq!(character.health(), HealthCondition::Dead);
    assert_eq!(character.disease(), None);
    assert_eq!(character.cause_of_death(), Some(flu));
    assert!(character.lethality_check().is_none());
    assert_eq!(*death_times.borrow(), vec![1200]);
    assert_eq!(context.scheduler().every_day_count(), 0);
    assert_eq!(context.scheduler().every_day_seconds(), 0);
}

#[test]
fn disease_matches_sickness_throughout_a_run() {
    let config = SimulationConfig::from_json(
        r#"{
            "day_length": 200,
            "population": { "size": 25 },
            "diseases": [{ "name": "Flu", "transmissibility": 95, "lethality": 15 }],
            "vaccines": [{ "name": "Flu vaccine", "prevents": "Flu" }],
            "zones": [{ "name": "Market", "disease": "Flu" }],
            "patients_zero": [{ "disease": "Flu", "count": 3 }],
            "transmission_cap": "unlimited",
            "encounters": { "contact_probability": 0.2, "zone_probability": 0.05 }
        }"#,
    )
    .unwrap();
    let mut context = Context::from_config(&config, 11).unwrap();

    for _ in 0..10 {
        context.execute_days(1);
        for id in context.character_ids() {
            let character = context.character(id).unwrap();
            assert_eq!(character.disease().is_some(), character.health() == HealthCondition::Sick);
            assert_eq!(
                character.lethality_check().is_some(),
                character.health() == HealthCondition::Sick && !character.is_in_treatment()
            );
        }
    }
    let total = context.total_tally();
    assert!(total.infected >= 3);
    assert_eq!(
        context.count_by_health(HealthCondition::Dead),
        usize::try_from(total.died).unwrap()
    );
}

#[test]
fn same_seed_same_epidemic() {
    let config = SimulationConfig::from_json(
        r#"{
            "day_length": 200,
            "population": { "size": 25 },
            "patients_zero": [{ "disease": "Flu", "count": 2 }],
            "encounters": { "contact_probability": 0.1, "zone_probability": 0.05 }
        }"#,
    )
    .unwrap();
    let run = |seed| {
        let mut context = Context::from_config(&config, seed).unwrap();
        context.execute_days(8);
        let states: Vec<HealthCondition> = context
            .character_ids()
            .into_iter()
            .map(|id| context.character(id).unwrap().health())
            .collect();
        (context.tallies(), states)
    };
    assert_eq!(run(5), run(5));
}

#[test]
fn a_whole_game_can_be_won() {
    let mut context = Context::with_clock(VirtualClock::starting_at(100, 1, 10).unwrap());
    context.init_random(9);
    context.init_economy(EconomyParams::default());
    let flu = flu(&mut context, 80, 0);
    let shot = context.add_vaccine("Flu vaccine", flu).unwrap();
    let hospital = context.add_facility("Hospital", FacilityKind::Hospital);
    let lab = context.add_facility("Laboratory", FacilityKind::Laboratory);
    let center = context.add_facility("Health center", FacilityKind::HealthCenter);
    let patient = context.add_character("Ana Costa", 30, 50).unwrap();
    let neighbor = context.add_character("Hugo Dias", 40, 60).unwrap();
    context.infect(patient, flu).unwrap();

    let outcomes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&outcomes);
    context.subscribe_to_event(move |_, event: OutcomeEvent| sink.borrow_mut().push(event));

    // Day 1: start researching and send the patient to the lab.
    assert!(context.research_vaccine(shot).unwrap());
    assert_eq!(context.treat_patient(lab, patient).unwrap(), Admission::Admitted);

    // Day 2: diagnosed, off to the hospital.
    context.execute_until(2, 10);
    assert!(context.character(patient).unwrap().is_diagnosed());
    assert_eq!(context.treat_patient(hospital, patient).unwrap(), Admission::Admitted);

    // Day 3: the vaccine is ready; produce a dose for the neighbor.
    context.execute_until(3, 10);
    assert_eq!(context.vaccine_doses(shot), 1);
    context.vaccinate_at(center, neighbor, shot).unwrap();
    assert!(context.produce_vaccine_dose(shot).unwrap());
    context.execute_until(4, 10);
    assert!(context.character(neighbor).unwrap().vaccines().contains(&shot));
    assert_eq!(context.outcome(), None);

    // Day 6: the patient leaves the hospital cured and vaccinated.
    context.execute_until(6, 10);
    assert_eq!(context.character(patient).unwrap().health(), HealthCondition::Healthy);
    assert_eq!(context.outcome(), Some(Outcome::Won));
    assert_eq!(*outcomes.borrow(), vec![OutcomeEvent { outcome: Outcome::Won, day: 6 }]);

    // Research 50, lab 15, hospital 3 x 20, health center 10, dose 15; five day ends with one
    // healthy character each.
    assert_eq!(context.money(), 400 - 50 - 15 - 60 - 10 - 15 + 50);
    assert_eq!(context.vaccine_doses(shot), 1);
}
