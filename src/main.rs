use outbreak::prelude::*;
use outbreak::runner::run_with_args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let context = run_with_args(|_, _, _| Ok(()))?;

    let (day, second) = context.clock().now();
    let total = context.total_tally();
    println!("Stopped on day {day}, second {second}");
    println!(
        "Healthy {}, sick {}, dead {}",
        context.count_by_health(HealthCondition::Healthy),
        context.count_by_health(HealthCondition::Sick),
        context.count_by_health(HealthCondition::Dead)
    );
    println!(
        "Infected {}, healed {}, died {}, vaccinated {}",
        total.infected, total.healed, total.died, total.vaccinated
    );
    println!("Treasury: {}", context.money());
    match context.outcome() {
        Some(Outcome::Won) => println!("The epidemic was contained"),
        Some(Outcome::Lost) => println!("Nobody survived"),
        None => println!("The epidemic goes on"),
    }
    Ok(())
}
