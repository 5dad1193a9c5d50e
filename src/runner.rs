use std::path::PathBuf;

use clap::{Args, Command, FromArgMatches as _};

use crate::clock::SimulationSpeed;
use crate::config::SimulationConfig;
use crate::context::{Context, ExecutionStatus};
use crate::error::OutbreakError;
use crate::event::OutcomeEvent;
use crate::log::{info, set_log_level, set_module_filters, LevelFilter};
use crate::report::ContextReportExt;

/// Default cli arguments for the outbreak runner
#[derive(Args, Debug, Clone)]
pub struct BaseArgs {
    /// Random seed
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// Optional path for a JSON scenario file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Optional path for report output
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Replace report files left by an earlier run
    #[arg(long)]
    pub overwrite: bool,

    /// Enable logging at the given level (error, warn, info, debug, trace)
    #[arg(short, long)]
    pub log_level: Option<LevelFilter>,

    /// Per-module level as `<module>=<level>`, e.g. `outbreak::facility=debug`. Repeatable.
    #[arg(long = "log-filter", value_parser = parse_module_filter)]
    pub log_filters: Vec<(String, LevelFilter)>,

    /// Number of simulated days to run
    #[arg(short, long, default_value = "30")]
    pub days: u32,

    /// Overrides the speed from the scenario
    #[arg(short, long, value_enum)]
    pub speed: Option<SimulationSpeed>,

    /// Pace ticks in real time instead of running as fast as possible
    #[arg(long)]
    pub realtime: bool,
}

impl Default for BaseArgs {
    fn default() -> Self {
        BaseArgs {
            random_seed: 0,
            config: None,
            output_dir: None,
            overwrite: false,
            log_level: None,
            log_filters: Vec::new(),
            days: 30,
            speed: None,
            realtime: false,
        }
    }
}

fn parse_module_filter(value: &str) -> Result<(String, LevelFilter), String> {
    let (module, level) = value
        .split_once('=')
        .ok_or_else(|| format!("expected <module>=<level>, got {value}"))?;
    let level = level
        .parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level {level}"))?;
    Ok((module.to_string(), level))
}

fn create_outbreak_cli() -> Command {
    let cli = Command::new("outbreak");
    BaseArgs::augment_args(cli)
}

/// Runs a simulation with default cli arguments
///
/// This function parses command line arguments, builds the scenario and lets you finish the
/// setup before the clock starts
///
/// # Parameters
/// - `setup_fn`: A function that takes a mutable reference to the `Context`, the parsed
///   `BaseArgs` and the scenario it was built from
///
/// # Errors
/// Returns an error if argument parsing, the scenario or the setup function fails
pub fn run_with_args<F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, &BaseArgs, &SimulationConfig) -> Result<(), OutbreakError>,
{
    let matches = create_outbreak_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(args, setup_fn)
}

/// Runs a simulation from already parsed arguments
///
/// # Errors
/// Returns an error if the scenario, the report files or the setup function fails
pub fn run_with_args_internal<F>(args: BaseArgs, setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, &BaseArgs, &SimulationConfig) -> Result<(), OutbreakError>,
{
    if let Some(level) = args.log_level {
        set_log_level(level);
    }
    if !args.log_filters.is_empty() {
        let filters: Vec<(&str, LevelFilter)> = args
            .log_filters
            .iter()
            .map(|(module, level)| (module.as_str(), *level))
            .collect();
        set_module_filters(&filters);
    }

    let config = match &args.config {
        Some(path) => {
            info!("Loading scenario from: {}", path.display());
            SimulationConfig::from_file(path)?
        }
        None => SimulationConfig::default(),
    };

    // Instantiate a context
    let mut context = Context::from_config(&config, args.random_seed)?;
    if let Some(speed) = args.speed {
        context.set_speed(speed);
    }

    // Optionally write the daily summary
    if let Some(output_dir) = &args.output_dir {
        context
            .report_options()
            .directory(output_dir.clone())
            .overwrite(args.overwrite);
        context.add_daily_summary_report("daily_summary")?;
    }

    if config.stop_on_outcome {
        context.subscribe_to_event(|context, event: OutcomeEvent| {
            info!("{:?} on day {}, stopping", event.outcome, event.day);
            context.shutdown();
        });
    }

    // Run the provided Fn
    setup_fn(&mut context, &args, &config)?;

    // Execute the context
    let (day, second) = context.clock().now();
    let status = if args.realtime {
        context.execute_realtime(day + args.days, second)
    } else {
        context.execute_until(day + args.days, second)
    };
    if status == ExecutionStatus::Suspended {
        info!("clock is paused, nothing ran");
    }
    Ok(context)
}
