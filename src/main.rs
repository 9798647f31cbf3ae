//! glare-sim entry point: CLI wiring, config resolution and report output.

use std::process;

use tracing::info;

use glare_sim::cli::{self, CliCommand, CliOptions};
use glare_sim::config::AnalysisConfig;
use glare_sim::error::GlareError;
use glare_sim::input::ProjectInput;
use glare_sim::io::{export_events_csv, export_periods_csv, export_summary_json, load_profiles};
use glare_sim::optics::ProfileRegistry;
use glare_sim::sim::AnalysisEngine;
use glare_sim::solar::Accuracy;
use glare_sim::telemetry::init_tracing;

/// Resolves the config: `--config` file, then `--preset`, then the standard
/// preset; environment overrides and CLI flags are applied on top.
fn load_config(opts: &CliOptions) -> Result<AnalysisConfig, GlareError> {
    let base = if let Some(ref path) = opts.config {
        AnalysisConfig::from_toml_file(path).map_err(|e| GlareError::Config(vec![e]))?
    } else if let Some(ref name) = opts.preset {
        AnalysisConfig::from_preset(name).map_err(|e| GlareError::Config(vec![e]))?
    } else {
        AnalysisConfig::standard()
    };

    let mut config = base.with_env_overrides().map_err(GlareError::Config)?;

    if let Some(year) = opts.year {
        config.analysis.year = Some(year);
    }
    if opts.serial {
        config.execution.parallel = false;
    }
    Ok(config)
}

fn run(opts: &CliOptions) -> Result<(), GlareError> {
    let config = load_config(opts)?;
    let project = ProjectInput::from_json_file(&opts.project)?.into_project()?;

    let registry = match opts.profiles {
        Some(ref path) => load_profiles(path, config.detector.interpolation)?,
        None => ProfileRegistry::builtin(config.detector.interpolation),
    };

    info!(
        pv_areas = project.pv_areas.len(),
        observers = project.observers.len(),
        resolution = %project.parameters.resolution,
        "project loaded"
    );

    let engine = AnalysisEngine::new(project, config, registry);
    let report = engine.run()?;
    let project = engine.project();

    if report.accuracy == Accuracy::Reduced {
        eprintln!("warning: analytic sun positions in use, angles may be off by up to a degree");
    }

    for period in &report.periods {
        println!("{period}");
    }
    println!("\n{}", report.statistics);
    println!("\n--- Daylight (UTC) ---");
    for month in &report.daylight {
        println!("{month}");
    }

    if let Some(ref path) = opts.events_out {
        export_events_csv(&report.events, project, path)?;
        eprintln!("Events written to {}", path.display());
    }
    if let Some(ref path) = opts.periods_out {
        export_periods_csv(&report.periods, project, path)?;
        eprintln!("Periods written to {}", path.display());
    }
    if let Some(ref path) = opts.summary_out {
        export_summary_json(&report, project, path)?;
        eprintln!("Summary written to {}", path.display());
    }
    Ok(())
}

fn main() {
    let opts = match cli::parse_args() {
        Ok(CliCommand::Run(opts)) => opts,
        Ok(CliCommand::Help) => {
            cli::print_usage();
            process::exit(0);
        }
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = init_tracing(opts.log_json) {
        eprintln!("warning: logging unavailable: {e}");
    }

    if let Err(e) = run(&opts) {
        eprintln!("error[{}]: {e}", e.kind());
        process::exit(1);
    }
}
