use std::env;
use std::path::PathBuf;

/// Options for one analysis run of the `glare-sim` binary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub project: PathBuf,
    pub config: Option<PathBuf>,
    pub preset: Option<String>,
    pub profiles: Option<PathBuf>,
    pub year: Option<i32>,
    pub events_out: Option<PathBuf>,
    pub periods_out: Option<PathBuf>,
    pub summary_out: Option<PathBuf>,
    pub serial: bool,
    pub log_json: bool,
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Run(CliOptions),
    Help,
}

/// Parses the process arguments.
///
/// # Errors
///
/// Returns a message naming the offending argument.
pub fn parse_args() -> Result<CliCommand, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

/// Parses an argument list without the program name.
///
/// # Errors
///
/// Returns a message naming the offending argument.
pub fn parse_args_from(args: Vec<String>) -> Result<CliCommand, String> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(CliCommand::Help);
    }
    parse_options(&args).map(CliCommand::Run)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut project = None;
    let mut opts = CliOptions::default();

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--project" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --project (expected a JSON file path)",
                )?;
                if project.replace(PathBuf::from(path)).is_some() {
                    return Err(once(flag));
                }
            }
            "--config" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --config (expected a TOML file path)",
                )?;
                if opts.config.replace(PathBuf::from(path)).is_some() {
                    return Err(once(flag));
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(
                    i,
                    "missing value for --preset (expected a preset name)",
                )?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err(once(flag));
                }
            }
            "--profiles" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --profiles (expected a CSV file path)",
                )?;
                if opts.profiles.replace(PathBuf::from(path)).is_some() {
                    return Err(once(flag));
                }
            }
            "--year" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --year (expected an integer)")?;
                let year = raw
                    .parse::<i32>()
                    .map_err(|_| format!("--year value \"{raw}\" is not a valid year"))?;
                if opts.year.replace(year).is_some() {
                    return Err(once(flag));
                }
            }
            "--events-out" | "--periods-out" | "--summary-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    &format!("missing value for {flag} (expected a file path)"),
                )?;
                let slot = match flag {
                    "--events-out" => &mut opts.events_out,
                    "--periods-out" => &mut opts.periods_out,
                    _ => &mut opts.summary_out,
                };
                if slot.replace(PathBuf::from(path)).is_some() {
                    return Err(once(flag));
                }
            }
            "--serial" => opts.serial = true,
            "--log-json" => opts.log_json = true,
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.config.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--config` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    opts.project = project.ok_or_else(|| "missing required argument --project".to_string())?;
    Ok(opts)
}

fn once(flag: &str) -> String {
    format!("{flag} provided more than once")
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("glare-sim - reflected-sunlight glare analysis for PV installations");
    eprintln!();
    eprintln!("Usage: glare-sim --project <path> [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --project <path>       Project input JSON (required)");
    eprintln!("  --config <path>        Analysis config TOML");
    eprintln!("  --preset <name>        Built-in config preset (standard, screening, detailed)");
    eprintln!("  --profiles <path>      Reflection-profile CSV (default: built-in curves)");
    eprintln!("  --year <i32>           Analysis year (default: current UTC year)");
    eprintln!("  --events-out <path>    Write glare events CSV");
    eprintln!("  --periods-out <path>   Write glare periods CSV");
    eprintln!("  --summary-out <path>   Write JSON statistics summary");
    eprintln!("  --serial               Disable the worker pool");
    eprintln!("  --log-json             Emit logs as JSON lines");
    eprintln!("  --help                 Show this help message");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG                 Log filter (default: info)");
    eprintln!("  GLARE_<SECTION>__<KEY>   Config override, e.g. GLARE_ANALYSIS__YEAR=2024");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(list: &[&str]) -> Result<CliOptions, String> {
        match parse_args_from(args(list))? {
            CliCommand::Run(opts) => Ok(opts),
            CliCommand::Help => Err("help".to_string()),
        }
    }

    #[test]
    fn parses_full_command_line() {
        let opts = run(&[
            "--project",
            "site.json",
            "--preset",
            "detailed",
            "--year",
            "2026",
            "--events-out",
            "events.csv",
            "--summary-out",
            "summary.json",
            "--serial",
            "--log-json",
        ]);
        let opts = opts.unwrap_or_default();
        assert_eq!(opts.project, PathBuf::from("site.json"));
        assert_eq!(opts.preset.as_deref(), Some("detailed"));
        assert_eq!(opts.year, Some(2026));
        assert_eq!(opts.events_out, Some(PathBuf::from("events.csv")));
        assert_eq!(opts.summary_out, Some(PathBuf::from("summary.json")));
        assert!(opts.periods_out.is_none());
        assert!(opts.serial && opts.log_json);
    }

    #[test]
    fn project_is_required() {
        let err = run(&["--serial"]).err();
        assert_eq!(err.as_deref(), Some("missing required argument --project"));
    }

    #[test]
    fn config_and_preset_are_exclusive() {
        let err = run(&["--project", "p.json", "--config", "a.toml", "--preset", "standard"]).err();
        assert!(err.is_some_and(|e| e.contains("mutually exclusive")));
    }

    #[test]
    fn repeated_flag_is_rejected() {
        let err = run(&["--project", "a.json", "--project", "b.json"]).err();
        assert_eq!(err.as_deref(), Some("--project provided more than once"));
    }

    #[test]
    fn missing_value_and_bad_year() {
        assert!(run(&["--project"]).is_err_and(|e| e.starts_with("missing value for --project")));
        assert!(run(&["--project", "p.json", "--year", "soon"]).is_err_and(|e| e.contains("soon")));
    }

    #[test]
    fn unknown_argument_is_named() {
        let err = run(&["--project", "p.json", "--fast"]).err();
        assert_eq!(err.as_deref(), Some("unknown argument: --fast"));
    }

    #[test]
    fn help_wins_over_everything() {
        assert_eq!(parse_args_from(args(&["--bogus", "-h"])), Ok(CliCommand::Help));
    }
}
