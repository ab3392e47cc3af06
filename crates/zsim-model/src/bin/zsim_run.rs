#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use zsim_model::{
    Compartment, Forcing, ForcingMode, PulseSpec, ScenarioConfig, SimulationOutcome,
    ValidityPolicy,
};
use zsim_runtime::{init_tracing, now_unix_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeName {
    Additive,
    Subtractive,
    Dampening,
}

#[derive(Debug, Clone, Default)]
struct PulseOverrides {
    magnitude: Option<f64>,
    interval: Option<u64>,
    mode: Option<ModeName>,
    target: Option<Compartment>,
}

impl PulseOverrides {
    fn is_empty(&self) -> bool {
        self.magnitude.is_none()
            && self.interval.is_none()
            && self.mode.is_none()
            && self.target.is_none()
    }

    fn apply(&self, base: Option<Forcing>) -> Option<Forcing> {
        if self.is_empty() {
            return base;
        }
        let current = base.unwrap_or(Forcing::additive(Compartment::Military, 0.0, 0));
        let (current_mode, current_target) = match current.mode {
            ForcingMode::Additive { target } => (ModeName::Additive, Some(target)),
            ForcingMode::Subtractive { target } => (ModeName::Subtractive, Some(target)),
            ForcingMode::MultiplicativeDampening => (ModeName::Dampening, None),
        };
        let target = self
            .target
            .or(current_target)
            .unwrap_or(Compartment::Military);
        let mode = match self.mode.unwrap_or(current_mode) {
            ModeName::Additive => ForcingMode::Additive { target },
            ModeName::Subtractive => ForcingMode::Subtractive { target },
            ModeName::Dampening => ForcingMode::MultiplicativeDampening,
        };
        Some(Forcing {
            pulse: PulseSpec::new(
                self.magnitude.unwrap_or(current.pulse.magnitude),
                self.interval.unwrap_or(current.pulse.interval),
            ),
            mode,
        })
    }
}

#[derive(Debug, Clone, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    steps: Option<usize>,
    dt: Option<f64>,
    policy: Option<ValidityPolicy>,
    pulse: PulseOverrides,
    baseline: bool,
    log_json: bool,
}

#[derive(Debug, Clone)]
enum CliParseError {
    Help,
    Message(String),
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, CliParseError> {
    args.get(index + 1)
        .map(String::as_str)
        .ok_or_else(|| CliParseError::Message(format!("missing value for {flag}")))
}

fn parse_number<T: FromStr>(flag: &str, raw: &str) -> Result<T, CliParseError> {
    raw.parse()
        .map_err(|_| CliParseError::Message(format!("invalid value `{raw}` for {flag}")))
}

fn parse_cli_args(args: &[String]) -> Result<CliArgs, CliParseError> {
    let mut parsed = CliArgs::default();

    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        match flag {
            "-h" | "--help" => return Err(CliParseError::Help),
            "--baseline" => {
                parsed.baseline = true;
                index += 1;
                continue;
            }
            "--log-json" => {
                parsed.log_json = true;
                index += 1;
                continue;
            }
            _ => {}
        }

        let value = flag_value(args, index, flag)?;
        match flag {
            "--config" => parsed.config = Some(PathBuf::from(value)),
            "--steps" => parsed.steps = Some(parse_number(flag, value)?),
            "--dt" => parsed.dt = Some(parse_number(flag, value)?),
            "--policy" => {
                parsed.policy = Some(ValidityPolicy::parse(value).ok_or_else(|| {
                    CliParseError::Message(format!("unknown policy `{value}`"))
                })?);
            }
            "--pulse-magnitude" => parsed.pulse.magnitude = Some(parse_number(flag, value)?),
            "--pulse-interval" => parsed.pulse.interval = Some(parse_number(flag, value)?),
            "--pulse-mode" => {
                parsed.pulse.mode = Some(match value {
                    "additive" => ModeName::Additive,
                    "subtractive" => ModeName::Subtractive,
                    "dampening" => ModeName::Dampening,
                    other => {
                        return Err(CliParseError::Message(format!(
                            "unknown pulse mode `{other}`"
                        )));
                    }
                });
            }
            "--pulse-target" => {
                parsed.pulse.target = Some(Compartment::parse(value).ok_or_else(|| {
                    CliParseError::Message(format!("unknown compartment `{value}`"))
                })?);
            }
            unknown => {
                return Err(CliParseError::Message(format!(
                    "unrecognized argument `{unknown}`"
                )));
            }
        }
        index += 2;
    }

    Ok(parsed)
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {program} [--config <path>] [--steps <n>] [--dt <x>] [--policy abort|clamp] [pulse options] [--baseline] [--log-json]"
    );
    eprintln!("  --config <path>             JSON scenario (defaults to the coexistence scenario)");
    eprintln!("  --steps <n>                 number of steps");
    eprintln!("  --dt <x>                    step size");
    eprintln!("  --policy abort|clamp        discrete handling of negative populations");
    eprintln!("  --pulse-magnitude <x>       pulse size (fraction for subtractive/dampening)");
    eprintln!("  --pulse-interval <k>        steps between pulses, 0 disables");
    eprintln!("  --pulse-mode additive|subtractive|dampening");
    eprintln!("  --pulse-target civilians|zombies|military|dead");
    eprintln!("  --baseline                  also run without forcing");
    eprintln!("  --log-json                  print a one-line JSON summary per run");
}

fn print_outcome(outcome: &SimulationOutcome) {
    for report in outcome.report() {
        print!("{report}");
    }
    if let Some(divergence) = outcome.final_divergence() {
        let worst = divergence.iter().copied().fold(0.0_f64, f64::max);
        println!("max relative divergence: {worst:.4}");
    }
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let program = argv
        .first()
        .cloned()
        .unwrap_or_else(|| String::from("zsim_run"));

    let args = match parse_cli_args(argv.get(1..).unwrap_or_default()) {
        Ok(args) => args,
        Err(CliParseError::Help) => {
            print_usage(&program);
            return ExitCode::SUCCESS;
        }
        Err(CliParseError::Message(message)) => {
            eprintln!("{message}");
            print_usage(&program);
            return ExitCode::from(2);
        }
    };

    init_tracing("info");

    let mut config = match &args.config {
        Some(path) => match ScenarioConfig::load(path) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("configuration error: {error}");
                return ExitCode::from(2);
            }
        },
        None => ScenarioConfig::default(),
    };
    if let Some(steps) = args.steps {
        config.horizon.steps = steps;
    }
    if let Some(dt) = args.dt {
        config.horizon.dt = dt;
    }
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    config.forcing = args.pulse.apply(config.forcing);

    let runner = match config.build_runner() {
        Ok(runner) => runner,
        Err(error) => {
            eprintln!("configuration error: {error}");
            return ExitCode::from(2);
        }
    };

    let runs: Vec<(&str, Result<SimulationOutcome, _>)> = if args.baseline {
        let Some(forcing) = config.forcing else {
            eprintln!("--baseline needs a forcing (config or --pulse-* options)");
            return ExitCode::from(2);
        };
        match runner.execute_with_baseline(
            &config.parameters,
            &config.initial,
            config.horizon,
            &forcing,
        ) {
            Ok(comparison) => vec![
                ("forced", Ok(comparison.forced)),
                ("baseline", Ok(comparison.baseline)),
            ],
            Err(error) => vec![("forced", Err(error))],
        }
    } else {
        vec![(
            "scenario",
            runner.execute(
                &config.parameters,
                &config.initial,
                config.horizon,
                config.forcing.as_ref(),
            ),
        )]
    };

    let run_id = now_unix_ms();
    let mut all_ok = true;
    for (name, run) in runs {
        let outcome = match run {
            Ok(outcome) => outcome,
            Err(error) => {
                eprintln!("configuration error: {error}");
                return ExitCode::from(2);
            }
        };
        println!("== {name} ==");
        print_outcome(&outcome);
        if args.log_json {
            println!(
                "{}",
                outcome
                    .log_entry(&format!("zsim-run-{run_id}-{name}"))
                    .to_json_line()
            );
        }
        all_ok &= outcome.both_succeeded();
    }

    if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_cli_parse_flags() {
        let args = parse_cli_args(&argv(&[
            "--steps",
            "300",
            "--dt",
            "0.5",
            "--policy",
            "clamp",
            "--pulse-magnitude",
            "10",
            "--pulse-interval",
            "100",
            "--pulse-target",
            "zombies",
            "--pulse-mode",
            "subtractive",
            "--baseline",
        ]))
        .expect("valid flags");
        assert_eq!(args.steps, Some(300));
        assert_eq!(args.dt, Some(0.5));
        assert_eq!(args.policy, Some(ValidityPolicy::Clamp));
        assert!(args.baseline);
        assert_eq!(
            args.pulse.apply(None),
            Some(Forcing::subtractive(Compartment::Zombies, 10.0, 100))
        );
    }

    #[test]
    fn test_cli_parse_errors() {
        assert!(matches!(parse_cli_args(&argv(&["-h"])), Err(CliParseError::Help)));
        assert!(matches!(
            parse_cli_args(&argv(&["--steps"])),
            Err(CliParseError::Message(_))
        ));
        assert!(matches!(
            parse_cli_args(&argv(&["--steps", "many"])),
            Err(CliParseError::Message(_))
        ));
        assert!(matches!(
            parse_cli_args(&argv(&["--pulse-mode", "explode"])),
            Err(CliParseError::Message(_))
        ));
        assert!(matches!(
            parse_cli_args(&argv(&["--frobnicate", "1"])),
            Err(CliParseError::Message(_))
        ));
    }

    #[test]
    fn test_cli_pulse_overrides_keep_config_values() {
        let base = Forcing::additive(Compartment::Military, 10.0, 300);
        let overrides = PulseOverrides {
            interval: Some(150),
            ..PulseOverrides::default()
        };
        assert_eq!(
            overrides.apply(Some(base)),
            Some(Forcing::additive(Compartment::Military, 10.0, 150))
        );
        assert_eq!(PulseOverrides::default().apply(Some(base)), Some(base));
        assert_eq!(PulseOverrides::default().apply(None), None);
    }
}
