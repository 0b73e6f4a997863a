//! loan-replay CLI
//!
//! Play loan histories from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Replay a scenario and print the final schedule
//! loan-replay run --input scenario.json
//!
//! # Output as JSON
//! loan-replay run --input scenario.json --format json
//!
//! # Print the re-age template after the scenario
//! loan-replay template --input scenario.json
//!
//! # Generate a random history for testing
//! loan-replay generate --repayments 20 --seed 42
//! ```

use loan_replay::config::load_json;
use loan_replay::simulation::history::{generate_random_history, HistoryConfig};
use loan_replay::simulation::script::{run_scenario, Scenario, ScenarioReport, ScenarioStep, StepAction};
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"loan-replay - loan ledger with replay, re-aging and reversals

USAGE:
    loan-replay <COMMAND> [OPTIONS]

COMMANDS:
    run         Replay a scenario and print the resulting loan
    template    Replay a scenario and print the re-age template on its last date
    generate    Generate a random loan history (for testing)
    help        Show this message

OPTIONS (run, template):
    --input <FILE>      Path to JSON scenario file
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (generate):
    --repayments <N>    Number of repayments (default: 12)
    --seed <N>          Random seed (default: 7)
    --undo              Undo the generated re-age
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    loan-replay run --input scenario.json
    loan-replay run --input scenario.json --format json
    loan-replay template --input scenario.json
    loan-replay generate --repayments 20 --seed 42 --output history.json"#
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

fn parse_input_args(args: &[String]) -> (String, OutputFormat) {
    let mut input_path = None;
    let mut format = OutputFormat::Text;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--input requires a file path");
                    process::exit(1);
                }));
            }
            "--format" => {
                i += 1;
                format = args
                    .get(i)
                    .and_then(|s| OutputFormat::parse(s))
                    .unwrap_or_else(|| {
                        eprintln!("--format requires 'text' or 'json'");
                        process::exit(1);
                    });
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });
    (path, format)
}

fn load_scenario(path: &str) -> Scenario {
    load_json(path).unwrap_or_else(|e| {
        eprintln!("Error loading scenario '{}': {}", path, e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "principal": "1250",
  "steps": [
    {{ "on": "2023-01-01", "action": "disburse", "amount": "1250" }},
    {{ "on": "2023-02-01", "action": "repay", "amount": "312.5", "external_id": "pay-1" }}
  ]
}}"#
        );
        process::exit(1);
    })
}

fn play(scenario: &Scenario) -> ScenarioReport {
    run_scenario(scenario).unwrap_or_else(|e| {
        eprintln!("Scenario failed: {}", e);
        process::exit(1);
    })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn cmd_run(args: &[String]) {
    let (path, format) = parse_input_args(args);
    let report = play(&load_scenario(&path));

    if format == OutputFormat::Json {
        print_json(&report);
    } else {
        print!("{}", report);
    }
}

fn cmd_template(args: &[String]) {
    let (path, format) = parse_input_args(args);
    let mut scenario = load_scenario(&path);
    let last = scenario.steps.last().map(|s| s.on).unwrap_or_else(|| {
        eprintln!("Scenario has no steps");
        process::exit(1);
    });
    scenario
        .steps
        .push(ScenarioStep::new(last, StepAction::Template));

    let report = play(&scenario);
    let Some(record) = report.templates.last() else {
        eprintln!("No template was produced");
        process::exit(1);
    };

    if format == OutputFormat::Json {
        print_json(&record.template);
    } else {
        println!("Loan {} on {}:", report.snapshot.loan_id, record.on);
        print!("{}", record.template);
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = HistoryConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--repayments" => {
                i += 1;
                config.repayments = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--repayments requires a number");
                        process::exit(1);
                    });
            }
            "--seed" => {
                i += 1;
                config.seed = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--seed requires a number");
                        process::exit(1);
                    });
            }
            "--undo" => config.undo_re_age = true,
            "--output" => {
                i += 1;
                output_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--output requires a file path");
                    process::exit(1);
                }));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let scenario = generate_random_history(&config);
    let json = serde_json::to_string_pretty(&scenario).unwrap_or_else(|e| {
        eprintln!("Error serializing scenario: {}", e);
        process::exit(1);
    });

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} steps from seed {} -> {}",
            scenario.steps.len(),
            config.seed,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "run" => cmd_run(rest),
        "template" => cmd_template(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("yaml"), None);
        assert_eq!(OutputFormat::parse("JSON"), None);
    }

    #[test]
    fn test_format_defaults_to_text() {
        let args = vec!["--input".to_string(), "scenario.json".to_string()];
        assert_eq!(
            parse_input_args(&args),
            ("scenario.json".to_string(), OutputFormat::Text)
        );
    }
}
