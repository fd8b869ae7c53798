//! Prints one reimbursement estimate for one trip.
//!
//! Stdout carries exactly one number with two decimal places on success and
//! nothing at all on failure, so callers can tell the two apart purely by
//! output format. Diagnostics go to stderr.

use std::path::PathBuf;

use perdiem::ml::features::{TripInput, feature_row};
use perdiem::ml::gbrt::GbrtModel;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let model = GbrtModel::load_json(&options.model_path)?;
    let estimate = model.predict(&feature_row(&options.input)) as f64;
    if !estimate.is_finite() {
        return Err("Model produced a non-finite estimate".to_string());
    }
    println!("{estimate:.2}");
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    model_path: PathBuf,
    input: TripInput,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut model_path = PathBuf::from("reimbursement_model.json");
    let mut positionals: Vec<String> = Vec::new();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model_path = PathBuf::from(value);
            }
            value if value.starts_with("--") => {
                return Err(format!("Unknown argument: {value}\n\n{}", help_text()));
            }
            value => positionals.push(value.to_string()),
        }
        idx += 1;
    }

    if positionals.len() != 3 {
        return Err(format!(
            "Expected exactly 3 arguments (trip_duration_days, miles_traveled, total_receipts_amount), got {}\n\n{}",
            positionals.len(),
            help_text()
        ));
    }
    let trip_duration_days = parse_number("trip_duration_days", &positionals[0])?;
    let miles_traveled = parse_number("miles_traveled", &positionals[1])?;
    let total_receipts_amount = parse_number("total_receipts_amount", &positionals[2])?;

    Ok(CliOptions {
        model_path,
        input: TripInput::new(trip_duration_days, miles_traveled, total_receipts_amount),
    })
}

fn parse_number(name: &str, value: &str) -> Result<f64, String> {
    let parsed = value
        .parse::<f64>()
        .map_err(|_| format!("Invalid {name} value: {value}"))?;
    if !parsed.is_finite() {
        return Err(format!("Invalid {name} value: {value}"));
    }
    Ok(parsed)
}

fn help_text() -> String {
    [
        "perdiem-predict",
        "",
        "Prints the estimated reimbursement for one trip.",
        "",
        "Usage:",
        "  perdiem-predict [--model <file>] <trip_duration_days> <miles_traveled> <total_receipts_amount>",
        "",
        "Options:",
        "  --model <file>  Model artifact path (default: reimbursement_model.json).",
    ]
    .join("\n")
}
