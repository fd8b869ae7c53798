//! Runs the model over a case file and writes one result line per record.
//!
//! Output preserves input order: each line is either the prediction with two
//! decimal places or the literal sentinel `ERROR` when that record failed.
//! A per-record failure never aborts the batch; a missing model or an
//! unreadable case file does.

use std::io::Write;
use std::path::PathBuf;

use perdiem::dataset::loader::load_cases;
use perdiem::logging;
use perdiem::ml::features::feature_row;
use perdiem::ml::gbrt::GbrtModel;

const ERROR_SENTINEL: &str = "ERROR";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let model = GbrtModel::load_json(&options.model_path)?;
    let cases = load_cases(&options.cases_path).map_err(|err| err.to_string())?;
    tracing::info!(
        "running {} over {} cases from {}",
        options.model_path.display(),
        cases.len(),
        options.cases_path.display()
    );

    let mut lines = Vec::with_capacity(cases.len());
    let mut failures = 0usize;
    for case in &cases {
        let estimate = model.predict(&feature_row(&case.input)) as f64;
        if estimate.is_finite() {
            lines.push(format!("{estimate:.2}"));
        } else {
            lines.push(ERROR_SENTINEL.to_string());
            failures += 1;
        }
    }

    write_results(&options.results_out, &lines)?;
    if failures > 0 {
        tracing::warn!("{failures} of {} cases failed", cases.len());
    }
    println!(
        "wrote {} results to {} ({} errors)",
        lines.len(),
        options.results_out.display(),
        failures
    );

    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    model_path: PathBuf,
    cases_path: PathBuf,
    results_out: PathBuf,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut model_path = PathBuf::from("reimbursement_model.json");
    let mut cases_path = PathBuf::from("private_cases.json");
    let mut results_out = PathBuf::from("private_results.txt");

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model_path = PathBuf::from(value);
            }
            "--cases" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--cases requires a value".to_string())?;
                cases_path = PathBuf::from(value);
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                results_out = PathBuf::from(value);
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(CliOptions {
        model_path,
        cases_path,
        results_out,
    })
}

fn help_text() -> String {
    [
        "perdiem-batch",
        "",
        "Writes one prediction (or ERROR) per case, in input order.",
        "",
        "Usage:",
        "  perdiem-batch [options]",
        "",
        "Options:",
        "  --model <file>  Model artifact path (default: reimbursement_model.json).",
        "  --cases <file>  Case file; labels are ignored (default: private_cases.json).",
        "  --out <file>    Results file, one line per case (default: private_results.txt).",
    ]
    .join("\n")
}

fn write_results(path: &PathBuf, lines: &[String]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
    }
    let mut file = std::fs::File::create(path).map_err(|err| err.to_string())?;
    for line in lines {
        writeln!(file, "{line}").map_err(|err| err.to_string())?;
    }
    Ok(())
}
