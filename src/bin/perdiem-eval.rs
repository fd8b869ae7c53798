//! Evaluates a trained model against a labeled case file.

use std::path::PathBuf;

use perdiem::dataset::loader::load_labeled_cases;
use perdiem::logging;
use perdiem::ml::features::{TripInput, feature_row};
use perdiem::ml::gbrt::GbrtModel;
use perdiem::ml::metrics::{ErrorStats, round_currency};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    model_path: PathBuf,
    dataset_path: PathBuf,
    top: usize,
}

#[derive(Debug, Clone)]
struct CaseError {
    index: usize,
    input: TripInput,
    expected: f64,
    predicted: f64,
    abs_error: f64,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let model = GbrtModel::load_json(&options.model_path)?;
    let cases = load_labeled_cases(&options.dataset_path).map_err(|err| err.to_string())?;
    tracing::info!(
        "evaluating {} against {} cases from {}",
        options.model_path.display(),
        cases.len(),
        options.dataset_path.display()
    );

    let mut stats = ErrorStats::new();
    let mut errors = Vec::with_capacity(cases.len());
    for (index, case) in cases.iter().enumerate() {
        let predicted = round_currency(model.predict(&feature_row(&case.input)) as f64);
        stats.add(case.expected_output, predicted);
        errors.push(CaseError {
            index,
            input: case.input,
            expected: case.expected_output,
            predicted,
            abs_error: (case.expected_output - predicted).abs(),
        });
    }

    println!("cases: {}", stats.n);
    println!("mean absolute error: ${:.2}", stats.mean_abs_error());
    println!(
        "root mean squared error: ${:.2}",
        stats.root_mean_squared_error()
    );
    println!("max error: ${:.2}", stats.max_abs_error);
    println!(
        "exact matches (+/-$0.01): {} ({:.2}%)",
        stats.exact_matches,
        stats.exact_rate() * 100.0
    );
    println!(
        "close matches (+/-$1.00): {} ({:.2}%)",
        stats.close_matches,
        stats.close_rate() * 100.0
    );

    errors.sort_by(|a, b| b.abs_error.total_cmp(&a.abs_error));
    if !errors.is_empty() && options.top > 0 {
        println!();
        println!("Worst cases:");
        for case in errors.iter().take(options.top) {
            println!(
                "- case {:>4}  days={} miles={} receipts={:.2}  expected={:.2} predicted={:.2} error={:.2}",
                case.index,
                case.input.trip_duration_days,
                case.input.miles_traveled,
                case.input.total_receipts_amount,
                case.expected,
                case.predicted,
                case.abs_error
            );
        }
    }

    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut model_path = PathBuf::from("reimbursement_model.json");
    let mut dataset_path = PathBuf::from("public_cases.json");
    let mut top = 5usize;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model_path = PathBuf::from(value);
            }
            "--dataset" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                dataset_path = PathBuf::from(value);
            }
            "--top" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--top requires a value".to_string())?;
                top = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --top value: {value}"))?;
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(CliOptions {
        model_path,
        dataset_path,
        top,
    })
}

fn help_text() -> String {
    [
        "perdiem-eval",
        "",
        "Reports aggregate error statistics for a model over a labeled case file.",
        "",
        "Usage:",
        "  perdiem-eval [options]",
        "",
        "Options:",
        "  --model <file>    Model artifact path (default: reimbursement_model.json).",
        "  --dataset <file>  Labeled case file (default: public_cases.json).",
        "  --top <n>         Number of worst cases to list (default: 5).",
    ]
    .join("\n")
}
