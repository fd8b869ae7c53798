//! Trains and exports the reimbursement regression model.

use std::path::PathBuf;

use perdiem::dataset::loader::{LabeledCase, load_labeled_cases};
use perdiem::logging;
use perdiem::ml::features::{FEATURE_LEN, FEATURE_VERSION, feature_row};
use perdiem::ml::gbrt::{GbrtModel, TrainDataset, TrainOptions, train_gbrt};
use perdiem::ml::metrics::{ErrorStats, round_currency};

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

    let mut cases =
        load_labeled_cases(&options.dataset_path).map_err(|err| err.to_string())?;
    tracing::info!(
        "loaded {} labeled cases from {}",
        cases.len(),
        options.dataset_path.display()
    );

    // Sort for a stable holdout split regardless of file order.
    cases.sort_by(|a, b| {
        a.input
            .trip_duration_days
            .total_cmp(&b.input.trip_duration_days)
            .then(a.input.miles_traveled.total_cmp(&b.input.miles_traveled))
            .then(
                a.input
                    .total_receipts_amount
                    .total_cmp(&b.input.total_receipts_amount),
            )
    });
    let train_count = (((1.0 - options.holdout) * cases.len() as f64) as usize).max(1);
    let (train_cases, holdout_cases) = cases.split_at(train_count.min(cases.len()));

    let train_options = TrainOptions {
        rounds: options.rounds,
        learning_rate: options.learning_rate,
        max_depth: options.max_depth,
        bins: options.bins,
        min_leaf: options.min_leaf,
    };
    tracing::info!(
        "training on {} cases ({} held out), {} rounds, depth {}, learning rate {}",
        train_cases.len(),
        holdout_cases.len(),
        train_options.rounds,
        train_options.max_depth,
        train_options.learning_rate
    );
    let model = train_gbrt(&build_dataset(train_cases), &train_options)?;
    save_model(&options.model_out, &model)?;
    tracing::info!("model saved to {}", options.model_out.display());

    let train_stats = evaluate(&model, train_cases);
    println!("training cases: {}", train_cases.len());
    println!("training MAE: ${:.2}", train_stats.mean_abs_error());
    if holdout_cases.is_empty() {
        println!("holdout MAE: n/a (no holdout cases)");
    } else {
        let stats = evaluate(&model, holdout_cases);
        println!("holdout cases: {}", holdout_cases.len());
        println!("holdout MAE: ${:.2}", stats.mean_abs_error());
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
    }

    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    dataset_path: PathBuf,
    model_out: PathBuf,
    rounds: usize,
    learning_rate: f32,
    max_depth: usize,
    bins: usize,
    min_leaf: usize,
    holdout: f64,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut dataset_path = PathBuf::from("public_cases.json");
    let mut model_out = PathBuf::from("reimbursement_model.json");
    let defaults = TrainOptions::default();
    let mut rounds = defaults.rounds;
    let mut learning_rate = defaults.learning_rate;
    let mut max_depth = defaults.max_depth;
    let mut bins = defaults.bins;
    let mut min_leaf = defaults.min_leaf;
    let mut holdout = 0.2f64;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--dataset" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                dataset_path = PathBuf::from(value);
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                model_out = PathBuf::from(value);
            }
            "--rounds" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--rounds requires a value".to_string())?;
                rounds = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --rounds value: {value}"))?;
            }
            "--learning-rate" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--learning-rate requires a value".to_string())?;
                learning_rate = value
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid --learning-rate value: {value}"))?;
            }
            "--max-depth" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--max-depth requires a value".to_string())?;
                max_depth = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --max-depth value: {value}"))?;
            }
            "--bins" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--bins requires a value".to_string())?;
                bins = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --bins value: {value}"))?;
            }
            "--min-leaf" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--min-leaf requires a value".to_string())?;
                min_leaf = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --min-leaf value: {value}"))?;
            }
            "--holdout" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--holdout requires a value".to_string())?;
                holdout = value
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid --holdout value: {value}"))?;
                if !(0.0..1.0).contains(&holdout) {
                    return Err(format!("--holdout must be in [0, 1): {value}"));
                }
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(CliOptions {
        dataset_path,
        model_out,
        rounds,
        learning_rate,
        max_depth,
        bins,
        min_leaf,
        holdout,
    })
}

fn help_text() -> String {
    [
        "perdiem-train",
        "",
        "Trains a gradient-boosted regression-tree reimbursement model from a labeled case file.",
        "",
        "Usage:",
        "  perdiem-train [options]",
        "",
        "Options:",
        "  --dataset <file>       Labeled case file (default: public_cases.json).",
        "  --out <file>           Output model path (default: reimbursement_model.json).",
        "  --rounds <n>           Boosting rounds (default: 300).",
        "  --learning-rate <f32>  Learning rate (default: 0.05).",
        "  --max-depth <n>        Maximum tree depth (default: 4).",
        "  --bins <n>             Feature bin count for split search (default: 64).",
        "  --min-leaf <n>         Minimum samples per leaf (default: 4).",
        "  --holdout <f64>        Holdout fraction for error reporting (default: 0.2).",
    ]
    .join("\n")
}

fn build_dataset(cases: &[LabeledCase]) -> TrainDataset {
    let mut x = Vec::with_capacity(cases.len());
    let mut y = Vec::with_capacity(cases.len());
    for case in cases {
        x.push(feature_row(&case.input));
        y.push(case.expected_output as f32);
    }
    TrainDataset {
        feature_len: FEATURE_LEN,
        feature_version: FEATURE_VERSION,
        x,
        y,
    }
}

fn save_model(path: &PathBuf, model: &GbrtModel) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
    }
    let bytes = serde_json::to_vec_pretty(model).map_err(|err| err.to_string())?;
    std::fs::write(path, bytes).map_err(|err| err.to_string())
}

fn evaluate(model: &GbrtModel, cases: &[LabeledCase]) -> ErrorStats {
    let mut stats = ErrorStats::new();
    for case in cases {
        let predicted = round_currency(model.predict(&feature_row(&case.input)) as f64);
        stats.add(case.expected_output, predicted);
    }
    stats
}
