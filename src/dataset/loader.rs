//! Case file loader for `public_cases.json`-style exports.
//!
//! A case file is a JSON array of records, each carrying an `input` object
//! with the three trip fields and, for labeled sets, an `expected_output`
//! reimbursement amount.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::ml::features::TripInput;

#[derive(Debug, Error)]
pub enum CaseLoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("case file contains no records")]
    Empty,
    #[error("case {index}: missing expected_output")]
    MissingLabel { index: usize },
    #[error("case {index}: expected_output must be finite")]
    InvalidLabel { index: usize },
    #[error("case {index}: {field} must be a finite, non-negative number")]
    InvalidInput { index: usize, field: &'static str },
}

/// One record from a case file. `expected_output` is absent in batch sets.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseRecord {
    /// Raw trip inputs.
    pub input: TripInput,
    /// Reimbursement label; required for training, optional for batch runs.
    #[serde(default)]
    pub expected_output: Option<f64>,
}

/// A labeled training example.
#[derive(Debug, Clone)]
pub struct LabeledCase {
    /// Raw trip inputs.
    pub input: TripInput,
    /// Reimbursement amount the model should learn to reproduce.
    pub expected_output: f64,
}

/// Load a case file without requiring labels, preserving file order.
///
/// Structural problems (unreadable file, malformed JSON, missing input
/// fields) are errors; value validation is left to the caller so batch runs
/// can degrade per record instead of aborting.
pub fn load_cases(path: &Path) -> Result<Vec<CaseRecord>, CaseLoadError> {
    let bytes = std::fs::read(path)?;
    let cases: Vec<CaseRecord> = serde_json::from_slice(&bytes)?;
    if cases.is_empty() {
        return Err(CaseLoadError::Empty);
    }
    Ok(cases)
}

/// Load a labeled training set, rejecting any incomplete or invalid record.
pub fn load_labeled_cases(path: &Path) -> Result<Vec<LabeledCase>, CaseLoadError> {
    let cases = load_cases(path)?;
    let mut out = Vec::with_capacity(cases.len());
    for (index, case) in cases.into_iter().enumerate() {
        validate_input(index, &case.input)?;
        let expected_output = case
            .expected_output
            .ok_or(CaseLoadError::MissingLabel { index })?;
        if !expected_output.is_finite() {
            return Err(CaseLoadError::InvalidLabel { index });
        }
        out.push(LabeledCase {
            input: case.input,
            expected_output,
        });
    }
    Ok(out)
}

fn validate_input(index: usize, input: &TripInput) -> Result<(), CaseLoadError> {
    let fields = [
        ("trip_duration_days", input.trip_duration_days),
        ("miles_traveled", input.miles_traveled),
        ("total_receipts_amount", input.total_receipts_amount),
    ];
    for (field, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(CaseLoadError::InvalidInput { index, field });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_cases(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_labeled_cases_in_file_order() {
        let (_dir, path) = write_cases(
            r#"[
  {"input": {"trip_duration_days": 1, "miles_traveled": 50, "total_receipts_amount": 10.0}, "expected_output": 45.0},
  {"input": {"trip_duration_days": 3, "miles_traveled": 200, "total_receipts_amount": 80.0}, "expected_output": 310.0}
]"#,
        );
        let cases = load_labeled_cases(&path).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].input.trip_duration_days, 1.0);
        assert_eq!(cases[0].expected_output, 45.0);
        assert_eq!(cases[1].input.miles_traveled, 200.0);
    }

    #[test]
    fn batch_load_tolerates_missing_labels() {
        let (_dir, path) = write_cases(
            r#"[{"input": {"trip_duration_days": 2, "miles_traveled": 90, "total_receipts_amount": 25.5}}]"#,
        );
        let cases = load_cases(&path).unwrap();
        assert_eq!(cases.len(), 1);
        assert!(cases[0].expected_output.is_none());
    }

    #[test]
    fn labeled_load_rejects_missing_label() {
        let (_dir, path) = write_cases(
            r#"[{"input": {"trip_duration_days": 2, "miles_traveled": 90, "total_receipts_amount": 25.5}}]"#,
        );
        let err = load_labeled_cases(&path).unwrap_err();
        assert!(matches!(err, CaseLoadError::MissingLabel { index: 0 }));
    }

    #[test]
    fn labeled_load_rejects_negative_input() {
        let (_dir, path) = write_cases(
            r#"[{"input": {"trip_duration_days": 2, "miles_traveled": -90, "total_receipts_amount": 25.5}, "expected_output": 100.0}]"#,
        );
        let err = load_labeled_cases(&path).unwrap_err();
        assert!(matches!(
            err,
            CaseLoadError::InvalidInput {
                index: 0,
                field: "miles_traveled"
            }
        ));
    }

    #[test]
    fn missing_input_field_is_a_parse_error() {
        let (_dir, path) = write_cases(
            r#"[{"input": {"trip_duration_days": 2, "miles_traveled": 90}, "expected_output": 100.0}]"#,
        );
        assert!(matches!(
            load_cases(&path).unwrap_err(),
            CaseLoadError::Json(_)
        ));
    }

    #[test]
    fn empty_file_is_rejected() {
        let (_dir, path) = write_cases("[]");
        assert!(matches!(load_cases(&path).unwrap_err(), CaseLoadError::Empty));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = load_cases(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CaseLoadError::Io(_)));
    }
}
