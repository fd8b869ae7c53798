//! Feature engineering for reimbursement inputs.
//!
//! The feature vector layout is shared by training and inference; a model
//! fitted against one layout must never be applied to another, so the layout
//! carries a version that is stamped into every artifact and checked on load.

use serde::{Deserialize, Serialize};

/// Version of the feature vector layout below.
pub const FEATURE_VERSION: i64 = 1;
/// Number of `f32` values produced by [`feature_row`].
pub const FEATURE_LEN: usize = 18;

/// Raw trip inputs, in the order shared by case files and the predictor CLI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripInput {
    /// Trip length in days.
    pub trip_duration_days: f64,
    /// Distance traveled in miles.
    pub miles_traveled: f64,
    /// Total receipts amount in dollars.
    pub total_receipts_amount: f64,
}

impl TripInput {
    pub fn new(trip_duration_days: f64, miles_traveled: f64, total_receipts_amount: f64) -> Self {
        Self {
            trip_duration_days,
            miles_traveled,
            total_receipts_amount,
        }
    }
}

/// Expand raw inputs into the fixed-order feature vector.
///
/// Layout (version 1): the three raw inputs, per-day and per-mile ratios,
/// trip-length / receipt / mileage band indicators, and pairwise
/// interactions.
pub fn feature_row(input: &TripInput) -> Vec<f32> {
    let days = input.trip_duration_days;
    let miles = input.miles_traveled;
    let receipts = input.total_receipts_amount;
    let day_divisor = days.max(1.0);
    let mile_divisor = miles.max(1.0);

    let mut row = Vec::with_capacity(FEATURE_LEN);
    row.push(days as f32);
    row.push(miles as f32);
    row.push(receipts as f32);
    row.push((receipts / day_divisor) as f32);
    row.push((miles / day_divisor) as f32);
    row.push((receipts / mile_divisor) as f32);
    row.push(indicator(days <= 3.0));
    row.push(indicator(days > 3.0 && days <= 7.0));
    row.push(indicator(days > 7.0));
    row.push(indicator(receipts <= 500.0));
    row.push(indicator(receipts > 500.0 && receipts <= 1500.0));
    row.push(indicator(receipts > 1500.0));
    row.push(indicator(miles <= 300.0));
    row.push(indicator(miles > 300.0 && miles <= 800.0));
    row.push(indicator(miles > 800.0));
    row.push((days * miles) as f32);
    row.push((days * receipts) as f32);
    row.push((miles * receipts) as f32);
    row
}

fn indicator(condition: bool) -> f32 {
    if condition { 1.0 } else { 0.0 }
}
