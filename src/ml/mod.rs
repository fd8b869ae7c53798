//! Machine learning helpers for training and inference.
//!
//! These utilities are the building blocks shared by the trainer, predictor,
//! and evaluation binaries.

pub mod features;
pub mod gbrt;
pub mod metrics;
