//! Library exports for the perdiem training and inference tools.
/// Application directory helpers.
pub mod app_dirs;
/// Case file loading.
pub mod dataset;
/// Logging setup shared by the command-line tools.
pub mod logging;
/// Model training and inference building blocks.
pub mod ml;
