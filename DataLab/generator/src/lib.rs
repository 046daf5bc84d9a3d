#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! DataLab generator – synthesizes a coherent gene-expression dataset with
//! balanced treatment groups, survival outcomes, and differential-expression
//! statistics from a scenario, overrides, and a seed.

/// Error taxonomy.
#[path = "../error.rs"]
pub mod error;

/// Parameter sets, scenario catalogue, and resolution.
#[path = "../params.rs"]
pub mod params;

/// Reproducible random streams.
#[path = "../rng.rs"]
pub mod rng;

/// Treated/Control assignment and sample metadata.
#[path = "../groups.rs"]
pub mod groups;

/// Correlated expression matrix synthesis.
#[path = "../expression.rs"]
pub mod expression;

/// Time-to-event synthesis with censoring.
#[path = "../survival.rs"]
pub mod survival;

/// Differential-expression statistics.
#[path = "../stats.rs"]
pub mod stats;

/// The generated dataset and its integrity checks.
#[path = "../dataset.rs"]
pub mod dataset;

/// Read-only projections consumed by the plot explorers.
#[path = "../views.rs"]
pub mod views;

/// TOML configuration documents.
#[path = "../config.rs"]
pub mod config;

/// Structured logging for generation runs.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Generation entry point.
#[path = "../main.rs"]
pub mod runtime;

pub use config::DataLabConfig;
pub use dataset::Dataset;
pub use error::GenerationError;
pub use params::{resolve, ParameterOverrides, ParameterSet};
pub use runtime::{DataLab, DataLabBuilder};
pub use telemetry::{GeneratorTelemetry, GeneratorTelemetryBuilder};
