//! Error types for parameter validation, ancestry simulation,
//! haplotype output and the replicate sweep.

use std::path::PathBuf;

use thiserror::Error;

/// A model or sweep parameter failed validation.
///
/// Every variant names the offending field.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    /// Sizes, times and the sequence length must be strictly positive.
    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    /// Rates may be zero but not negative.
    #[error("{field} must be non-negative and finite, got {value}")]
    Negative { field: &'static str, value: f64 },

    /// `mig` encodes direction in its sign and magnitude in [0, 1].
    #[error("mig must lie in [-1, 1], got {0}")]
    MigrationOutOfRange(f64),

    #[error("exactly two sample sizes are required, got {0}")]
    WrongPopulationCount(usize),

    #[error("at least two samples are required in total, got {0}")]
    TooFewSamples(usize),

    /// The demographic model built from the parameters is inconsistent.
    #[error("invalid demographic model: {0}")]
    Model(#[from] ModelError),
}

/// A demographic model violates one of its structural invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("a demographic model needs at least one population")]
    NoPopulations,

    #[error("population {population} has invalid size {size}")]
    InvalidPopulationSize { population: usize, size: f64 },

    #[error("event {index} has invalid time {time}")]
    InvalidEventTime { index: usize, time: f64 },

    #[error("event {index} at time {time} precedes the previous event at time {previous}")]
    EventsOutOfOrder {
        index: usize,
        time: f64,
        previous: f64,
    },

    #[error("event {index} refers to population {population}, which does not exist")]
    UnknownPopulation { index: usize, population: usize },

    #[error("event {index} has mass migration proportion {proportion} outside [0, 1]")]
    InvalidProportion { index: usize, proportion: f64 },

    #[error("event {index} moves lineages from population {population} into itself")]
    SelfMigration { index: usize, population: usize },
}

/// The ancestry engine rejected a request or could not complete it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("at least two samples are required, got {0}")]
    InsufficientSamples(usize),

    #[error("sequence length must be a positive integer, got {0}")]
    InvalidSequenceLength(f64),

    #[error("{name} must be non-negative and finite, got {value}")]
    InvalidRate { name: &'static str, value: f64 },

    /// Lineages are left in populations that never merge again.
    #[error("{0} lineages remain that can never find a common ancestor")]
    NoCommonAncestor(usize),
}

/// Writing a haplotype matrix to disk failed.
#[derive(Debug, Error)]
#[error("failed to write haplotypes to {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The stage at which a single (migration rate, replicate) unit failed.
#[derive(Debug, Error)]
pub enum UnitErrorKind {
    #[error(transparent)]
    Parameters(#[from] ParameterError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Failure of one unit of work, with enough context to rerun it by hand.
#[derive(Debug, Error)]
#[error(
    "migration rate {migration_rate}, replicate {replicate} ({}): {kind}",
    .path.display()
)]
pub struct UnitError {
    pub migration_rate: f64,
    pub replicate: u32,
    pub path: PathBuf,
    #[source]
    pub kind: UnitErrorKind,
}

impl UnitError {
    /// Validation and engine errors are logic errors that would repeat on
    /// every replicate. Only output failures are worth skipping past.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind, UnitErrorKind::Write(_))
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid parameters: {0}")]
    Parameters(#[from] ParameterError),

    #[error("output directory {} does not exist or is not a directory", .0.display())]
    MissingOutputDirectory(PathBuf),

    #[error("migration rate {0} appears more than once")]
    DuplicateMigrationRate(f64),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
