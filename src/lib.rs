//! Synthetic haplotype data sets from a two-population
//! isolation-with-migration model.
//!
//! For each migration rate of a sweep, many independent coalescent
//! replicates are simulated and each one's haplotype matrix
//! (samples x variant sites) is written to its own tab-delimited file.
//!
//! The pipeline for one replicate is:
//!
//! 1. [`isolation_with_migration`] builds the [`DemographicModel`].
//! 2. [`run_simulation`] hands it to an [`AncestryEngine`]
//!    (by default [`HudsonEngine`]) and gets back a [`TreeSequence`].
//! 3. [`save_haplotypes`] transposes the genotypes and writes them.
//!
//! [`run_sweep`] drives that pipeline over every
//! (migration rate, replicate) pair of a [`SweepConfig`].

mod ancestry;
pub mod config;
pub mod demography;
pub mod engine;
pub mod error;
pub mod haplotypes;
mod mutations;
pub mod parameters;
pub mod sweep;
pub mod tables;

pub use config::{FailurePolicy, SeedPolicy, SweepConfig};
pub use demography::{
    isolation_with_migration, DemographicEvent, DemographicModel, PopulationConfiguration,
};
pub use engine::{run_simulation, AncestryEngine, HudsonEngine, SimulationRequest};
pub use error::{
    ConfigError, EngineError, ModelError, ParameterError, SweepError, UnitError, UnitErrorKind,
    WriteError,
};
pub use haplotypes::{save_haplotypes, GenotypeMatrix, HaplotypeMatrix};
pub use parameters::{ModelParameters, SampleSizes};
pub use sweep::{
    derive_seed, format_rate, output_file_name, run_sweep, run_unit, validate_sweep, work_units,
    SweepSummary, UnitOutcome, WorkUnit,
};
pub use tables::TreeSequence;
