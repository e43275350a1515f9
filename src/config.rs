//! Sweep configuration, loadable from JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::parameters::{ModelParameters, SampleSizes};

/// How each replicate's random seed is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SeedPolicy {
    /// A fresh seed per replicate. Results are not reproducible
    /// beyond the seed each engine run records.
    #[default]
    Entropy,
    /// Seeds are a pure function of `base_seed`, the migration
    /// rate and the replicate index.
    Derived { base_seed: u64 },
}

/// What to do when writing one replicate fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure, keep going, and report it at the end.
    #[default]
    BestEffort,
    /// Stop the sweep at the first failure.
    FailFast,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Must exist before the sweep starts.
    pub output_directory: PathBuf,
    pub migration_rates: Vec<f64>,
    pub replicates: u32,
    /// `mig` is ignored here and replaced per migration rate.
    pub parameters: ModelParameters,
    pub sample_sizes: SampleSizes,
    pub recombination_rate: f64,
    pub seed_policy: SeedPolicy,
    pub failure_policy: FailurePolicy,
    /// Leave replicates whose output file already exists alone.
    pub skip_existing: bool,
    /// Worker threads; `None` or 1 runs replicates one after another.
    pub threads: Option<usize>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("haplotypes"),
            migration_rates: vec![1e-9, 0.1, 0.9],
            replicates: 10_000,
            parameters: ModelParameters::default(),
            sample_sizes: SampleSizes::default(),
            recombination_rate: 8.4e-9,
            seed_policy: SeedPolicy::default(),
            failure_policy: FailurePolicy::default(),
            skip_existing: false,
            threads: None,
        }
    }
}

impl SweepConfig {
    /// Reads a JSON file. Missing keys take their default values.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn num_units(&self) -> usize {
        self.migration_rates.len() * self.replicates as usize
    }
}
