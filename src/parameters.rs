//! Parameters of the two-population isolation-with-migration model.

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Named scalars of the isolation-with-migration scenario.
///
/// Sizes are diploid effective sizes and times are in generations.
/// The serialized names match the keys of the reference parameter set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(rename = "N1")]
    pub n1: f64,
    #[serde(rename = "N2")]
    pub n2: f64,
    #[serde(rename = "T_split")]
    pub t_split: f64,
    #[serde(rename = "N_anc")]
    pub n_anc: f64,
    /// Per-site, per-generation mutation rate.
    #[serde(rename = "mut")]
    pub mutation_rate: f64,
    /// Sequence length in base pairs.
    pub length: f64,
    /// Signed pulse proportion: the sign picks the direction,
    /// the magnitude the fraction of lineages moved.
    #[serde(default)]
    pub mig: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            n1: 158_124_480.0,
            n2: 54_259_530.0,
            t_split: 1018.0,
            n_anc: 7_148_911.0,
            mutation_rate: 3.5e-9,
            length: 1e4,
            mig: 0.0,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::NotPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ParameterError::Negative { field, value })
    }
}

impl ModelParameters {
    pub fn validate(self) -> Result<Self, ParameterError> {
        positive("N1", self.n1)?;
        positive("N2", self.n2)?;
        positive("T_split", self.t_split)?;
        positive("N_anc", self.n_anc)?;
        non_negative("mut", self.mutation_rate)?;
        positive("length", self.length)?;
        if !(-1.0..=1.0).contains(&self.mig) {
            return Err(ParameterError::MigrationOutOfRange(self.mig));
        }
        Ok(self)
    }

    /// A copy of these parameters with `mig` replaced.
    ///
    /// The base set is never modified, so each unit of work
    /// can own its own snapshot.
    pub fn with_migration(&self, mig: f64) -> Self {
        Self { mig, ..*self }
    }
}

/// Number of sampled haploid genomes in each of the two populations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct SampleSizes([u32; 2]);

impl SampleSizes {
    pub fn new(first: u32, second: u32) -> Self {
        Self([first, second])
    }

    pub fn get(&self, population: usize) -> Option<u32> {
        self.0.get(population).copied()
    }

    pub fn as_array(&self) -> [u32; 2] {
        self.0
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|&n| n as usize).sum()
    }

    /// A genealogy needs at least two samples, so `[0, 0]` and
    /// single-sample configurations are rejected here.
    pub fn validate(self) -> Result<Self, ParameterError> {
        if self.total() < 2 {
            return Err(ParameterError::TooFewSamples(self.total()));
        }
        Ok(self)
    }
}

impl Default for SampleSizes {
    fn default() -> Self {
        Self([50, 50])
    }
}

impl TryFrom<&[u32]> for SampleSizes {
    type Error = ParameterError;

    fn try_from(value: &[u32]) -> Result<Self, Self::Error> {
        match value {
            [first, second] => Ok(Self([*first, *second])),
            _ => Err(ParameterError::WrongPopulationCount(value.len())),
        }
    }
}

impl TryFrom<Vec<u32>> for SampleSizes {
    type Error = ParameterError;

    fn try_from(value: Vec<u32>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

impl From<SampleSizes> for Vec<u32> {
    fn from(value: SampleSizes) -> Self {
        value.0.to_vec()
    }
}
