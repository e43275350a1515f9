//! The ancestry engine contract and the simulation runner.

use forrustts::prelude::*;
use rand::prelude::Rng;
use rand::SeedableRng;
use tracing::debug;

use crate::ancestry::simulate_ancestry;
use crate::demography::DemographicModel;
use crate::error::EngineError;
use crate::mutations::generate_mutations;
use crate::parameters::ModelParameters;
use crate::tables::{squash_edges, TreeSequence};

/// Everything an engine needs for one replicate.
#[derive(Copy, Clone, Debug)]
pub struct SimulationRequest<'a> {
    pub model: &'a DemographicModel,
    pub mutation_rate: f64,
    pub recombination_rate: f64,
    /// In base pairs.
    pub sequence_length: f64,
    /// `None` means a fresh random seed.
    pub seed: Option<u64>,
}

pub trait AncestryEngine {
    /// Simulates one genealogy with mutations.
    ///
    /// The same request with the same `Some(seed)` must give the
    /// same result.
    fn simulate(&self, request: &SimulationRequest<'_>) -> Result<TreeSequence, EngineError>;
}

/// Coalescent with recombination on a discrete genome.
///
/// Mutations follow infinite sites: each one gets a continuous
/// position and is reported as its own biallelic site.
#[derive(Copy, Clone, Debug, Default)]
pub struct HudsonEngine;

fn check_rate(name: &'static str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidRate { name, value })
    }
}

impl AncestryEngine for HudsonEngine {
    fn simulate(&self, request: &SimulationRequest<'_>) -> Result<TreeSequence, EngineError> {
        request.model.validate()?;
        let num_samples = request.model.num_samples();
        if num_samples < 2 {
            return Err(EngineError::InsufficientSamples(num_samples));
        }
        check_rate("mutation rate", request.mutation_rate)?;
        check_rate("recombination rate", request.recombination_rate)?;
        let length = request.sequence_length;
        if !(length.is_finite() && length >= 1.0 && length.fract() == 0.0) {
            return Err(EngineError::InvalidSequenceLength(length));
        }
        let sequence_length = Position::new_valid(length as i64);

        let seed = request.seed.unwrap_or_else(|| rand::thread_rng().gen());
        debug!(seed, num_samples, "starting ancestry simulation");
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

        let genealogy = simulate_ancestry(
            request.model,
            sequence_length,
            request.recombination_rate,
            &mut rng,
        )?;
        let edges = squash_edges(genealogy.edges);
        let mutations =
            generate_mutations(&genealogy.nodes, &edges, request.mutation_rate, &mut rng)?;
        debug!(
            seed,
            nodes = genealogy.nodes.len(),
            edges = edges.len(),
            mutations = mutations.len(),
            "finished ancestry simulation"
        );
        Ok(TreeSequence::new(
            genealogy.nodes,
            edges,
            mutations,
            num_samples,
            sequence_length,
            seed,
        ))
    }
}

/// Runs one replicate of `model`, taking the mutation rate and
/// sequence length from `params`.
///
/// The model is passed through untouched.
pub fn run_simulation<E: AncestryEngine + ?Sized>(
    engine: &E,
    model: &DemographicModel,
    params: &ModelParameters,
    recombination_rate: f64,
    seed: Option<u64>,
) -> Result<TreeSequence, EngineError> {
    let request = SimulationRequest {
        model,
        mutation_rate: params.mutation_rate,
        recombination_rate,
        sequence_length: params.length,
        seed,
    };
    engine.simulate(&request)
}
