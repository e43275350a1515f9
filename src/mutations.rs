//! Neutral mutations placed on a finished genealogy.

use rand::prelude::Rng;
use rand::rngs::StdRng;

use crate::error::EngineError;
use crate::tables::{Edge, MutationRecord, Node};

/// Throws mutations onto each edge at `mutation_rate` per site
/// per generation.
///
/// Positions are continuous and uniform over the edge's interval,
/// so every mutation is a new segregating site.
pub(crate) fn generate_mutations(
    nodes: &[Node],
    edges: &[Edge],
    mutation_rate: f64,
    rng: &mut StdRng,
) -> Result<Vec<MutationRecord>, EngineError> {
    let mut rv = vec![];
    if mutation_rate == 0.0 {
        return Ok(rv);
    }
    for edge in edges {
        let left: i64 = edge.left.into();
        let right: i64 = edge.right.into();
        let branch_length = nodes[edge.parent].time - nodes[edge.child].time;
        let mean = mutation_rate * ((right - left) as f64) * branch_length;
        if mean <= 0.0 {
            continue;
        }
        let num_mutations = rand_distr::Poisson::new(mean).map_err(|_| EngineError::InvalidRate {
            name: "expected mutations per edge",
            value: mean,
        })?;
        // Dangerous if mean is very large,
        // but of little practical consequence
        let nmuts = rng.sample(num_mutations) as u64;
        if nmuts == 0 {
            continue;
        }
        let position_generator = rand::distributions::Uniform::new(left as f64, right as f64);
        for _ in 0..nmuts {
            rv.push(MutationRecord {
                position: rng.sample(position_generator),
                node: edge.child,
            });
        }
    }
    Ok(rv)
}
