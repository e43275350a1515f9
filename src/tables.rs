//! Node, edge and mutation records of a simulated genealogy,
//! and the [`TreeSequence`] handle handed back by an engine.

use forrustts::prelude::*;

use crate::haplotypes::GenotypeMatrix;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Node {
    /// Generations before the present.
    pub time: f64,
    pub population: usize,
}

/// `parent` is the ancestor of `child` over `[left, right)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Edge {
    pub left: Position,
    pub right: Position,
    pub parent: usize,
    pub child: usize,
}

/// A mutation above `node` at `position`.
///
/// Positions are continuous. The tree at `position` is the one
/// covering the integer coordinate below it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MutationRecord {
    pub position: f64,
    pub node: usize,
}

impl MutationRecord {
    fn coordinate(&self) -> Position {
        Position::new_valid(self.position.floor() as i64)
    }
}

/// Sorts edges by (child, left) and joins abutting edges
/// that share both parent and child.
pub(crate) fn squash_edges(mut edges: Vec<Edge>) -> Vec<Edge> {
    edges.sort_by(|a, b| a.child.cmp(&b.child).then(a.left.cmp(&b.left)));
    let mut rv: Vec<Edge> = Vec::with_capacity(edges.len());
    for edge in edges {
        match rv.last_mut() {
            Some(last)
                if last.child == edge.child
                    && last.parent == edge.parent
                    && last.right == edge.left =>
            {
                last.right = edge.right
            }
            _ => rv.push(edge),
        }
    }
    rv
}

/// Result of one ancestry simulation.
///
/// Nodes `0..num_samples` are the samples, population 0 first.
#[derive(Clone, Debug)]
pub struct TreeSequence {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    // edges[edge_offsets[c]..edge_offsets[c + 1]] are the edges of child c
    edge_offsets: Vec<usize>,
    // one mutation per site
    sites: Vec<MutationRecord>,
    num_samples: usize,
    sequence_length: Position,
    random_seed: u64,
}

impl TreeSequence {
    /// Assembles a result from raw records.
    ///
    /// Edges need not be sorted. Every mutation becomes its own site,
    /// ordered by position.
    ///
    /// # Panics
    ///
    /// If an edge refers to a node that is not in `nodes`.
    pub fn new(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        mut mutations: Vec<MutationRecord>,
        num_samples: usize,
        sequence_length: Position,
        random_seed: u64,
    ) -> Self {
        let edges = squash_edges(edges);
        let mut edge_offsets = vec![0; nodes.len() + 1];
        for edge in &edges {
            edge_offsets[edge.child + 1] += 1;
        }
        for i in 1..edge_offsets.len() {
            edge_offsets[i] += edge_offsets[i - 1];
        }

        mutations.sort_by(|a, b| a.position.total_cmp(&b.position));

        Self {
            nodes,
            edges,
            edge_offsets,
            sites: mutations,
            num_samples,
            sequence_length,
            random_seed,
        }
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    /// Equal to [`TreeSequence::num_sites`] under infinite sites.
    pub fn num_mutations(&self) -> usize {
        self.sites.len()
    }

    pub fn mutations(&self) -> &[MutationRecord] {
        &self.sites
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn sequence_length(&self) -> Position {
        self.sequence_length
    }

    /// The seed the engine ran with, drawn at random if none was given.
    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    /// Variant site positions in ascending order.
    pub fn site_positions(&self) -> Vec<f64> {
        self.sites.iter().map(|s| s.position).collect()
    }

    /// The parent of `child` in the tree covering `position`,
    /// or `None` if `child` is a root there.
    pub fn parent(&self, child: usize, position: Position) -> Option<usize> {
        let start = *self.edge_offsets.get(child)?;
        let stop = *self.edge_offsets.get(child + 1)?;
        let edges = &self.edges[start..stop];
        let i = edges.partition_point(|e| e.right <= position);
        match edges.get(i) {
            Some(e) if e.left <= position => Some(e.parent),
            _ => None,
        }
    }

    /// 1 if the mutation at `site` lies on the path from `sample`
    /// to the root, 0 otherwise.
    fn allele(&self, site: &MutationRecord, sample: usize) -> u8 {
        let position = site.coordinate();
        let mut node = Some(sample);
        while let Some(u) = node {
            if u == site.node {
                return 1;
            }
            node = self.parent(u, position);
        }
        0
    }

    /// Genotypes with one row per site and one column per sample.
    pub fn genotype_matrix(&self) -> GenotypeMatrix {
        let mut genotypes = Vec::with_capacity(self.sites.len() * self.num_samples);
        for site in &self.sites {
            genotypes.extend((0..self.num_samples).map(|sample| self.allele(site, sample)));
        }
        GenotypeMatrix::from_sites(self.sites.len(), self.num_samples, genotypes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i64) -> Position {
        Position::new_valid(x)
    }

    // Samples 0, 1, 2. On [0, 50): ((0, 1)3, 2)4.
    // On [50, 100): ((1, 2)3, 0)4.
    fn small_tree_sequence(mutations: Vec<MutationRecord>) -> TreeSequence {
        let nodes = vec![
            Node {
                time: 0.0,
                population: 0,
            },
            Node {
                time: 0.0,
                population: 0,
            },
            Node {
                time: 0.0,
                population: 0,
            },
            Node {
                time: 1.0,
                population: 0,
            },
            Node {
                time: 2.0,
                population: 0,
            },
        ];
        let edge = |left, right, parent, child| Edge {
            left: pos(left),
            right: pos(right),
            parent,
            child,
        };
        let edges = vec![
            edge(0, 50, 3, 0),
            edge(0, 50, 3, 1),
            edge(0, 50, 4, 2),
            edge(0, 50, 4, 3),
            edge(50, 100, 3, 1),
            edge(50, 100, 3, 2),
            edge(50, 100, 4, 0),
            edge(50, 100, 4, 3),
        ];
        TreeSequence::new(nodes, edges, mutations, 3, pos(100), 1)
    }

    #[test]
    fn test_squash_edges_joins_abutting_intervals() {
        let edges = vec![
            Edge {
                left: pos(10),
                right: pos(20),
                parent: 5,
                child: 1,
            },
            Edge {
                left: pos(0),
                right: pos(10),
                parent: 5,
                child: 1,
            },
            Edge {
                left: pos(20),
                right: pos(30),
                parent: 6,
                child: 1,
            },
        ];
        let squashed = squash_edges(edges);
        assert_eq!(squashed.len(), 2);
        assert_eq!(squashed[0].left, pos(0));
        assert_eq!(squashed[0].right, pos(20));
        assert_eq!(squashed[1].parent, 6);
    }

    #[test]
    fn test_parent_lookup() {
        let ts = small_tree_sequence(vec![]);
        assert_eq!(ts.parent(0, pos(0)), Some(3));
        assert_eq!(ts.parent(0, pos(49)), Some(3));
        assert_eq!(ts.parent(0, pos(50)), Some(4));
        assert_eq!(ts.parent(3, pos(75)), Some(4));
        assert_eq!(ts.parent(4, pos(75)), None);
        assert_eq!(ts.parent(0, pos(100)), None);
    }

    #[test]
    fn test_genotypes_follow_the_local_tree() {
        let ts = small_tree_sequence(vec![
            MutationRecord {
                position: 60.5,
                node: 3,
            },
            MutationRecord {
                position: 10.25,
                node: 3,
            },
            // just left of the breakpoint, so the [0, 50) tree applies
            MutationRecord {
                position: 49.9,
                node: 2,
            },
        ]);
        assert_eq!(ts.num_sites(), 3);
        assert_eq!(ts.site_positions(), vec![10.25, 49.9, 60.5]);
        let g = ts.genotype_matrix();
        assert_eq!(g.num_sites(), 3);
        assert_eq!(g.num_samples(), 3);
        assert_eq!(g.site(0), &[1, 1, 0]);
        assert_eq!(g.site(1), &[0, 0, 1]);
        assert_eq!(g.site(2), &[0, 1, 1]);
    }

    #[test]
    fn test_every_mutation_is_its_own_site() {
        let ts = small_tree_sequence(vec![
            MutationRecord {
                position: 10.5,
                node: 3,
            },
            MutationRecord {
                position: 10.5,
                node: 0,
            },
        ]);
        assert_eq!(ts.num_sites(), 2);
        assert_eq!(ts.num_mutations(), 2);
        let g = ts.genotype_matrix();
        // the order of equal positions follows generation order
        assert_eq!(g.site(0), &[1, 1, 0]);
        assert_eq!(g.site(1), &[1, 0, 0]);
    }
}
