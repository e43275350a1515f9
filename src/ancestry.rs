//! Backwards-in-time ancestry simulation over a discrete genome.
//!
//! Lineages carry ancestral material as sorted, non-overlapping
//! segments. Two kinds of stochastic event change them: a lineage
//! recombining, which splits its material at a breakpoint, and two
//! lineages of one population finding a common ancestor, which merges
//! their material. Where material overlaps, a new node is recorded
//! along with edges to both children. Once every sample has coalesced
//! at some position, the material there is dropped.
//!
//! Demographic events are applied whenever the next one happens
//! before the next stochastic event would.

use std::collections::{BTreeMap, VecDeque};

use forrustts::prelude::*;
use rand::prelude::Rng;
use rand::rngs::StdRng;

use crate::demography::{DemographicEvent, DemographicModel};
use crate::error::EngineError;
use crate::tables::{Edge, Node};

fn coordinate(position: Position) -> i64 {
    position.into()
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Segment {
    left: Position,
    right: Position,
    node: usize,
}

// NOTE: a lineage is never empty.
// Merges that leave no material
// drop the lineage instead.
#[derive(Clone, Debug)]
struct Lineage {
    segments: Vec<Segment>,
}

impl Lineage {
    fn links(&self) -> i64 {
        match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => coordinate(last.right) - coordinate(first.left) - 1,
            _ => 0,
        }
    }

    /// Material left of `breakpoint` and material from `breakpoint` on.
    fn split(self, breakpoint: Position) -> (Self, Self) {
        let mut left = vec![];
        let mut right = vec![];
        for s in self.segments {
            if s.right <= breakpoint {
                left.push(s);
            } else if s.left >= breakpoint {
                right.push(s);
            } else {
                left.push(Segment {
                    right: breakpoint,
                    ..s
                });
                right.push(Segment {
                    left: breakpoint,
                    ..s
                });
            }
        }
        (Self { segments: left }, Self { segments: right })
    }
}

/// How many lineages carry material in each stretch of the genome.
///
/// A key starts a run that extends to the next key.
#[derive(Debug)]
struct OverlapCounts {
    runs: BTreeMap<Position, usize>,
}

impl OverlapCounts {
    fn new(sequence_length: Position, num_samples: usize) -> Self {
        let mut runs = BTreeMap::new();
        runs.insert(Position::new_valid(0), num_samples);
        runs.insert(sequence_length, 0);
        Self { runs }
    }

    fn split_at(&mut self, position: Position) {
        if !self.runs.contains_key(&position) {
            let count = self
                .runs
                .range(..position)
                .next_back()
                .map_or(0, |(_, c)| *c);
            self.runs.insert(position, count);
        }
    }

    /// Removes one lineage from `[left, right)`, returning each
    /// affected run with its new count.
    fn decrement(&mut self, left: Position, right: Position) -> Vec<(Position, Position, usize)> {
        self.split_at(left);
        self.split_at(right);
        let starts = self
            .runs
            .range(left..right)
            .map(|(p, _)| *p)
            .collect::<Vec<Position>>();
        let mut rv = Vec::with_capacity(starts.len());
        for (i, start) in starts.iter().enumerate() {
            let stop = starts.get(i + 1).copied().unwrap_or(right);
            if let Some(count) = self.runs.get_mut(start) {
                *count = count.saturating_sub(1);
                rv.push((*start, stop, *count));
            }
        }
        rv
    }
}

#[derive(Debug)]
struct PopulationState {
    size: f64,
    lineages: Vec<Lineage>,
}

impl PopulationState {
    // k lineages in a population of N diploids coalesce
    // at rate k(k - 1) / 2 * 1 / (2N) per generation
    fn coalescence_rate(&self) -> f64 {
        let k = self.lineages.len() as f64;
        k * (k - 1.0) / (4.0 * self.size)
    }
}

/// Nodes and (unsquashed) edges of a finished simulation.
#[derive(Debug)]
pub(crate) struct Genealogy {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

struct AncestrySimulator<'a> {
    events: &'a [DemographicEvent],
    populations: Vec<PopulationState>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    overlaps: OverlapCounts,
    recombination_rate: f64,
    total_links: i64,
    time: f64,
}

impl<'a> AncestrySimulator<'a> {
    fn new(model: &'a DemographicModel, sequence_length: Position, recombination_rate: f64) -> Self {
        let mut nodes = vec![];
        let mut populations = vec![];
        for (population, config) in model.populations().iter().enumerate() {
            let mut lineages = vec![];
            for _ in 0..config.sample_size {
                lineages.push(Lineage {
                    segments: vec![Segment {
                        left: Position::new_valid(0),
                        right: sequence_length,
                        node: nodes.len(),
                    }],
                });
                nodes.push(Node {
                    time: 0.0,
                    population,
                });
            }
            populations.push(PopulationState {
                size: config.initial_size,
                lineages,
            });
        }
        let total_links = populations
            .iter()
            .flat_map(|p| p.lineages.iter())
            .map(|l| l.links())
            .sum();
        Self {
            events: model.events(),
            populations,
            overlaps: OverlapCounts::new(sequence_length, nodes.len()),
            nodes,
            edges: vec![],
            recombination_rate,
            total_links,
            time: 0.0,
        }
    }

    fn num_lineages(&self) -> usize {
        self.populations.iter().map(|p| p.lineages.len()).sum()
    }

    fn add_lineage(&mut self, population: usize, lineage: Lineage) {
        self.total_links += lineage.links();
        self.populations[population].lineages.push(lineage);
    }

    fn remove_lineage(&mut self, population: usize, index: usize) -> Lineage {
        let lineage = self.populations[population].lineages.swap_remove(index);
        self.total_links -= lineage.links();
        lineage
    }

    fn apply_event(&mut self, event: &DemographicEvent, rng: &mut StdRng) {
        match *event {
            DemographicEvent::MassMigration {
                source,
                destination,
                proportion,
                ..
            } => {
                let lineages = std::mem::take(&mut self.populations[source].lineages);
                for lineage in lineages {
                    if rng.gen::<f64>() < proportion {
                        self.populations[destination].lineages.push(lineage);
                    } else {
                        self.populations[source].lineages.push(lineage);
                    }
                }
            }
            DemographicEvent::SizeChange {
                population,
                new_size,
                ..
            } => self.populations[population].size = new_size,
        }
    }

    /// Picks a link uniformly among all lineages, which picks the
    /// lineage in proportion to its links and the breakpoint
    /// uniformly within it.
    fn recombine(&mut self, rng: &mut StdRng) {
        let mut target = rng.gen_range(0..self.total_links);
        let mut chosen = None;
        'search: for (population, state) in self.populations.iter().enumerate() {
            for (index, lineage) in state.lineages.iter().enumerate() {
                let links = lineage.links();
                if target < links {
                    chosen = Some((population, index));
                    break 'search;
                }
                target -= links;
            }
        }
        if let Some((population, index)) = chosen {
            let lineage = self.remove_lineage(population, index);
            let first: i64 = coordinate(lineage.segments[0].left);
            let breakpoint = Position::new_valid(first + 1 + target);
            let (left, right) = lineage.split(breakpoint);
            self.add_lineage(population, left);
            self.add_lineage(population, right);
        }
    }

    fn coalesce(&mut self, population: usize, rng: &mut StdRng) {
        let k = self.populations[population].lineages.len();
        let i = rng.gen_range(0..k);
        let mut j = rng.gen_range(0..k - 1);
        if j >= i {
            j += 1;
        }
        // remove the higher index first so the lower one stays put
        let x = self.remove_lineage(population, i.max(j));
        let y = self.remove_lineage(population, i.min(j));
        if let Some(merged) = self.merge(x, y, population) {
            self.add_lineage(population, merged);
        }
    }

    fn new_node(&mut self, population: usize) -> usize {
        self.nodes.push(Node {
            time: self.time,
            population,
        });
        self.nodes.len() - 1
    }

    fn merge(&mut self, x: Lineage, y: Lineage, population: usize) -> Option<Lineage> {
        let mut xs = VecDeque::from(x.segments);
        let mut ys = VecDeque::from(y.segments);
        let mut parent = None;
        let mut merged: Vec<Segment> = vec![];

        loop {
            match (xs.front().copied(), ys.front().copied()) {
                (None, None) => break,
                (Some(_), None) => {
                    merged.extend(xs.drain(..));
                    break;
                }
                (None, Some(_)) => {
                    merged.extend(ys.drain(..));
                    break;
                }
                (Some(a), Some(b)) => {
                    if a.right <= b.left {
                        merged.push(a);
                        xs.pop_front();
                    } else if b.right <= a.left {
                        merged.push(b);
                        ys.pop_front();
                    } else if a.left < b.left {
                        merged.push(Segment { right: b.left, ..a });
                        xs[0].left = b.left;
                    } else if b.left < a.left {
                        merged.push(Segment { right: a.left, ..b });
                        ys[0].left = a.left;
                    } else {
                        let left = a.left;
                        let right = a.right.min(b.right);
                        let p = match parent {
                            Some(p) => p,
                            None => {
                                let p = self.new_node(population);
                                parent = Some(p);
                                p
                            }
                        };
                        for child in [a.node, b.node] {
                            self.edges.push(Edge {
                                left,
                                right,
                                parent: p,
                                child,
                            });
                        }
                        for (start, stop, count) in self.overlaps.decrement(left, right) {
                            // count == 1 means the MRCA has been found here
                            if count > 1 {
                                merged.push(Segment {
                                    left: start,
                                    right: stop,
                                    node: p,
                                });
                            }
                        }
                        if right == a.right {
                            xs.pop_front();
                        } else {
                            xs[0].left = right;
                        }
                        if right == b.right {
                            ys.pop_front();
                        } else {
                            ys[0].left = right;
                        }
                    }
                }
            }
        }

        let mut segments: Vec<Segment> = Vec::with_capacity(merged.len());
        for s in merged {
            match segments.last_mut() {
                Some(last) if last.node == s.node && last.right == s.left => last.right = s.right,
                _ => segments.push(s),
            }
        }
        if segments.is_empty() {
            None
        } else {
            Some(Lineage { segments })
        }
    }

    fn run(mut self, rng: &mut StdRng) -> Result<Genealogy, EngineError> {
        let mut next_event = 0;
        while self.num_lineages() > 0 {
            let coalescence_rates = self
                .populations
                .iter()
                .map(|p| p.coalescence_rate())
                .collect::<Vec<f64>>();
            let recombination = self.recombination_rate * self.total_links as f64;
            let total_rate = coalescence_rates.iter().sum::<f64>() + recombination;

            let waiting_time = if total_rate > 0.0 {
                rng.sample(rand_distr::Exp::new(total_rate).map_err(|_| {
                    EngineError::InvalidRate {
                        name: "total event rate",
                        value: total_rate,
                    }
                })?)
            } else {
                f64::INFINITY
            };

            if let Some(event) = self.events.get(next_event) {
                if self.time + waiting_time >= event.time() {
                    self.time = self.time.max(event.time());
                    self.apply_event(event, rng);
                    next_event += 1;
                    continue;
                }
            }
            if !waiting_time.is_finite() {
                return Err(EngineError::NoCommonAncestor(self.num_lineages()));
            }

            self.time += waiting_time;
            let mut u = rng.gen::<f64>() * total_rate;
            if u < recombination {
                self.recombine(rng);
            } else {
                u -= recombination;
                let mut population = coalescence_rates.len() - 1;
                for (i, rate) in coalescence_rates.iter().enumerate() {
                    if u < *rate {
                        population = i;
                        break;
                    }
                    u -= rate;
                }
                // guard against rounding landing on an empty population
                if self.populations[population].lineages.len() < 2 {
                    match coalescence_rates.iter().rposition(|r| *r > 0.0) {
                        Some(p) => population = p,
                        None => continue,
                    }
                }
                self.coalesce(population, rng);
            }
        }
        Ok(Genealogy {
            nodes: self.nodes,
            edges: self.edges,
        })
    }
}

/// Runs the ancestry simulation for `model` on `[0, sequence_length)`.
pub(crate) fn simulate_ancestry(
    model: &DemographicModel,
    sequence_length: Position,
    recombination_rate: f64,
    rng: &mut StdRng,
) -> Result<Genealogy, EngineError> {
    AncestrySimulator::new(model, sequence_length, recombination_rate).run(rng)
}
