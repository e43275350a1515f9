//! The replicate sweep: every (migration rate, replicate) pair is one
//! independent unit of work that simulates once and writes one file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::config::{FailurePolicy, SeedPolicy, SweepConfig};
use crate::demography::isolation_with_migration;
use crate::engine::{run_simulation, AncestryEngine};
use crate::error::{SweepError, UnitError, UnitErrorKind};
use crate::haplotypes::save_haplotypes;
use crate::parameters::non_negative;

/// Formats a rate the way it appears in output file names:
/// shortest round-trip digits, with a two-digit exponent for
/// magnitudes below 1e-4 or from 1e16 up (`1e-09`, `0.1`, `1.0`).
pub fn format_rate(rate: f64) -> String {
    let magnitude = rate.abs();
    if !rate.is_finite() || magnitude == 0.0 || (1e-4..1e16).contains(&magnitude) {
        let s = format!("{rate}");
        if !rate.is_finite() || s.contains('.') {
            s
        } else {
            format!("{s}.0")
        }
    } else {
        let s = format!("{rate:e}");
        match s.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => s,
        }
    }
}

/// `replicate` is 1-based.
pub fn output_file_name(migration_rate: f64, replicate: u32) -> String {
    format!(
        "haplotypes_mig{}_rep{}.txt",
        format_rate(migration_rate),
        replicate
    )
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Seed for one unit, independent of the order units run in.
pub fn derive_seed(base_seed: u64, migration_rate: f64, replicate: u32) -> u64 {
    splitmix64(splitmix64(base_seed ^ migration_rate.to_bits()) ^ u64::from(replicate))
}

impl SeedPolicy {
    pub fn seed_for(&self, migration_rate: f64, replicate: u32) -> Option<u64> {
        match *self {
            SeedPolicy::Entropy => None,
            SeedPolicy::Derived { base_seed } => {
                Some(derive_seed(base_seed, migration_rate, replicate))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkUnit {
    pub migration_rate: f64,
    /// 1-based.
    pub replicate: u32,
    pub path: PathBuf,
}

impl WorkUnit {
    fn fail(&self, kind: impl Into<UnitErrorKind>) -> UnitError {
        UnitError {
            migration_rate: self.migration_rate,
            replicate: self.replicate,
            path: self.path.clone(),
            kind: kind.into(),
        }
    }
}

/// All units, migration rate major, in configuration order.
pub fn work_units(config: &SweepConfig) -> Vec<WorkUnit> {
    config
        .migration_rates
        .iter()
        .flat_map(|&migration_rate| {
            (1..=config.replicates).map(move |replicate| WorkUnit {
                migration_rate,
                replicate,
                path: config
                    .output_directory
                    .join(output_file_name(migration_rate, replicate)),
            })
        })
        .collect()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnitOutcome {
    Written { num_sites: usize },
    Skipped,
}

#[derive(Debug, Default)]
pub struct SweepSummary {
    pub written: usize,
    pub skipped: usize,
    /// Output failures that the best-effort policy stepped over.
    pub failures: Vec<UnitError>,
}

impl SweepSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(
        &mut self,
        result: Result<UnitOutcome, UnitError>,
        policy: FailurePolicy,
    ) -> Result<(), SweepError> {
        match result {
            Ok(UnitOutcome::Written { .. }) => self.written += 1,
            Ok(UnitOutcome::Skipped) => self.skipped += 1,
            Err(e) if e.is_fatal() || policy == FailurePolicy::FailFast => {
                return Err(SweepError::Unit(e))
            }
            Err(e) => {
                error!("{e}");
                self.failures.push(e);
            }
        }
        Ok(())
    }
}

/// Checks everything that can be checked before any simulation runs.
pub fn validate_sweep(config: &SweepConfig) -> Result<(), SweepError> {
    config.sample_sizes.validate()?;
    non_negative("recombination_rate", config.recombination_rate)?;
    let mut names = BTreeSet::new();
    for &rate in &config.migration_rates {
        config.parameters.with_migration(rate).validate()?;
        if !names.insert(format_rate(rate)) {
            return Err(SweepError::DuplicateMigrationRate(rate));
        }
    }
    if !config.output_directory.is_dir() {
        return Err(SweepError::MissingOutputDirectory(
            config.output_directory.clone(),
        ));
    }
    Ok(())
}

// Unreadable paths count as missing.
fn output_exists(path: &Path) -> bool {
    match path.try_exists() {
        Ok(exists) => exists,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot check for existing output");
            false
        }
    }
}

/// Simulates one unit and writes its haplotypes.
///
/// Each call derives its own parameter snapshot; nothing
/// is shared between units.
pub fn run_unit<E: AncestryEngine + ?Sized>(
    engine: &E,
    config: &SweepConfig,
    unit: &WorkUnit,
) -> Result<UnitOutcome, UnitError> {
    if config.skip_existing && output_exists(&unit.path) {
        debug!(path = %unit.path.display(), "output exists, skipping");
        return Ok(UnitOutcome::Skipped);
    }
    let params = config.parameters.with_migration(unit.migration_rate);
    let model = isolation_with_migration(&params, config.sample_sizes).map_err(|e| unit.fail(e))?;
    let seed = config
        .seed_policy
        .seed_for(unit.migration_rate, unit.replicate);
    let ts = run_simulation(engine, &model, &params, config.recombination_rate, seed)
        .map_err(|e| unit.fail(e))?;
    let seed = ts.random_seed();
    let haplotypes = save_haplotypes(ts, &unit.path).map_err(|e| unit.fail(e))?;
    debug!(
        migration_rate = unit.migration_rate,
        replicate = unit.replicate,
        seed,
        rows = haplotypes.num_rows(),
        sites = haplotypes.num_columns(),
        "wrote replicate"
    );
    Ok(UnitOutcome::Written {
        num_sites: haplotypes.num_columns(),
    })
}

fn run_sequential<E: AncestryEngine + ?Sized>(
    engine: &E,
    config: &SweepConfig,
    units: &[WorkUnit],
    summary: &mut SweepSummary,
) -> Result<(), SweepError> {
    let mut current_rate = None;
    for unit in units {
        if current_rate.map_or(true, |r: f64| r.to_bits() != unit.migration_rate.to_bits()) {
            info!(
                migration_rate = unit.migration_rate,
                replicates = config.replicates,
                "starting migration rate"
            );
            current_rate = Some(unit.migration_rate);
        }
        summary.record(run_unit(engine, config, unit), config.failure_policy)?;
    }
    Ok(())
}

fn run_parallel<E: AncestryEngine + Sync + ?Sized>(
    engine: &E,
    config: &SweepConfig,
    units: &[WorkUnit],
    num_threads: usize,
    summary: &mut SweepSummary,
) -> Result<(), SweepError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()?;
    info!(num_threads, units = units.len(), "running replicates in parallel");
    let stop = AtomicBool::new(false);
    let results = pool.install(|| {
        units
            .par_iter()
            .map(|unit| {
                if stop.load(Ordering::Relaxed) {
                    return None;
                }
                let result = run_unit(engine, config, unit);
                if let Err(e) = &result {
                    if e.is_fatal() || config.failure_policy == FailurePolicy::FailFast {
                        stop.store(true, Ordering::Relaxed);
                    }
                }
                Some(result)
            })
            .collect::<Vec<_>>()
    });
    let mut not_run = 0;
    for result in results {
        match result {
            Some(result) => summary.record(result, config.failure_policy)?,
            None => not_run += 1,
        }
    }
    if not_run > 0 {
        warn!(not_run, "sweep stopped before every replicate ran");
    }
    Ok(())
}

/// Runs every (migration rate, replicate) unit of `config`.
///
/// Parameter and engine errors always end the sweep. Output errors
/// end it under [`FailurePolicy::FailFast`] and are collected in the
/// summary otherwise.
pub fn run_sweep<E: AncestryEngine + Sync + ?Sized>(
    engine: &E,
    config: &SweepConfig,
) -> Result<SweepSummary, SweepError> {
    validate_sweep(config)?;
    let units = work_units(config);
    info!(
        units = units.len(),
        output_directory = %config.output_directory.display(),
        "starting sweep"
    );

    let mut summary = SweepSummary::default();
    match config.threads {
        Some(n) if n > 1 => run_parallel(engine, config, &units, n, &mut summary)?,
        _ => run_sequential(engine, config, &units, &mut summary)?,
    }

    info!(
        written = summary.written,
        skipped = summary.skipped,
        failed = summary.failures.len(),
        "sweep finished"
    );
    Ok(summary)
}
