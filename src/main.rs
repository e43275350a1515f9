//! Isolation-with-migration haplotype sweep.
//!
//! Simulates `replicates` coalescent runs per migration rate and
//! writes one haplotype file per run.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use im_sweep::{run_sweep, FailurePolicy, HudsonEngine, SeedPolicy, SweepConfig};

#[derive(Parser, Debug)]
#[command(name = "im_sweep")]
#[command(about = "Simulate haplotype matrices under an isolation-with-migration model", long_about = None)]
struct Args {
    /// JSON configuration file. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the haplotype files are written to
    #[arg(short, long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Comma-separated signed migration proportions
    #[arg(
        short,
        long = "migration-rates",
        value_delimiter = ',',
        allow_negative_numbers = true
    )]
    migration_rates: Option<Vec<f64>>,

    /// Replicates per migration rate
    #[arg(short = 'n', long)]
    replicates: Option<u32>,

    /// Base seed; each replicate's seed is derived from it.
    /// Without it every replicate draws a fresh seed.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Worker threads (1 runs replicates one at a time)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Stop at the first replicate that fails to write
    #[arg(long)]
    fail_fast: bool,

    /// Skip replicates whose output file already exists
    #[arg(long)]
    skip_existing: bool,

    /// Create the output directory if it is missing
    #[arg(long)]
    create_output_dir: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn sweep_config(&self) -> Result<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => SweepConfig::from_json_file(path)?,
            None => SweepConfig::default(),
        };
        if let Some(dir) = &self.output_dir {
            config.output_directory = dir.clone();
        }
        if let Some(rates) = &self.migration_rates {
            config.migration_rates = rates.clone();
        }
        if let Some(replicates) = self.replicates {
            config.replicates = replicates;
        }
        if let Some(base_seed) = self.seed {
            config.seed_policy = SeedPolicy::Derived { base_seed };
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if self.fail_fast {
            config.failure_policy = FailurePolicy::FailFast;
        }
        if self.skip_existing {
            config.skip_existing = true;
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.sweep_config()?;
    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    if args.create_output_dir {
        fs::create_dir_all(&config.output_directory).with_context(|| {
            format!(
                "failed to create output directory {}",
                config.output_directory.display()
            )
        })?;
    }

    info!(
        rates = ?config.migration_rates,
        replicates = config.replicates,
        "isolation-with-migration sweep"
    );
    let summary = run_sweep(&HudsonEngine, &config)?;

    if !summary.is_complete() {
        for failure in &summary.failures {
            error!("  - {failure}");
        }
        bail!(
            "{} of {} replicates failed",
            summary.failures.len(),
            config.num_units()
        );
    }
    info!(
        written = summary.written,
        skipped = summary.skipped,
        "all replicates done"
    );
    Ok(())
}
