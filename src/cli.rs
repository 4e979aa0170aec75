//! Command-line interface of the driver binary.

use clap::Parser;
use std::path::PathBuf;

use crate::config::RunConfig;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Distributed SIR epidemic simulation over a partitioned grid"
)]
pub struct Cli {
    // Grid and partitioning settings
    #[arg(long, default_value = "32")]
    pub rows: usize,
    #[arg(long, default_value = "32")]
    pub cols: usize,
    #[arg(long, default_value = "64")]
    pub block_size: usize,

    // SIR model parameters
    #[arg(long, default_value = "0.3")]
    pub beta: f64,
    #[arg(long, default_value = "0.1")]
    pub gamma: f64,
    #[arg(long, default_value = "0.1")]
    pub dt: f64,
    #[arg(long, default_value = "100")]
    pub steps: usize,
    #[arg(long, default_value = "0.5")]
    pub mixing: f64,

    // I/O settings
    /// Initial-condition CSV; without it every cell starts susceptible
    /// except the optional seed.
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long, default_value = "simulation_results.csv")]
    pub output: PathBuf,
    /// Cell id seeded with infection when no input file is given.
    #[arg(long)]
    pub seed_cell: Option<u32>,
    /// Infected fraction of the seeded cell.
    #[arg(long, default_value = "0.01")]
    pub seed_infected: f64,
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// The run configuration shared by every rank.
    pub fn to_config(&self) -> RunConfig {
        RunConfig {
            rows: self.rows,
            cols: self.cols,
            block_size: self.block_size,
            beta: self.beta,
            gamma: self.gamma,
            dt: self.dt,
            steps: self.steps,
            mixing: self.mixing,
        }
    }
}
