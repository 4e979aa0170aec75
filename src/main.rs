//! Driver binary: wires CLI parameters, the communication backend, and
//! the result sink around the library core.
//!
//! With the `mpi-support` feature each process is one MPI rank; without
//! it the binary runs the whole grid on a single serial rank.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use epigrid::cli::Cli;
use epigrid::error::{EpiGridError, Result};
use epigrid::init::InitialData;
use epigrid::prelude::*;

fn main() {
    let cli = Cli::from_args();

    #[cfg(feature = "mpi-support")]
    let comm = Arc::new(MpiComm::default());
    #[cfg(not(feature = "mpi-support"))]
    let comm = Arc::new(NoComm);

    if let Err(e) = drive(&cli, Arc::clone(&comm)) {
        eprintln!("rank {}: fatal: {e}", comm.rank());
        comm.abort(1);
    }
}

fn drive<C: Communicator>(cli: &Cli, comm: Arc<C>) -> Result<()> {
    let config = cli.to_config();
    config.validate()?;
    let rank = comm.rank();
    let size = comm.size();

    let source = if rank == 0 {
        Some(load_initial(cli, &config)?)
    } else {
        None
    };
    if cli.verbose {
        eprintln!(
            "rank {rank}: setup for {}x{} grid, block size {}, {} ranks",
            config.rows, config.cols, config.block_size, size
        );
    }

    let mut sim = GridSimulation::bootstrap(
        comm,
        &config,
        source.as_ref().map(|s| s as &dyn InitialData),
        sir_head_mapper,
    )?;
    sim.run()?;
    if cli.verbose {
        eprintln!(
            "rank {rank}: finished {} steps, {} local cells, {} anomalies",
            config.steps,
            sim.local_cells().count(),
            sim.anomalies()
        );
    }

    if let Some(logs) = sim.collect()? {
        let file = File::create(&cli.output)?;
        let mut out = BufWriter::new(file);
        write_results(&mut out, &logs)?;
        eprintln!("rank 0: results written to {}", cli.output.display());
    }
    Ok(())
}

/// Coordinator-side initial conditions: a CSV file when given, otherwise
/// a susceptible grid with an optional infected seed cell.
fn load_initial(cli: &Cli, config: &RunConfig) -> Result<InMemoryRows> {
    match &cli.input {
        Some(path) => read_csv_rows(path),
        None => {
            let mut rows = vec![vec![1.0, 0.0, 0.0]; config.num_cells()];
            if let Some(seed) = cli.seed_cell {
                let infected = cli.seed_infected.clamp(0.0, 1.0);
                let row = rows.get_mut(seed as usize).ok_or_else(|| {
                    EpiGridError::InvalidConfig(format!(
                        "seed cell {seed} outside grid of {} cells",
                        config.num_cells()
                    ))
                })?;
                *row = vec![1.0 - infected, infected, 0.0];
            }
            InMemoryRows::from_rows(rows)
        }
    }
}

fn read_csv_rows(path: &Path) -> Result<InMemoryRows> {
    let text = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: std::result::Result<Vec<f64>, _> =
            line.split(',').map(|f| f.trim().parse::<f64>()).collect();
        match parsed {
            Ok(vals) => rows.push(vals),
            // tolerate a single header line
            Err(_) if rows.is_empty() => continue,
            Err(e) => {
                return Err(EpiGridError::InvalidConfig(format!(
                    "unparseable row in {}: {e}",
                    path.display()
                )))
            }
        }
    }
    InMemoryRows::from_rows(rows)
}
