//! Per-rank simulation engine: setup orchestration and the step loop.
//!
//! `GridSimulation::bootstrap` runs the three-stage distribution, builds
//! the local topology, and seeds the state buffers. `run` then executes
//! the fixed phase sequence per step (halo exchange, local update,
//! summary append), and `collect` gathers the logs at the coordinator.

use std::sync::Arc;

use crate::comm::{CommTag, Communicator, SetupTags};
use crate::config::RunConfig;
use crate::error::{EpiGridError, Result};
use crate::exchange::distribute::{
    broadcast_topology_maps, fetch_initial_states, scatter_block_structure,
};
use crate::exchange::gather::gather_summaries;
use crate::exchange::halo::exchange_halo;
use crate::exchange::GhostTable;
use crate::init::{InitialData, RowMapper};
use crate::model::{SirCell, SirModel};
use crate::partition::Partition;
use crate::sim::integrator::advance_cells;
use crate::sim::results::StepSummary;
use crate::topology::{BlockAdjacency, BlockLayout, CellId, GridTopology, LocalTopology};

/// Default base tag of the setup distribution.
pub const DEFAULT_SETUP_TAG: CommTag = CommTag::new(0x5100);
/// Default base tag of the per-step halo exchange.
pub const DEFAULT_HALO_TAG: CommTag = CommTag::new(0x5900);

/// One rank's view of a distributed SIR run.
pub struct GridSimulation<C: Communicator> {
    comm: Arc<C>,
    model: SirModel,
    topo: LocalTopology,
    current: Vec<SirCell>,
    next: Vec<SirCell>,
    ghosts: GhostTable,
    log: Vec<StepSummary>,
    anomalies: u64,
    tags: SetupTags,
    halo_base: CommTag,
    step: u64,
}

impl<C: Communicator> GridSimulation<C> {
    /// Bootstrap with the default tag layout. See [`Self::bootstrap_with_tags`].
    pub fn bootstrap(
        comm: Arc<C>,
        config: &RunConfig,
        source: Option<&dyn InitialData>,
        mapper: RowMapper,
    ) -> Result<Self> {
        Self::bootstrap_with_tags(comm, config, DEFAULT_SETUP_TAG, DEFAULT_HALO_TAG, source, mapper)
    }

    /// Run the collective setup and build this rank's engine.
    ///
    /// The coordinator (rank 0) must pass the initial-condition `source`;
    /// other ranks pass `None`. Collective: every rank of the
    /// communicator must call this with identical `config` and tags.
    pub fn bootstrap_with_tags(
        comm: Arc<C>,
        config: &RunConfig,
        setup_base: CommTag,
        halo_base: CommTag,
        source: Option<&dyn InitialData>,
        mapper: RowMapper,
    ) -> Result<Self> {
        config.validate()?;
        let tags = SetupTags::from_base(setup_base);
        let grid = GridTopology::new(config.rows, config.cols)?;
        let layout = BlockLayout::from_block_size(grid.num_cells(), config.block_size)?;
        let my_rank = comm.rank();

        // Coordinator-side setup: partition, adjacency, dataset checks.
        let partition = if my_rank == 0 {
            let src = source.ok_or_else(|| {
                EpiGridError::InvalidConfig("coordinator needs an initial-condition source".into())
            })?;
            if src.num_rows() < grid.num_cells() {
                return Err(EpiGridError::InvalidConfig(format!(
                    "dataset has {} rows, grid needs {}",
                    src.num_rows(),
                    grid.num_cells()
                )));
            }
            Some(Partition::contiguous(layout, comm.size())?)
        } else {
            None
        };
        let root_maps = partition
            .as_ref()
            .map(|p| (BlockAdjacency::build(&grid, &layout), p.owners().to_vec()));

        let share = scatter_block_structure(&*comm, tags, partition.as_ref())?;
        let states = fetch_initial_states(&*comm, tags, &share, source, mapper)?;
        let (adjacency, owners) = broadcast_topology_maps(
            &*comm,
            tags,
            root_maps.as_ref().map(|(a, o)| (a, o.as_slice())),
        )?;

        let topo = LocalTopology::build(&grid, &layout, &owners, &share, my_rank)?;

        // The cell-derived halo plan and the block-level composition must
        // name the same peers; a mismatch means the replicated maps are
        // inconsistent with the scattered structure.
        let block_peers = adjacency.peer_ranks(&owners, my_rank);
        if topo.plan().peers() != block_peers.as_slice() {
            return Err(EpiGridError::InvalidConfig(format!(
                "halo peers {:?} disagree with block adjacency peers {:?}",
                topo.plan().peers(),
                block_peers
            )));
        }

        let current = topo
            .cells()
            .iter()
            .map(|c| states.get(c).copied().ok_or(EpiGridError::UnknownCellId(*c)))
            .collect::<Result<Vec<_>>>()?;
        let next = current.clone();

        comm.barrier();
        Ok(Self {
            comm,
            model: config.model(),
            topo,
            current,
            next,
            ghosts: GhostTable::new(),
            log: Vec::with_capacity(config.steps),
            anomalies: 0,
            tags,
            halo_base,
            step: 0,
        })
    }

    /// Execute one step: exchange halos, update local cells, append the
    /// summary row. Ranks with no local cells still participate in the
    /// phase sequence but log nothing.
    pub fn advance(&mut self) -> Result<()> {
        exchange_halo(
            &*self.comm,
            self.halo_base,
            self.step,
            &self.topo,
            &self.current,
            &mut self.ghosts,
        )?;
        self.anomalies += advance_cells(
            &self.model,
            &self.topo,
            &self.current,
            &self.ghosts,
            &mut self.next,
        )?;
        std::mem::swap(&mut self.current, &mut self.next);

        if !self.current.is_empty() {
            let n = self.current.len() as f64;
            let (mut s, mut i, mut r) = (0.0, 0.0, 0.0);
            for cell in &self.current {
                s += cell.s();
                i += cell.i();
                r += cell.r();
            }
            self.log.push(StepSummary {
                time: self.step as f64 * self.model.dt,
                s_avg: s / n,
                i_avg: i / n,
                r_avg: r / n,
            });
        }
        self.step += 1;
        Ok(())
    }

    /// Run all remaining steps.
    pub fn run(&mut self) -> Result<()> {
        while self.step < self.model.steps as u64 {
            self.advance()?;
        }
        Ok(())
    }

    /// Gather every rank's summary log to the coordinator. Collective.
    pub fn collect(&self) -> Result<Option<Vec<Vec<StepSummary>>>> {
        gather_summaries(&*self.comm, self.tags.results, &self.log)
    }

    /// This rank within the pool.
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Locally owned cells with their current state, in global id order.
    pub fn local_cells(&self) -> impl Iterator<Item = (CellId, SirCell)> + '_ {
        self.topo
            .cells()
            .iter()
            .copied()
            .zip(self.current.iter().copied())
    }

    /// This rank's summary log so far.
    pub fn summaries(&self) -> &[StepSummary] {
        &self.log
    }

    /// Count of cells reset by the integrator after a failed
    /// renormalization.
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// The model parameters of this run.
    pub fn model(&self) -> &SirModel {
        &self.model
    }

    /// The per-rank topology built during setup.
    pub fn topology(&self) -> &LocalTopology {
        &self.topo
    }
}
