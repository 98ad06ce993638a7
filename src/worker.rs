//! The per-worker run loop, and a launcher that runs a whole ring on threads.

use std::thread;
use std::time::Instant;

use tracing::{debug, info, info_span};

use crate::comm::local::{LocalCluster, LocalComm};
use crate::comm::Communicator;
use crate::config::SimConfig;
use crate::digest::{self, Report};
use crate::error::{Result, SimError};
use crate::exchange::{BoundaryExchanger, Discipline};
use crate::grid::Grid;
use crate::partition::{Decomposition, Partition};
use crate::random::RandomField;
use crate::stencil::Stencil;

/// The two buffers of a worker. `current` holds the latest generation.
#[derive(Debug, Clone)]
pub struct Generations {
    pub current: Grid,
    pub next: Grid,
}

impl Generations {
    pub fn new(rows: usize, width: usize) -> Self {
        Generations {
            current: Grid::new(rows, width),
            next: Grid::new(rows, width),
        }
    }

    /// Make `next` the current generation. Moves ownership, copies nothing.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }
}

/// State of one worker after its last generation.
#[derive(Debug, Clone)]
pub struct Finished {
    pub decomposition: Decomposition,
    pub partition: Partition,
    pub grid: Grid,
    /// Seconds spent in the generation loop.
    pub elapsed: f64,
}

/// Initialize this worker's rows and run every generation.
pub fn simulate<C: Communicator>(comm: &C, config: &SimConfig) -> Result<Finished> {
    config.validate(comm.size())?;
    let decomposition = Decomposition::new(config.total_rows, comm.size())?;
    let partition = decomposition.partition(comm.rank())?;

    let span = info_span!(
        "worker",
        rank = partition.rank,
        rows = partition.rows,
        offset = partition.offset
    );
    let _enter = span.enter();

    let mut generations = Generations::new(partition.rows, config.width);
    let mut field = RandomField::new(config.seed);
    field.skip_rows(partition.offset, config.width);
    generations.current.fill_random(&mut field);

    let exchanger = BoundaryExchanger::new(comm, Stencil::new(config.parallel_rows));
    if config.discipline == Discipline::Overlapped {
        // Overlapped steps consume ghost rows delivered by the previous step,
        // so the first generation needs them up front.
        exchanger.exchange_blocking(&mut generations.current)?;
    }

    let start = Instant::now();
    for generation in 0..config.iterations {
        exchanger.step(
            config.discipline,
            &mut generations.current,
            &mut generations.next,
        )?;
        generations.swap();
        debug!(generation, "generation done");
    }
    let elapsed = start.elapsed().as_secs_f64();
    info!(elapsed, iterations = config.iterations, "simulation finished");

    Ok(Finished {
        decomposition,
        partition,
        grid: generations.current,
        elapsed,
    })
}

/// Simulate and reduce. Only the coordinator gets a report.
pub fn run<C: Communicator>(comm: &C, config: &SimConfig) -> Result<Option<Report>> {
    let finished = simulate(comm, config)?;
    let report = digest::reduce(comm, &finished.decomposition, finished.grid, finished.elapsed)?;
    Ok(report)
}

/// Run `job` once per rank of a fresh in-process ring, each on its own thread.
///
/// Results come back in rank order. If any worker fails, the error returned
/// is the first one that is not a knock-on disconnect.
pub fn on_local_ring<T, F>(workers: usize, job: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&LocalComm) -> Result<T> + Sync,
{
    let job = &job;
    let outcomes: Vec<Result<T>> = thread::scope(|scope| {
        let handles: Vec<_> = LocalCluster::new(workers)
            .into_iter()
            .map(|comm| {
                let rank = comm.rank();
                let handle = thread::Builder::new()
                    .name(format!("worker-{}", rank))
                    .spawn_scoped(scope, move || job(&comm));
                (rank, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(rank, handle)| match handle {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(SimError::WorkerPanicked { rank })),
                Err(err) => Err(SimError::Spawn(err)),
            })
            .collect()
    });

    let mut values = Vec::with_capacity(workers);
    let mut knock_on = None;
    for outcome in outcomes {
        match outcome {
            Ok(value) => values.push(value),
            Err(err) if err.is_disconnect() => {
                knock_on.get_or_insert(err);
            }
            Err(err) => return Err(err),
        }
    }
    match knock_on {
        Some(err) => Err(err),
        None => Ok(values),
    }
}

/// Run the whole simulation with `workers` threads and return the
/// coordinator's report.
pub fn run_local(config: &SimConfig, workers: usize) -> Result<Report> {
    config.validate(workers)?;
    let reports = on_local_ring(workers, |comm| run(comm, config))?;
    reports
        .into_iter()
        .flatten()
        .next()
        .ok_or(SimError::WorkerPanicked { rank: digest::COORDINATOR })
}

/// Run the generations with `workers` threads and return every worker's final
/// state in rank order, without reducing.
pub fn simulate_local(config: &SimConfig, workers: usize) -> Result<Vec<Finished>> {
    config.validate(workers)?;
    on_local_ring(workers, |comm| simulate(comm, config))
}
