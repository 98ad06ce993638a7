//! Run parameters: command line parsing and validation.

use clap::Parser;

use crate::error::ConfigError;
use crate::exchange::Discipline;
use crate::random::DEFAULT_SEED;

/// Horizontal size of the configuration.
pub const DEFAULT_WIDTH: usize = 1024;

/// Where workers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Transport {
    /// Threads of this process, `--workers` of them.
    Local,
    /// One worker per MPI process; the worker count is the MPI world size.
    Mpi,
}

/// Simulate the annealing automaton on a torus split across a ring of workers
/// and print the MD5 of the final configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "halo-anneal")]
pub struct Args {
    /// Total number of grid rows
    pub lines: usize,

    /// Number of generations to simulate
    pub iterations: usize,

    /// Number of in-process workers (local transport only)
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,

    /// Cells per row
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: usize,

    /// Seed of the random starting configuration
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// How boundary transfers are ordered against computation
    #[arg(long, value_enum, default_value_t = Discipline::Overlapped)]
    pub discipline: Discipline,

    /// Spread each worker's rows over a thread pool
    #[arg(long, default_value_t = false)]
    pub parallel_rows: bool,

    #[arg(long, value_enum, default_value_t = Transport::Local)]
    pub transport: Transport,
}

/// Validated parameters shared by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    pub total_rows: usize,
    pub iterations: usize,
    pub width: usize,
    pub seed: u64,
    pub discipline: Discipline,
    pub parallel_rows: bool,
}

impl SimConfig {
    pub fn new(total_rows: usize, iterations: usize) -> Self {
        SimConfig {
            total_rows,
            iterations,
            width: DEFAULT_WIDTH,
            seed: DEFAULT_SEED,
            discipline: Discipline::Overlapped,
            parallel_rows: false,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_parallel_rows(mut self, parallel_rows: bool) -> Self {
        self.parallel_rows = parallel_rows;
        self
    }

    /// Check the parameters against a ring of `workers` workers.
    pub fn validate(&self, workers: usize) -> Result<(), ConfigError> {
        if self.total_rows == 0 {
            return Err(ConfigError::NoRows);
        }
        if self.width == 0 {
            return Err(ConfigError::NoColumns);
        }
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.total_rows < workers {
            return Err(ConfigError::TooFewRows {
                rows: self.total_rows,
                workers,
            });
        }
        Ok(())
    }
}

impl From<&Args> for SimConfig {
    fn from(args: &Args) -> Self {
        SimConfig::new(args.lines, args.iterations)
            .with_width(args.width)
            .with_seed(args.seed)
            .with_discipline(args.discipline)
            .with_parallel_rows(args.parallel_rows)
    }
}
