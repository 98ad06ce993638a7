//! Command line entry point.
//!
//! ```bash
//! # 4 workers as threads of this process
//! halo-anneal 4096 1000 --workers 4
//!
//! # one worker per MPI process
//! mpirun -n 4 halo-anneal 4096 1000 --transport mpi
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use halo_anneal::{run_local, Args, Report, SimConfig, SimError, Transport};

fn main() -> anyhow::Result<()> {
    // Standard output carries nothing but the report line.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = SimConfig::from(&args);

    let report = match args.transport {
        Transport::Local => Some(run_local(&config, args.workers)?),
        Transport::Mpi => run_mpi(&config)?,
    };

    if let Some(report) = report {
        println!("{}", report);
    }
    Ok(())
}

#[cfg(feature = "mpi")]
fn run_mpi(config: &SimConfig) -> Result<Option<Report>, SimError> {
    use halo_anneal::comm::mpi_world::MpiComm;
    use halo_anneal::ConfigError;

    let comm = MpiComm::init()
        .ok_or_else(|| ConfigError::TransportUnavailable("mpi (already initialized)".to_string()))?;
    match halo_anneal::run(&comm, config) {
        Ok(report) => Ok(report),
        Err(err) => {
            // A single abort takes down every rank, so none is left blocked
            // on a transfer that will never come.
            tracing::error!(%err, "aborting MPI job");
            eprintln!("ERROR: {}", err);
            comm.abort(1)
        }
    }
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_config: &SimConfig) -> Result<Option<Report>, SimError> {
    Err(halo_anneal::ConfigError::TransportUnavailable("mpi".to_string()).into())
}
