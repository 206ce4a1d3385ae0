//! Command-line driver: read one instruction stream per core, run the
//! simulation, and print each completed access.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use mesi_sim::config::{SimConfig, DEFAULT_CACHE_SIZE, DEFAULT_MEMORY_SIZE};
use mesi_sim::error::SimError;
use mesi_sim::instruction;
use mesi_sim::sim::Simulation;

/// Simulate a MESI-coherent multiprocessor over per-core instruction files.
///
/// Core `i` executes the stream in `input_i.txt` inside the input directory.
/// Each line is either `RD <address>` or `WR <address> <value>`.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Options {
    /// Directory containing the `input_*.txt` instruction streams.
    #[arg(value_name = "DIR", default_value = ".")]
    input_dir: PathBuf,

    /// Number of cores to simulate; defaults to one per input file found.
    #[arg(short = 'n', long)]
    cores: Option<usize>,

    /// Lines per private cache.
    #[arg(long, default_value_t = DEFAULT_CACHE_SIZE)]
    cache_size: usize,

    /// Bytes of shared memory.
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE)]
    memory_size: usize,
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().filter_or("MESI_SIM_LOG", "warn"));

    match run(Options::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(options: Options) -> Result<(), SimError> {
    let num_cores = match options.cores {
        Some(n) => n,
        None => match instruction::count_streams(&options.input_dir) {
            0 => {
                return Err(SimError::Config(format!(
                    "no input_*.txt streams found in {}",
                    options.input_dir.display()
                )))
            }
            n => n,
        },
    };

    let config = SimConfig {
        num_cores,
        cache_size: options.cache_size,
        memory_size: options.memory_size,
    };
    let programs = instruction::load_programs(&options.input_dir, num_cores)?;

    let sim = Simulation::new(config)?;
    for report in sim.run(programs)? {
        println!("{report}");
    }
    Ok(())
}
