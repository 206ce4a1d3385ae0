//! The error taxonomy for a simulation run.
//!
//! Everything here is fatal to the run: configuration and addressing errors
//! are surfaced immediately rather than retried, and a coherence violation
//! means the protocol implementation itself is buggy. An exhausted
//! instruction stream is not an error; the core simply stops.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::instruction::ParseError;
use crate::main_memory::Address;
use crate::memory_cache::CoreId;

/// Any error a simulation run can terminate with.
#[derive(Debug, Error)]
pub enum SimError {
    /// The simulation was configured with unusable dimensions.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An instruction named an address outside the configured memory.
    #[error("address {addr} is outside memory of {memory_size} bytes")]
    AddressOutOfBounds {
        /// The offending address.
        addr: Address,
        /// The configured memory size.
        memory_size: usize,
    },

    /// A cross-cache MESI invariant was broken. This is a bug in the
    /// protocol implementation, not a recoverable runtime condition.
    #[error("coherence violation: {0}")]
    Protocol(String),

    /// An instruction stream file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    InstructionFile {
        /// The stream file.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// An instruction stream file contained a malformed line.
    #[error("{}: {source}", path.display())]
    BadProgram {
        /// The stream file.
        path: PathBuf,
        /// Which line, and why.
        #[source]
        source: ParseError,
    },

    /// A core worker thread could not be spawned.
    #[error("failed to spawn core thread: {0}")]
    Spawn(#[source] io::Error),

    /// A core worker thread panicked.
    #[error("core {0} panicked")]
    CorePanic(CoreId),
}
