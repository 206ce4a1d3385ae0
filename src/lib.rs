//! A functional simulator of a MESI-coherent multiprocessor memory
//! hierarchy.
//!
//! N independent cores, each with a small private direct-mapped cache, share
//! one flat backing memory. A snooping bus serializes every coherence
//! transaction: it adjudicates misses, downgrades and invalidates remote
//! copies, and triggers the write-backs that keep memory fresh. The
//! simulator is functionally accurate, not cycle accurate: it reproduces the
//! cache states, data values, and bus transactions a real MESI machine would
//! produce, with no timing model.
//!
//! The usual entry point is [`sim::Simulation`], which takes a
//! [`config::SimConfig`] and one instruction stream per core and runs every
//! stream to completion on its own thread:
//!
//! ```
//! use mesi_sim::config::SimConfig;
//! use mesi_sim::instruction::parse_program;
//! use mesi_sim::sim::Simulation;
//!
//! let sim = Simulation::new(SimConfig::default())?;
//! let programs = vec![
//!     parse_program("WR 0 7\nRD 0\n")?,
//!     parse_program("RD 0\n")?,
//! ];
//! for report in sim.run(programs)? {
//!     println!("{report}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]

pub mod bus;
pub mod config;
pub mod core;
pub mod error;
pub mod instruction;
pub mod main_memory;
pub mod memory_cache;
pub mod sim;

pub use crate::bus::Bus;
pub use crate::config::SimConfig;
pub use crate::core::{AccessReport, Core};
pub use crate::error::SimError;
pub use crate::instruction::{AccessKind, Instruction};
pub use crate::main_memory::{Address, MainMemory, Value};
pub use crate::memory_cache::{CacheLine, CoreCache, CoreId, MesiState};
pub use crate::sim::Simulation;
