//! The simulation harness: wires the cores, caches, bus, and memory
//! together, runs every instruction stream on its own thread, and collects
//! the trace.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use log::debug;

use crate::bus::Bus;
use crate::config::SimConfig;
use crate::core::{AccessReport, Core};
use crate::error::SimError;
use crate::instruction::Instruction;

/// A configured machine, ready to execute instruction streams.
pub struct Simulation {
    bus: Arc<Bus>,
    config: SimConfig,
}

impl Simulation {
    /// Validate `config` and build the machine.
    pub fn new(config: SimConfig) -> Result<Simulation, SimError> {
        config.validate()?;
        Ok(Simulation {
            bus: Arc::new(Bus::new(&config)),
            config,
        })
    }

    /// The shared bus, for inspecting cache and memory state after (or
    /// between) runs.
    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    /// Run one instruction stream per core, in parallel, each to
    /// completion. Returns the access reports in the order the accesses
    /// completed; per-core program order is preserved within that.
    pub fn run(&self, programs: Vec<Vec<Instruction>>) -> Result<Vec<AccessReport>, SimError> {
        if programs.len() != self.config.num_cores {
            return Err(SimError::Config(format!(
                "{} instruction streams supplied for {} cores",
                programs.len(),
                self.config.num_cores
            )));
        }

        let (trace_tx, trace_rx) = mpsc::channel();

        let mut handles = Vec::with_capacity(programs.len());
        for (id, program) in programs.into_iter().enumerate() {
            debug!("spawning core {id} with {} instructions", program.len());
            let core = Core::new(id, Arc::clone(&self.bus), program, trace_tx.clone());
            let handle = thread::Builder::new()
                .name(format!("core {id}"))
                .spawn(move || core.run())
                .map_err(SimError::Spawn)?;
            handles.push(handle);
        }

        // Each core owns a sender clone; dropping ours lets the collection
        // below finish once every core has.
        drop(trace_tx);
        let reports: Vec<AccessReport> = trace_rx.iter().collect();

        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => return Err(SimError::CorePanic(id)),
            }
        }

        debug!("all cores finished, {} accesses traced", reports.len());
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_memory::Address;

    #[test]
    fn rejects_mismatched_stream_count() {
        let sim = Simulation::new(SimConfig::default()).unwrap();
        let err = sim.run(vec![vec![Instruction::Read(Address(0))]]).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SimConfig {
            num_cores: 0,
            ..SimConfig::default()
        };
        assert!(Simulation::new(config).is_err());
    }

    #[test]
    fn surfaces_core_errors() {
        let sim = Simulation::new(SimConfig {
            num_cores: 1,
            cache_size: 2,
            memory_size: 24,
        })
        .unwrap();
        // Address 99 is outside the 24-byte memory.
        let err = sim.run(vec![vec![Instruction::Read(Address(99))]]).unwrap_err();
        assert!(matches!(err, SimError::AddressOutOfBounds { .. }));
    }
}
