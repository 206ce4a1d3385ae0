//! A core drives one instruction stream against its private cache.
//!
//! Each instruction is first tried against the core's own cache: a read hit,
//! or a write hit on an owned (Exclusive or Modified) line, completes with
//! no bus involvement at all. Everything else escalates to the bus, which
//! resolves it as one atomic coherence transaction. After every completed
//! instruction the core emits a trace report; it terminates when its stream
//! is exhausted, independently of the other cores.

use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;

use log::debug;

use crate::bus::Bus;
use crate::error::SimError;
use crate::instruction::{AccessKind, Instruction};
use crate::main_memory::{Address, Value};
use crate::memory_cache::{CoreId, MesiState};

/// One completed access, as observed by the issuing core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessReport {
    /// The core that issued the access.
    pub core: CoreId,
    /// Whether it was a read or a write.
    pub kind: AccessKind,
    /// The address touched.
    pub address: Address,
    /// The value observed (read) or stored (write).
    pub value: Value,
}

impl fmt::Display for AccessReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            AccessKind::Read => write!(
                f,
                "Core {}: Reading from address {}: {}",
                self.core, self.address, self.value
            ),
            AccessKind::Write => write!(
                f,
                "Core {}: Writing to address {}: {}",
                self.core, self.address, self.value
            ),
        }
    }
}

/// A worker that executes one core's instruction stream to completion.
pub struct Core {
    id: CoreId,
    bus: Arc<Bus>,
    program: std::vec::IntoIter<Instruction>,
    trace: mpsc::Sender<AccessReport>,
}

impl Core {
    /// Create a core attached to `bus` that will execute `program` and send
    /// one report per completed instruction to `trace`.
    pub fn new(
        id: CoreId,
        bus: Arc<Bus>,
        program: Vec<Instruction>,
        trace: mpsc::Sender<AccessReport>,
    ) -> Core {
        Core {
            id,
            bus,
            program: program.into_iter(),
            trace,
        }
    }

    /// Execute the next instruction, if any. Returns `Ok(false)` once the
    /// stream is exhausted.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let Some(inst) = self.program.next() else {
            return Ok(false);
        };

        let value = match self.try_local(inst) {
            Some(value) => value,
            None => self.bus.handle_access(self.id, inst)?.0,
        };

        let report = AccessReport {
            core: self.id,
            kind: inst.kind(),
            address: inst.address(),
            value,
        };
        // The sink only observes; a disconnected receiver is not an error.
        let _ = self.trace.send(report);
        Ok(true)
    }

    /// The hit fast path: resolve the access against this core's cache
    /// alone, holding only its own cache lock. Returns `None` when the bus
    /// is needed (miss, or a write to a line that is merely Shared).
    fn try_local(&self, inst: Instruction) -> Option<Value> {
        let addr = inst.address();
        let mut cache = self.bus.cache(self.id).lock();

        if !cache.is_hit(addr) {
            cache.record_miss();
            return None;
        }

        match inst {
            Instruction::Read(_) => {
                let value = cache.line(addr).value;
                cache.record_hit();
                Some(value)
            }
            Instruction::Write(_, value) => {
                if cache.line(addr).state.owns_line() {
                    let line = cache.line_mut(addr);
                    line.value = value;
                    line.state = MesiState::Modified;
                    cache.record_hit();
                    Some(value)
                } else {
                    cache.record_miss();
                    None
                }
            }
        }
    }

    /// Run the whole stream to completion.
    pub fn run(mut self) -> Result<(), SimError> {
        while self.step()? {}
        let miss_percent = self.bus.cache(self.id).lock().miss_percent();
        debug!(
            "core {}: stream exhausted, {miss_percent:.1}% cache miss",
            self.id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn core_with_program(program: Vec<Instruction>) -> (Core, mpsc::Receiver<AccessReport>) {
        let bus = Arc::new(Bus::new(&SimConfig {
            num_cores: 1,
            cache_size: 2,
            memory_size: 24,
        }));
        let (tx, rx) = mpsc::channel();
        (Core::new(0, bus, program, tx), rx)
    }

    #[test]
    fn reports_follow_program_order() {
        let program = vec![
            Instruction::Write(Address(1), 5),
            Instruction::Read(Address(1)),
            Instruction::Read(Address(2)),
        ];
        let (core, rx) = core_with_program(program);
        core.run().unwrap();

        let reports: Vec<AccessReport> = rx.iter().collect();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].kind, AccessKind::Write);
        assert_eq!(reports[0].value, 5);
        assert_eq!(reports[1], AccessReport {
            core: 0,
            kind: AccessKind::Read,
            address: Address(1),
            value: 5,
        });
        assert_eq!(reports[2].value, 0);
    }

    #[test]
    fn step_reports_exhaustion() {
        let (mut core, _rx) = core_with_program(vec![Instruction::Read(Address(0))]);
        assert!(core.step().unwrap());
        assert!(!core.step().unwrap());
        assert!(!core.step().unwrap());
    }

    #[test]
    fn report_display_matches_trace_format() {
        let read = AccessReport {
            core: 1,
            kind: AccessKind::Read,
            address: Address(7),
            value: 3,
        };
        assert_eq!(read.to_string(), "Core 1: Reading from address 7: 3");
        let write = AccessReport {
            kind: AccessKind::Write,
            ..read
        };
        assert_eq!(write.to_string(), "Core 1: Writing to address 7: 3");
    }
}
