//! The bus connects each core's cache to the others and to main memory.
//!
//! Every cache miss, and every write that needs ownership, becomes one bus
//! transaction. The bus serializes transactions (at most one is ever in
//! flight), snoops every other core's cache for copies of the requested
//! address, decides the resulting MESI states, and performs the write-backs
//! that keep main memory from going stale.
//!
//! Arbitration is a mutex around main memory: holding it *is* owning the
//! bus, and transactions from different cores are totally ordered by it.
//! Snooping is a direct synchronous call against each other cache while the
//! bus is held, so there are no response slots to poll and nothing to
//! livelock on. Each cache sits behind its own mutex so that a snoop
//! serializes against the owning core's in-flight local access; the lock
//! order is always bus first, then one cache at a time, and the local fast
//! path takes only its own cache lock, so the two paths cannot deadlock.

use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;
use parking_lot::Mutex;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::instruction::Instruction;
use crate::main_memory::{Address, MainMemory, Value};
use crate::memory_cache::{CacheLine, CoreCache, CoreId, MesiState};

/// The shared bus and everything reachable through it: main memory and every
/// core's cache.
pub struct Bus {
    /// Main memory, behind the bus arbitration lock. A transaction holds
    /// this guard from start to finish.
    memory: Mutex<MainMemory>,
    caches: Vec<Mutex<CoreCache>>,
    transactions: AtomicU64,
}

impl Bus {
    /// Build the bus, main memory, and one empty cache per core.
    pub fn new(config: &SimConfig) -> Bus {
        Bus {
            memory: Mutex::new(MainMemory::new(config.memory_size)),
            caches: (0..config.num_cores)
                .map(|_| Mutex::new(CoreCache::new(config.cache_size)))
                .collect(),
            transactions: AtomicU64::new(0),
        }
    }

    /// How many cores are attached.
    pub fn num_cores(&self) -> usize {
        self.caches.len()
    }

    /// The cache belonging to `core`. The owning core takes this lock for
    /// its local fast path; everyone else goes through [`Bus::handle_access`].
    pub fn cache(&self, core: CoreId) -> &Mutex<CoreCache> {
        &self.caches[core]
    }

    /// How many bus transactions have completed so far. Accesses resolved
    /// entirely within a core's own cache do not count.
    pub fn transaction_count(&self) -> u64 {
        self.transactions.load(Ordering::Relaxed)
    }

    /// A copy of the line currently occupying `addr`'s slot in `core`'s
    /// cache. Observability only; protocol decisions never feed from this.
    pub fn cache_line(&self, core: CoreId, addr: Address) -> CacheLine {
        *self.caches[core].lock().line(addr)
    }

    /// The value main memory currently holds for `addr`. May be stale if
    /// some cache holds the address in `Modified`.
    pub fn memory_value(&self, addr: Address) -> Value {
        self.memory.lock().read(addr)
    }

    /// Resolve one access on behalf of `core`, as a single atomic bus
    /// transaction. Returns the observed value and the requester's final
    /// line state.
    ///
    /// The hit fast path is re-checked first under the bus lock: between the
    /// core's own lookup and bus acquisition, another core's transaction may
    /// have invalidated or downgraded the requester's line, and the recheck
    /// makes the decision atomic.
    pub fn handle_access(
        &self,
        core: CoreId,
        inst: Instruction,
    ) -> Result<(Value, MesiState), SimError> {
        let addr = inst.address();
        let mut memory = self.memory.lock();

        if !memory.contains(addr) {
            return Err(SimError::AddressOutOfBounds {
                addr,
                memory_size: memory.size(),
            });
        }

        {
            let mut cache = self.caches[core].lock();
            if cache.is_hit(addr) {
                match inst {
                    Instruction::Read(_) => {
                        let line = cache.line(addr);
                        return Ok((line.value, line.state));
                    }
                    Instruction::Write(_, value) => {
                        let line = cache.line_mut(addr);
                        if line.state.owns_line() {
                            line.value = value;
                            line.state = MesiState::Modified;
                            return Ok((value, MesiState::Modified));
                        }
                        // Shared: ownership must be acquired below.
                    }
                }
            }
        }

        self.transactions.fetch_add(1, Ordering::Relaxed);

        let result = match inst {
            Instruction::Read(_) => self.read_transaction(core, addr, &mut memory),
            Instruction::Write(_, value) => {
                self.write_transaction(core, addr, value, &mut memory)
            }
        };

        #[cfg(debug_assertions)]
        if let Err(err) = self.verify_coherence_locked(&memory) {
            panic!("invariant broken after transaction for core {core}: {err}");
        }

        Ok(result)
    }

    /// A read miss (or a read of an invalid line): snoop for remote copies,
    /// fill from the freshest source, and install the line.
    fn read_transaction(
        &self,
        core: CoreId,
        addr: Address,
        memory: &mut MainMemory,
    ) -> (Value, MesiState) {
        self.write_back_victim(core, addr, memory);

        // Snoop every other cache. A Modified copy is written back and
        // downgraded so memory is fresh before we read it; an Exclusive copy
        // loses exclusivity.
        let mut remote_value = None;
        for (other_id, other) in self.caches.iter().enumerate() {
            if other_id == core {
                continue;
            }
            let mut other = other.lock();
            if !other.is_hit(addr) {
                continue;
            }
            let line = other.line_mut(addr);
            match line.state {
                MesiState::Modified => {
                    memory.write(line.tag, line.value);
                    line.state = MesiState::Shared;
                    trace!("bus: core {other_id} wrote back address {addr}, now shared");
                }
                MesiState::Exclusive => {
                    line.state = MesiState::Shared;
                    trace!("bus: core {other_id} downgraded address {addr} to shared");
                }
                MesiState::Shared => {}
                MesiState::Invalid => continue,
            }
            remote_value = Some(line.value);
        }

        let (value, state) = match remote_value {
            Some(value) => (value, MesiState::Shared),
            None => (memory.read(addr), MesiState::Exclusive),
        };
        trace!("bus: core {core} filled address {addr} = {value} as {state:?}");

        self.caches[core].lock().install(addr, value, state);
        (value, state)
    }

    /// A write miss, or a write to a Shared line: invalidate every remote
    /// copy and install the line dirty.
    fn write_transaction(
        &self,
        core: CoreId,
        addr: Address,
        value: Value,
        memory: &mut MainMemory,
    ) -> (Value, MesiState) {
        self.write_back_victim(core, addr, memory);

        // Invalidate every remote copy, dirty ones written back first so the
        // newest value is never silently dropped.
        for (other_id, other) in self.caches.iter().enumerate() {
            if other_id == core {
                continue;
            }
            let mut other = other.lock();
            if !other.is_hit(addr) {
                continue;
            }
            let line = other.line_mut(addr);
            if line.state == MesiState::Modified {
                memory.write(line.tag, line.value);
            }
            line.state = MesiState::Invalid;
            trace!("bus: core {core} invalidated address {addr} in core {other_id}");
        }

        self.caches[core].lock().install(addr, value, MesiState::Modified);
        trace!("bus: core {core} now owns address {addr} = {value}");
        (value, MesiState::Modified)
    }

    /// Write back the dirty victim occupying the requester's slot, if the
    /// slot maps a different address. Every miss performs this step before
    /// the slot is reused; skipping it would lose the victim's value.
    fn write_back_victim(&self, core: CoreId, addr: Address, memory: &mut MainMemory) {
        let mut cache = self.caches[core].lock();
        let victim = *cache.line(addr);
        if victim.state == MesiState::Modified && victim.tag != addr {
            memory.write(victim.tag, victim.value);
            cache.line_mut(addr).state = MesiState::Invalid;
            trace!(
                "bus: core {core} evicted address {} = {} from slot {}",
                victim.tag,
                victim.value,
                cache.slot_of(addr)
            );
        }
    }

    /// Check the cross-cache MESI invariants: at most one owner per address,
    /// no valid copies alongside an owner, and clean copies agreeing with
    /// each other and with main memory.
    ///
    /// Debug builds run this after every transaction; tests call it directly.
    /// A violation is a bug in the protocol implementation.
    pub fn verify_coherence(&self) -> Result<(), SimError> {
        let memory = self.memory.lock();
        self.verify_coherence_locked(&memory)
    }

    fn verify_coherence_locked(&self, memory: &MainMemory) -> Result<(), SimError> {
        let snapshots: Vec<Vec<CacheLine>> =
            self.caches.iter().map(|c| c.lock().snapshot()).collect();

        for (core, lines) in snapshots.iter().enumerate() {
            for line in lines.iter().filter(|line| line.state.is_valid()) {
                if line.state != MesiState::Modified && line.value != memory.read(line.tag) {
                    return Err(SimError::Protocol(format!(
                        "core {core} holds a clean {:?} line for address {} with value {} \
                         but memory has {}",
                        line.state,
                        line.tag,
                        line.value,
                        memory.read(line.tag)
                    )));
                }

                for (other_core, other_lines) in snapshots.iter().enumerate() {
                    if other_core == core {
                        continue;
                    }
                    for other in other_lines
                        .iter()
                        .filter(|other| other.state.is_valid() && other.tag == line.tag)
                    {
                        if line.state.owns_line() {
                            return Err(SimError::Protocol(format!(
                                "core {core} holds address {} in {:?} while core {other_core} \
                                 holds a {:?} copy",
                                line.tag, line.state, other.state
                            )));
                        }
                        if other.value != line.value {
                            return Err(SimError::Protocol(format!(
                                "cores {core} and {other_core} hold address {} shared with \
                                 different values {} and {}",
                                line.tag, line.value, other.value
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
