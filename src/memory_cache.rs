//! Per-core memory cache implementation.
//!
//! Each core owns one small direct-mapped cache: an address maps to exactly
//! one slot via `address mod cache_size`, so two addresses that share a slot
//! evict each other. A line carries its MESI coherence state; lines start
//! `Invalid` and only the owning core's request path or the bus's snoop path
//! may change them.

use crate::main_memory::{Address, Value};

/// The id of a core and its private cache.
pub type CoreId = usize;

/// The current MESI state of a cache line.
///
/// <pre>
///   M E S I
/// M ✗ ✗ ✗ ✓
/// E ✗ ✗ ✗ ✓
/// S ✗ ✗ ✓ ✓
/// I ✓ ✓ ✓ ✓
/// </pre>
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MesiState {
    /// The line is present only in this cache and is dirty: its value is
    /// newer than main memory. It must be written back before any other core
    /// reads the address from memory.
    Modified,

    /// The line is present only in this cache and is clean; it matches main
    /// memory. A remote read downgrades it to `Shared`; a local write
    /// upgrades it to `Modified` without a bus transaction.
    Exclusive,

    /// The line may be present in other caches as well; every copy is clean
    /// and matches main memory.
    Shared,

    /// The line holds no usable data.
    Invalid,
}

impl MesiState {
    /// Whether a line in this state holds usable data.
    pub fn is_valid(self) -> bool {
        !matches!(self, MesiState::Invalid)
    }

    /// Whether a write to a line in this state may proceed without a bus
    /// transaction.
    pub fn owns_line(self) -> bool {
        matches!(self, MesiState::Modified | MesiState::Exclusive)
    }
}

/// One cache slot: an address tag, the cached value, and its MESI state.
#[derive(Clone, Copy, Debug)]
pub struct CacheLine {
    /// The address this slot currently maps.
    pub tag: Address,
    /// The cached value for `tag`.
    pub value: Value,
    /// The line's coherence state.
    pub state: MesiState,
}

impl CacheLine {
    fn empty() -> CacheLine {
        CacheLine {
            tag: Address(0),
            value: 0,
            state: MesiState::Invalid,
        }
    }
}

/// A direct-mapped cache owned by a single core.
pub struct CoreCache {
    lines: Box<[CacheLine]>,
    hit_count: u64,
    access_count: u64,
}

impl CoreCache {
    /// Create a cache with `cache_size` invalid lines.
    pub fn new(cache_size: usize) -> CoreCache {
        CoreCache {
            lines: vec![CacheLine::empty(); cache_size].into_boxed_slice(),
            hit_count: 0,
            access_count: 0,
        }
    }

    /// The slot `addr` maps to.
    pub fn slot_of(&self, addr: Address) -> usize {
        addr.0 % self.lines.len()
    }

    /// The line occupying `addr`'s slot, whatever it currently maps.
    pub fn line(&self, addr: Address) -> &CacheLine {
        &self.lines[self.slot_of(addr)]
    }

    /// Mutable access to the line occupying `addr`'s slot.
    pub fn line_mut(&mut self, addr: Address) -> &mut CacheLine {
        let slot = self.slot_of(addr);
        &mut self.lines[slot]
    }

    /// Whether `addr` is present with usable data.
    pub fn is_hit(&self, addr: Address) -> bool {
        let line = self.line(addr);
        line.state.is_valid() && line.tag == addr
    }

    /// Overwrite `addr`'s slot with a freshly fetched line. The caller must
    /// already have written back a dirty victim occupying the slot.
    pub fn install(&mut self, addr: Address, value: Value, state: MesiState) {
        *self.line_mut(addr) = CacheLine {
            tag: addr,
            value,
            state,
        };
    }

    /// A copy of every line, in slot order.
    pub fn snapshot(&self) -> Vec<CacheLine> {
        self.lines.to_vec()
    }

    /// Record an access that was satisfied locally.
    pub fn record_hit(&mut self) {
        self.hit_count += 1;
        self.access_count += 1;
    }

    /// Record an access that had to go to the bus.
    pub fn record_miss(&mut self) {
        self.access_count += 1;
    }

    /// The percent of accesses so far that missed this cache.
    pub fn miss_percent(&self) -> f64 {
        if self.access_count == 0 {
            return 0.0;
        }
        let misses = self.access_count - self.hit_count;
        (misses as f64 / self.access_count as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_map_by_modulus() {
        let cache = CoreCache::new(2);
        assert_eq!(cache.slot_of(Address(0)), 0);
        assert_eq!(cache.slot_of(Address(1)), 1);
        assert_eq!(cache.slot_of(Address(2)), 0);
        assert_eq!(cache.slot_of(Address(5)), 1);
    }

    #[test]
    fn fresh_cache_never_hits() {
        let cache = CoreCache::new(2);
        for i in 0..8 {
            assert!(!cache.is_hit(Address(i)));
        }
    }

    #[test]
    fn install_makes_a_hit() {
        let mut cache = CoreCache::new(2);
        cache.install(Address(3), 7, MesiState::Exclusive);
        assert!(cache.is_hit(Address(3)));
        assert_eq!(cache.line(Address(3)).value, 7);
        assert_eq!(cache.line(Address(3)).state, MesiState::Exclusive);
    }

    #[test]
    fn aliasing_address_is_a_miss() {
        let mut cache = CoreCache::new(2);
        cache.install(Address(1), 7, MesiState::Exclusive);
        // Address 3 shares slot 1 but carries a different tag.
        assert!(!cache.is_hit(Address(3)));
        // Installing it evicts address 1.
        cache.install(Address(3), 9, MesiState::Modified);
        assert!(!cache.is_hit(Address(1)));
        assert!(cache.is_hit(Address(3)));
    }

    #[test]
    fn invalid_line_with_matching_tag_is_a_miss() {
        let mut cache = CoreCache::new(2);
        cache.install(Address(3), 7, MesiState::Shared);
        cache.line_mut(Address(3)).state = MesiState::Invalid;
        assert!(!cache.is_hit(Address(3)));
    }

    #[test]
    fn miss_percent_tracks_accesses() {
        let mut cache = CoreCache::new(2);
        assert_eq!(cache.miss_percent(), 0.0);
        cache.record_miss();
        cache.record_hit();
        cache.record_hit();
        cache.record_miss();
        assert_eq!(cache.miss_percent(), 50.0);
    }
}
