//! Main memory implementation.

use std::fmt;

/// The address of a byte in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub usize);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The value stored at a single address.
pub type Value = u8;

/// The flat backing store shared by every core.
///
/// Main memory is passive: it holds no coherence state of its own, and it is
/// only ever accessed from inside a bus transaction. Keeping it consistent
/// with dirty cache lines (write-back before anyone else reads a stale
/// address) is entirely the bus's responsibility.
pub struct MainMemory {
    data: Box<[Value]>,
}

impl MainMemory {
    /// Create a zero-initialized memory of `memory_size` bytes.
    pub fn new(memory_size: usize) -> MainMemory {
        MainMemory {
            data: vec![0; memory_size].into_boxed_slice(),
        }
    }

    /// The number of addressable bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Whether `addr` falls inside this memory.
    ///
    /// The bus checks every requested address before acting on it, so the
    /// accessors below may index directly: no line with an out-of-range tag
    /// is ever installed in a cache.
    pub fn contains(&self, addr: Address) -> bool {
        addr.0 < self.data.len()
    }

    /// Read the byte at `addr`. Addresses that were never written read as
    /// zero; that is not an error.
    pub fn read(&self, addr: Address) -> Value {
        self.data[addr.0]
    }

    /// Write `value` to `addr`.
    pub fn write(&mut self, addr: Address, value: Value) {
        self.data[addr.0] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_memory_reads_zero() {
        let memory = MainMemory::new(24);
        assert_eq!(memory.size(), 24);
        for i in 0..24 {
            assert_eq!(memory.read(Address(i)), 0);
        }
    }

    #[test]
    fn write_then_read() {
        let mut memory = MainMemory::new(24);
        memory.write(Address(3), 17);
        assert_eq!(memory.read(Address(3)), 17);
        assert_eq!(memory.read(Address(4)), 0);
    }

    #[test]
    fn bounds() {
        let memory = MainMemory::new(24);
        assert!(memory.contains(Address(0)));
        assert!(memory.contains(Address(23)));
        assert!(!memory.contains(Address(24)));
    }
}
