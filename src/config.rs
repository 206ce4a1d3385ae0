//! Simulation parameters, fixed for the lifetime of a run.

use crate::error::SimError;

/// Default number of lines in each core's private cache.
pub const DEFAULT_CACHE_SIZE: usize = 2;

/// Default size of the shared memory, in bytes.
pub const DEFAULT_MEMORY_SIZE: usize = 24;

/// The dimensions of the simulated machine.
#[derive(Clone, Copy, Debug)]
pub struct SimConfig {
    /// How many cores (and private caches) to simulate.
    pub num_cores: usize,
    /// Lines per private cache.
    pub cache_size: usize,
    /// Bytes of shared memory.
    pub memory_size: usize,
}

impl SimConfig {
    /// Reject dimensions the protocol cannot run with. Configuration errors
    /// are fatal and reported before anything is built.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_cores == 0 {
            return Err(SimError::Config("at least one core is required".into()));
        }
        if self.cache_size == 0 {
            return Err(SimError::Config("cache size must be positive".into()));
        }
        if self.memory_size == 0 {
            return Err(SimError::Config("memory size must be positive".into()));
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> SimConfig {
        SimConfig {
            num_cores: 2,
            cache_size: DEFAULT_CACHE_SIZE,
            memory_size: DEFAULT_MEMORY_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        for config in [
            SimConfig {
                num_cores: 0,
                ..SimConfig::default()
            },
            SimConfig {
                cache_size: 0,
                ..SimConfig::default()
            },
            SimConfig {
                memory_size: 0,
                ..SimConfig::default()
            },
        ] {
            assert!(matches!(config.validate(), Err(SimError::Config(_))));
        }
    }
}
