/*
 * Runtime Configuration
 *
 * Compile-time defaults for the threading runtime, grouped into a struct
 * so a host can run more than one differently-tuned runtime in the same
 * process.
 */

/// Tunable parameters for a [`crate::Runtime`].
///
/// `Default` reproduces the constants used by the reference implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub max_threads: usize,
    pub stack_size: usize,
    pub mlfq_levels: u8,
    pub q0_quantum_ms: u64,
    pub q1_quantum_ms: u64,
    pub boost_interval_ms: u64,
    pub tick_ms: u64,
    pub page_size: usize,
    pub virtual_pages: usize,
    pub physical_pages: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_threads: 10,
            stack_size: 32 * 1024,
            mlfq_levels: 3,
            q0_quantum_ms: 50,
            q1_quantum_ms: 100,
            boost_interval_ms: 1000,
            tick_ms: 10,
            page_size: 4096,
            virtual_pages: 16,
            physical_pages: 8,
        }
    }
}

impl RuntimeConfig {
    /// Quantum limit, in milliseconds, for the given MLFQ priority level.
    ///
    /// Levels above 1 share the Q1 quantum; only Q0 gets its own shorter slice.
    ///
    /// # Arguments
    ///
    /// * `priority` - The MLFQ level to look up.
    ///
    /// # Returns
    ///
    /// Returns the quantum, in milliseconds, a thread at that level may run
    /// before becoming eligible for demotion.
    pub fn quantum_for(&self, priority: u8) -> u64 {
        if priority == 0 {
            self.q0_quantum_ms
        } else {
            self.q1_quantum_ms
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.max_threads, 10);
        assert_eq!(cfg.stack_size, 32768);
        assert_eq!(cfg.mlfq_levels, 3);
        assert_eq!(cfg.q0_quantum_ms, 50);
        assert_eq!(cfg.q1_quantum_ms, 100);
        assert_eq!(cfg.boost_interval_ms, 1000);
        assert_eq!(cfg.page_size, 4096);
        assert_eq!(cfg.virtual_pages, 16);
        assert_eq!(cfg.physical_pages, 8);
    }

    #[test]
    fn quantum_for_picks_level() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.quantum_for(0), 50);
        assert_eq!(cfg.quantum_for(1), 100);
        assert_eq!(cfg.quantum_for(2), 100);
    }
}
