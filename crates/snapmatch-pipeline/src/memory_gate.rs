//! Memory-pressure gate for the upload orchestrator.
//!
//! Before admitting new concurrent work the orchestrator probes process
//! memory usage and pauses briefly above the high-water mark, bounding
//! how many in-flight blobs can pile up in memory.

use std::sync::Mutex;
use sysinfo::System;

/// Probe for current memory pressure.
pub trait MemoryGate: Send + Sync {
    /// Used memory as a percentage of total (0-100).
    fn used_percent(&self) -> f64;
}

/// Gate backed by `sysinfo`.
pub struct SystemMemoryGate {
    system: Mutex<System>,
}

impl SystemMemoryGate {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryGate {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGate for SystemMemoryGate {
    fn used_percent(&self) -> f64 {
        let mut system = self.system.lock().unwrap();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        system.used_memory() as f64 / total as f64 * 100.0
    }
}

/// Gate that never reports pressure; used in tests.
pub struct Unpressured;

impl MemoryGate for Unpressured {
    fn used_percent(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_gate_reports_sane_percentage() {
        let gate = SystemMemoryGate::new();
        let percent = gate.used_percent();
        assert!((0.0..=100.0).contains(&percent));
    }
}
