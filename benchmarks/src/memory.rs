//! Process memory sampling
//!
//! The executor and the chunk processor only ever need one number: the
//! resident set of this process in megabytes. [`ProcessMemoryProbe`] reads it
//! through `sysinfo`; tests substitute a scripted probe.

use std::sync::Mutex;

use sysinfo::{Pid, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of the current process memory reading
pub trait MemoryProbe: Send + Sync {
    /// Resident memory of the current process in megabytes
    fn resident_mb(&self) -> f64;
}

/// Reads the resident set size of the running process
pub struct ProcessMemoryProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(reason) => {
                tracing::warn!("Memory sampling disabled: {}", reason);
                None
            }
        };

        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for ProcessMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn resident_mb(&self) -> f64 {
        let Some(pid) = self.pid else {
            return 0.0;
        };

        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !system.refresh_process(pid) {
            return 0.0;
        }

        system
            .process(pid)
            .map(|p| p.memory() as f64 / BYTES_PER_MB)
            .unwrap_or(0.0)
    }
}

/// Probe that always reports the same value; useful when memory is not of interest
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantProbe(pub f64);

impl MemoryProbe for ConstantProbe {
    fn resident_mb(&self) -> f64 {
        self.0
    }
}
