/// Source of the "how much memory are we using" signal.
pub trait MemoryProbe: Send + Sync {
    /// Resident memory in bytes, `None` when it cannot be sampled.
    fn used_bytes(&self) -> Option<u64>;
}

/// Resident set size of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemory;

#[cfg(target_os = "linux")]
impl MemoryProbe for ProcessMemory {
    fn used_bytes(&self) -> Option<u64> {
        use tracing::error;

        let process = procfs::process::Process::myself()
            .map_err(|error| error!(%error, "Failed to get currently running process"))
            .ok()?;
        let status = process
            .status()
            .map_err(|error| error!(%error, "Failed to read status of the running process"))
            .ok()?;

        // reported in kB
        status.vmrss.map(|kb| kb * 1024)
    }
}

#[cfg(not(target_os = "linux"))]
impl MemoryProbe for ProcessMemory {
    fn used_bytes(&self) -> Option<u64> {
        None
    }
}
