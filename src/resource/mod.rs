//! Resource Supervisor (C7)
//!
//! Accounts for GPU memory pressure and turns out-of-memory faults into a
//! per-buffer, not per-session or per-process, failure (spec §4.7). Also
//! owns the single-reader-at-a-time queue that serializes capability calls
//! onto the GPU (spec §5), since concurrent inference calls from different
//! sessions would themselves provoke the OOM this module exists to recover
//! from.

use std::sync::atomic::{AtomicU64, Ordering};

use sysinfo::{System, SystemExt};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Serializes GPU-bound capability calls and tracks OOM recoveries.
///
/// Constructed once at boot and shared by `Arc` across every session task
/// (spec §9: explicit process-scoped state rather than a module singleton).
pub struct ResourceSupervisor {
    gpu_queue: Semaphore,
    memory_budget_mb: u64,
    oom_count: AtomicU64,
}

impl ResourceSupervisor {
    pub fn new(memory_budget_mb: u64) -> Self {
        Self {
            // One permit: capability calls that touch the GPU run strictly
            // one at a time across the whole process (spec §5).
            gpu_queue: Semaphore::new(1),
            memory_budget_mb,
            oom_count: AtomicU64::new(0),
        }
    }

    /// Acquires the single GPU slot. Hold the returned permit for the
    /// duration of one capability call.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.gpu_queue
            .acquire()
            .await
            .expect("gpu queue semaphore is never closed")
    }

    /// Total OOM recoveries observed since boot (for health/diagnostics).
    pub fn oom_count(&self) -> u64 {
        self.oom_count.load(Ordering::Relaxed)
    }

    pub fn memory_budget_mb(&self) -> u64 {
        self.memory_budget_mb
    }

    /// Handles a capability-reported OOM (spec §4.7 steps 1-2): logs the
    /// event with current memory stats and releases whatever cache/scratch
    /// space the process holds. Step 3 (returning the `GPU_OOM` error to the
    /// pipeline caller) is the caller's responsibility; this only performs
    /// the recovery side effect.
    pub fn handle_oom(&self, buffer_id: &str, detail: &str) {
        self.oom_count.fetch_add(1, Ordering::Relaxed);

        let mut system = System::new();
        system.refresh_memory();
        tracing::error!(
            buffer_id,
            detail,
            used_memory_kb = system.used_memory(),
            total_memory_kb = system.total_memory(),
            budget_mb = self.memory_budget_mb,
            "GPU out of memory, skipping buffer and releasing cache"
        );

        self.release_cache();
    }

    /// Drops cached scratch allocations held by the capability backends.
    /// The mock capabilities hold none; real backends (whisper-rs, ort) are
    /// expected to free their own session-level caches here once wired in.
    fn release_cache(&self) {
        tracing::debug!("GPU cache release requested");
    }
}
