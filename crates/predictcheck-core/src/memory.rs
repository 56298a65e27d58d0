use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    pub num_tensors: usize,
    pub num_bytes: usize,
}

#[derive(Debug, Default)]
struct Counters {
    tensors: AtomicUsize,
    bytes: AtomicUsize,
}

/// Live tensor accounting shared by every tensor an engine hands out.
#[derive(Clone, Debug, Default)]
pub struct MemoryTracker {
    counters: Arc<Counters>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self) -> MemoryInfo {
        MemoryInfo {
            num_tensors: self.counters.tensors.load(Ordering::Acquire),
            num_bytes: self.counters.bytes.load(Ordering::Acquire),
        }
    }

    pub(crate) fn allocate(&self, bytes: usize) -> Allocation {
        self.counters.tensors.fetch_add(1, Ordering::AcqRel);
        self.counters.bytes.fetch_add(bytes, Ordering::AcqRel);
        Allocation {
            counters: Arc::clone(&self.counters),
            bytes,
        }
    }
}

/// One counted tensor. Released on drop.
#[derive(Debug)]
pub struct Allocation {
    counters: Arc<Counters>,
    bytes: usize,
}

impl Clone for Allocation {
    fn clone(&self) -> Self {
        MemoryTracker {
            counters: Arc::clone(&self.counters),
        }
        .allocate(self.bytes)
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.counters.tensors.fetch_sub(1, Ordering::AcqRel);
        self.counters.bytes.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}
