use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out process-unique `file_id` and `trace_id` values.
///
/// Each counter only ever increases, so ids are never reused. Parsing takes
/// the allocator by reference; tests build their own instance to get
/// deterministic ids, while [`IdAllocator::global`] backs the convenience
/// entry points.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_file: AtomicU64,
    next_trace: AtomicU64,
}

static GLOBAL: IdAllocator = IdAllocator::new();

impl IdAllocator {
    pub const fn new() -> Self {
        Self {
            next_file: AtomicU64::new(0),
            next_trace: AtomicU64::new(0),
        }
    }

    /// The process-wide allocator.
    pub fn global() -> &'static IdAllocator {
        &GLOBAL
    }

    pub fn next_file_id(&self) -> u64 {
        self.next_file.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserve `count` consecutive trace ids and return the first.
    pub fn reserve_traces(&self, count: u64) -> u64 {
        self.next_trace.fetch_add(count, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_file_id(), 0);
        assert_eq!(ids.next_file_id(), 1);
        assert_eq!(ids.reserve_traces(3), 0);
        assert_eq!(ids.next_file_id(), 2);
        assert_eq!(ids.reserve_traces(0), 3);
        assert_eq!(ids.reserve_traces(1), 3);
        assert_eq!(ids.reserve_traces(2), 4);
    }
}
