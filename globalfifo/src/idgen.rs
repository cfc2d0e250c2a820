use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Identifies one open of the device, like a file descriptor does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    id: i64,
}

impl Handle {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self { id }
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd#{}", self.id)
    }
}

/// Thread-safe handle generator
///
/// Ids are never reused during the life of one device, so a released
/// handle can not accidentally address a later open.
#[derive(Debug)]
pub struct IdGen {
    next_id: AtomicI64,
}

impl IdGen {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
        }
    }

    /// Get the next unique handle
    pub fn next_handle(&self) -> Handle {
        Handle::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let ids = IdGen::new();
        let a = ids.next_handle();
        let b = ids.next_handle();
        assert_ne!(a, b);
        assert_eq!(a.id() + 1, b.id());
        assert_eq!(a.to_string(), "fd#1");
    }
}
