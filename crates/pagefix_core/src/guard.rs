use std::sync::atomic::{AtomicBool, Ordering};

static GLOBAL: ExecutionGuard = ExecutionGuard::new();

/// One-shot flag that stops the tuner from running twice in one page lifetime.
///
/// The flag is claimed before any component runs and is never reset.
#[derive(Debug, Default)]
pub struct ExecutionGuard {
    claimed: AtomicBool,
}

impl ExecutionGuard {
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
        }
    }

    /// The process-wide guard.
    pub fn global() -> &'static ExecutionGuard {
        &GLOBAL
    }

    /// Returns true for the first caller only.
    pub fn try_claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionGuard;

    #[test]
    fn only_first_claim_succeeds() {
        let guard = ExecutionGuard::new();
        assert!(!guard.is_claimed());
        assert!(guard.try_claim());
        assert!(!guard.try_claim());
        assert!(guard.is_claimed());
    }
}
