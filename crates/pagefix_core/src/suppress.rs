/// How an intercepted call should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallReport {
    /// Log this call; `last` marks the final logged call before going quiet.
    Log { ordinal: u64, last: bool },
    Silent { ordinal: u64 },
}

/// Counter of calls swallowed by the suppressing sink.
///
/// The count only drives log rate-limiting; nothing else reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressorState {
    calls: u64,
    log_threshold: u64,
}

impl SuppressorState {
    pub fn new(log_threshold: u64) -> Self {
        Self {
            calls: 0,
            log_threshold,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn log_threshold(&self) -> u64 {
        self.log_threshold
    }

    pub fn record(&mut self) -> CallReport {
        self.calls = self.calls.saturating_add(1);
        let ordinal = self.calls;
        if ordinal <= self.log_threshold {
            CallReport::Log {
                ordinal,
                last: ordinal == self.log_threshold,
            }
        } else {
            CallReport::Silent { ordinal }
        }
    }
}
