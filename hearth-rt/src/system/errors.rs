//! The uniform status codes every runtime operation returns.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
use thiserror::Error;

// Layer 3: Internal
// (none)

/// Result alias used across the runtime surface.
pub type RtResult<T> = Result<T, RtError>;

/// Status codes for runtime operations.
///
/// Every operation on the runtime, an actor context, a bus, or a supervisor
/// resolves to `Ok` or one of these codes; nothing unwinds across the
/// scheduler boundary. The deadline pair is deliberately split so callers
/// can tell "I chose not to wait" ([`RtError::WouldBlock`]) from "I waited
/// and nothing arrived" ([`RtError::Timeout`]).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtError {
    /// A fixed pool (mailbox entries, payload blocks, sync buffers, bus
    /// ring, actor slots) is exhausted. Recoverable: back off and retry.
    #[error("out of pool memory")]
    NoMemory,

    /// A malformed argument: stale or foreign id, self-directed rendezvous,
    /// oversized payload, unknown bus.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The deadline elapsed before the wait predicate was satisfied.
    #[error("timed out")]
    Timeout,

    /// A non-blocking call found the predicate unsatisfied.
    #[error("would block")]
    WouldBlock,

    /// The counterparty died mid-rendezvous, or the I/O handle was closed
    /// under a blocked request.
    #[error("peer closed")]
    Closed,

    /// Registry lookup failed.
    #[error("not found")]
    NotFound,

    /// The name (or subscription) is already taken.
    #[error("already exists")]
    Exists,
}

impl RtError {
    /// Whether the condition is transient: retrying after backoff can
    /// succeed without any other change.
    pub fn is_transient(&self) -> bool {
        matches!(self, RtError::NoMemory | RtError::WouldBlock)
    }

    /// Whether the code belongs to the deadline family.
    pub fn is_deadline(&self) -> bool {
        matches!(self, RtError::Timeout | RtError::WouldBlock)
    }

    /// Short stable mnemonic, useful in logs and diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            RtError::NoMemory => "no-memory",
            RtError::InvalidArgument(_) => "invalid-argument",
            RtError::Timeout => "timeout",
            RtError::WouldBlock => "would-block",
            RtError::Closed => "closed",
            RtError::NotFound => "not-found",
            RtError::Exists => "exists",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(RtError::NoMemory.to_string(), "out of pool memory");
        assert_eq!(
            RtError::InvalidArgument("bad id").to_string(),
            "invalid argument: bad id"
        );
        assert_eq!(RtError::Timeout.to_string(), "timed out");
    }

    #[test]
    fn test_transient_classification() {
        assert!(RtError::NoMemory.is_transient());
        assert!(RtError::WouldBlock.is_transient());
        assert!(!RtError::Timeout.is_transient());
        assert!(!RtError::Closed.is_transient());
        assert!(!RtError::Exists.is_transient());
    }

    #[test]
    fn test_deadline_classification() {
        assert!(RtError::Timeout.is_deadline());
        assert!(RtError::WouldBlock.is_deadline());
        assert!(!RtError::NoMemory.is_deadline());
        assert!(!RtError::NotFound.is_deadline());
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(RtError::NoMemory.code(), "no-memory");
        assert_eq!(RtError::InvalidArgument("x").code(), "invalid-argument");
        assert_eq!(RtError::WouldBlock.code(), "would-block");
        assert_eq!(RtError::Closed.code(), "closed");
    }

    #[test]
    fn test_error_is_copy_and_eq() {
        let a = RtError::Timeout;
        let b = a;
        assert_eq!(a, b);
        assert_ne!(RtError::Timeout, RtError::WouldBlock);
    }
}
