//! Restart decision logic shared by the supervisor loop.

// Layer 1: Standard library imports
use std::ops::Range;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::spec::{RestartPolicy, Strategy};
use crate::actor::ExitReason;

/// Whether a child with `policy` should be restarted after exiting with
/// `reason`.
///
/// - `Permanent`: always.
/// - `Transient`: only on abnormal exit (crash or kill).
/// - `Temporary`: never.
pub fn should_restart(policy: RestartPolicy, reason: ExitReason) -> bool {
    match policy {
        RestartPolicy::Permanent => true,
        RestartPolicy::Transient => reason != ExitReason::Normal,
        RestartPolicy::Temporary => false,
    }
}

/// The contiguous index range of children a restart cycle touches when
/// child `failed` (of `count`) died.
pub(crate) fn restart_range(strategy: Strategy, failed: usize, count: usize) -> Range<usize> {
    match strategy {
        Strategy::OneForOne => failed..failed + 1,
        Strategy::OneForAll => 0..count,
        Strategy::RestForOne => failed..count,
    }
}
