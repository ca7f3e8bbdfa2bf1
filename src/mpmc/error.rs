use std::fmt;

/// Construction failure for [`crate::mpmc::Channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The backing buffer for `capacity` slots could not be allocated.
    AllocationFailed,
    /// `capacity` was less than 2 — the per-slot stamp scheme needs at
    /// least two slots to tell "just written" apart from "ready for the
    /// next lap" (see [`crate::mpmc::Channel::new`]).
    CapacityTooSmall,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::AllocationFailed => write!(f, "failed to allocate channel buffer"),
            InitError::CapacityTooSmall => write!(f, "channel capacity must be at least 2"),
        }
    }
}

impl std::error::Error for InitError {}

/// Returned by [`crate::mpmc::Channel::try_send`] when the channel cannot
/// accept `msg` right now. Carries the message back to the caller, which
/// still owns it — the channel never takes ownership on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrySendError<T>(pub T);

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel is full")
    }
}

impl<T: fmt::Debug> std::error::Error for TrySendError<T> {}

/// Returned by [`crate::mpmc::Channel::try_recv`] when no message is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryRecvError;

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel is empty")
    }
}

impl std::error::Error for TryRecvError {}
