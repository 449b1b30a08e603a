use std::fmt;

/// Every failure the simulator core can report.
///
/// All core operations are total: they return one of these instead of
/// panicking, and any multi-step operation rolls its partial effects back
/// before the error surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// Construction parameter is zero or yields zero usable frames.
    InvalidConfig,
    /// No free frame available.
    OutOfMemory,
    /// Frame index outside `[0, num_frames)`.
    InvalidFrame { index: usize },
    /// Physical address outside `[0, total_bytes)`.
    InvalidAddress { address: usize },
    /// Requested process size is zero or above the configured maximum.
    InvalidSize { size: usize },
    /// Caller-supplied id collides with a live process.
    DuplicateId { id: u32 },
    /// Active-process count is already at the configured maximum.
    CapacityExceeded,
    /// No live process has this id.
    NotFound { id: u32 },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidConfig => {
                write!(f, "invalid configuration: zero frame size or zero usable frames")
            }
            SimError::OutOfMemory => write!(f, "no free frames in physical memory"),
            SimError::InvalidFrame { index } => write!(f, "invalid frame index {}", index),
            SimError::InvalidAddress { address } => {
                write!(f, "physical address {} out of range", address)
            }
            SimError::InvalidSize { size } => write!(f, "invalid process size {} bytes", size),
            SimError::DuplicateId { id } => write!(f, "process id {} is already in use", id),
            SimError::CapacityExceeded => write!(f, "maximum number of processes reached"),
            SimError::NotFound { id } => write!(f, "no process with id {}", id),
        }
    }
}

impl std::error::Error for SimError {}

/// Outcome of `PhysicalMemory::free_frame`.
///
/// Freeing a frame that is already free is benign and leaves the occupancy
/// table untouched, but callers may want to surface the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeOutcome {
    Freed,
    AlreadyFree,
}
