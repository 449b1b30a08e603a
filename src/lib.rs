pub mod constants;
pub mod error;
pub mod memory;
pub mod process;
pub mod report;

// Re-export commonly used items for convenience
pub use constants::*;
pub use error::{FreeOutcome, SimError};
pub use memory::{FrameStats, PhysicalMemory};
pub use process::{PageTableEntry, Process, ProcessInfo, ProcessManager, PteFlags};
