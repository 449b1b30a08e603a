pub const DEFAULT_MEMORY_SIZE: usize = 1024 * 1024;

pub const DEFAULT_FRAME_SIZE: usize = 4096;

pub const DEFAULT_NUM_FRAMES: usize = DEFAULT_MEMORY_SIZE / DEFAULT_FRAME_SIZE;

/// Upper bound on a single process's logical address space.
pub const MAX_PROCESS_SIZE: usize = 64 * 1024;

/// Maximum number of concurrently live processes.
pub const MAX_PROCESSES: usize = 10;

/// Frames rendered per row when no width is given to `report::frame_map`.
pub const FRAMES_PER_LINE: usize = 64;
