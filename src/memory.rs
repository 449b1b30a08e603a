use log::{debug, warn};

use crate::error::{FreeOutcome, SimError};

/// Free/occupied frame counts as reported by `frame_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub free: usize,
    pub occupied: usize,
}

/// Simulated physical memory: a contiguous byte store plus a frame
/// occupancy table.
///
/// Frames are addressed by zero-based index; `index * frame_size` is the
/// base physical address the frame covers. The struct is the sole owner of
/// frame storage — page tables only hold indices into it.
#[derive(Debug, PartialEq)]
pub struct PhysicalMemory {
    data: Box<[u8]>,
    frame_free: Box<[bool]>,
    frame_size: usize,
    num_frames: usize,
}

impl PhysicalMemory {
    /// Create a physical memory of `total_bytes` split into frames of
    /// `frame_size` bytes, all frames free and all bytes zeroed.
    ///
    /// A `total_bytes` that is not a multiple of `frame_size` is truncated
    /// to the largest whole number of frames; the remainder is not
    /// addressable. Fails with `InvalidConfig` when `frame_size` is zero or
    /// no whole frame fits.
    pub fn new(total_bytes: usize, frame_size: usize) -> Result<Self, SimError> {
        if frame_size == 0 {
            return Err(SimError::InvalidConfig);
        }
        let num_frames = total_bytes / frame_size;
        if num_frames == 0 {
            return Err(SimError::InvalidConfig);
        }

        let usable = num_frames * frame_size;
        if usable != total_bytes {
            warn!(
                "truncating physical memory from {} to {} bytes ({} whole frames)",
                total_bytes, usable, num_frames
            );
        }

        Ok(PhysicalMemory {
            data: vec![0u8; usable].into_boxed_slice(),
            frame_free: vec![true; num_frames].into_boxed_slice(),
            frame_size,
            num_frames,
        })
    }

    /// Total addressable bytes (a whole number of frames).
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Base physical address of a frame.
    #[inline]
    pub fn frame_base(&self, index: usize) -> usize {
        index * self.frame_size
    }

    #[inline]
    pub fn is_frame_free(&self, index: usize) -> bool {
        self.frame_free[index]
    }

    /// Allocate the lowest-indexed free frame (first fit) and mark it
    /// occupied.
    pub fn allocate_frame(&mut self) -> Result<usize, SimError> {
        for index in 0..self.num_frames {
            if self.frame_free[index] {
                self.frame_free[index] = false;
                debug!("frame {} allocated", index);
                return Ok(index);
            }
        }
        debug!("frame allocation failed: no free frames");
        Err(SimError::OutOfMemory)
    }

    /// Release a frame. Freeing an already-free frame is benign and changes
    /// nothing; an out-of-range index is `InvalidFrame` and changes nothing.
    pub fn free_frame(&mut self, index: usize) -> Result<FreeOutcome, SimError> {
        if index >= self.num_frames {
            return Err(SimError::InvalidFrame { index });
        }
        if self.frame_free[index] {
            warn!("freeing frame {} which is already free", index);
            return Ok(FreeOutcome::AlreadyFree);
        }
        self.frame_free[index] = true;
        debug!("frame {} freed", index);
        Ok(FreeOutcome::Freed)
    }

    /// Write one byte at a physical address.
    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), SimError> {
        if address >= self.data.len() {
            return Err(SimError::InvalidAddress { address });
        }
        self.data[address] = value;
        Ok(())
    }

    /// Read one byte from a physical address.
    pub fn read_byte(&self, address: usize) -> Result<u8, SimError> {
        if address >= self.data.len() {
            return Err(SimError::InvalidAddress { address });
        }
        Ok(self.data[address])
    }

    /// Count free and occupied frames. Always satisfies
    /// `free + occupied == num_frames`.
    pub fn frame_stats(&self) -> FrameStats {
        let free = self.frame_free.iter().filter(|&&f| f).count();
        FrameStats { free, occupied: self.num_frames - free }
    }
}
