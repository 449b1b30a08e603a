use bitflags::bitflags;
use log::{debug, info, warn};

use crate::error::{FreeOutcome, SimError};
use crate::memory::PhysicalMemory;

bitflags! {
    /// Page-table entry flag word.
    ///
    /// `MODIFIED` is tracked and displayed but never set by any operation
    /// in this simulator; it is reserved for future dirty tracking.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u8 {
        const PRESENT = 1 << 0;
        const MODIFIED = 1 << 1;
    }
}

/// One entry of a process's page table: the frame currently backing the
/// page, if any, plus presence/modification metadata.
///
/// A present entry owns its frame exclusively; no two present entries
/// across live processes may reference the same frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    pub frame: Option<usize>,
    pub flags: PteFlags,
}

impl PageTableEntry {
    /// An entry with no backing frame.
    pub const fn unmapped() -> Self {
        PageTableEntry { frame: None, flags: PteFlags::empty() }
    }

    fn mapped(frame: usize) -> Self {
        PageTableEntry { frame: Some(frame), flags: PteFlags::PRESENT }
    }

    #[inline]
    pub fn present(&self) -> bool {
        self.flags.contains(PteFlags::PRESENT)
    }

    #[inline]
    pub fn modified(&self) -> bool {
        self.flags.contains(PteFlags::MODIFIED)
    }
}

/// A live simulated process: logical byte buffer plus the page table
/// mapping its pages onto physical frames.
pub struct Process {
    id: u32,
    size: usize,
    logical: Vec<u8>,
    page_table: Vec<PageTableEntry>,
}

impl Process {
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Logical address space size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn num_pages(&self) -> usize {
        self.page_table.len()
    }

    #[inline]
    pub fn page_table(&self) -> &[PageTableEntry] {
        &self.page_table
    }

    #[inline]
    pub fn logical_bytes(&self) -> &[u8] {
        &self.logical
    }
}

/// Summary row for `ProcessManager::list_processes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInfo {
    pub id: u32,
    pub size: usize,
    pub num_pages: usize,
}

/// Fill a logical buffer with opaque synthetic content, deterministic per
/// process id (xorshift keyed by the id).
fn fill_synthetic(id: u32, buf: &mut [u8]) {
    let mut state = (id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    for byte in buf.iter_mut() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        *byte = state as u8;
    }
}

/// Fixed-capacity arena of process slots.
///
/// A slot is either empty or holds exactly one live process; placement is
/// first-empty-slot, lookup is a linear scan. Ids are caller-supplied and
/// must be unique among live processes.
pub struct ProcessManager {
    slots: Vec<Option<Process>>,
    active: usize,
    max_process_size: usize,
}

impl ProcessManager {
    pub fn new(capacity: usize, max_process_size: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        ProcessManager { slots, active: 0, max_process_size }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn max_process_size(&self) -> usize {
        self.max_process_size
    }

    /// Create a process of `size` bytes, allocating one frame per page and
    /// copying the logical buffer into physical memory.
    ///
    /// All-or-nothing: if any frame allocation fails, every frame already
    /// bound to this attempt is released, the slot stays empty, and
    /// `OutOfMemory` is returned with the free-frame count exactly as it
    /// was before the call.
    pub fn create_process(
        &mut self,
        pm: &mut PhysicalMemory,
        id: u32,
        size: usize,
    ) -> Result<u32, SimError> {
        if self.active >= self.slots.len() {
            return Err(SimError::CapacityExceeded);
        }
        if self.find_process(id).is_some() {
            return Err(SimError::DuplicateId { id });
        }
        if size == 0 || size > self.max_process_size {
            return Err(SimError::InvalidSize { size });
        }
        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(SimError::CapacityExceeded)?;

        let frame_size = pm.frame_size();
        let num_pages = size.div_ceil(frame_size);

        let mut logical = vec![0u8; size];
        fill_synthetic(id, &mut logical);

        let mut page_table = vec![PageTableEntry::unmapped(); num_pages];
        Self::allocate_frames(pm, &mut page_table)?;

        let process = Process { id, size, logical, page_table };
        if let Err(e) = Self::copy_to_physical(pm, &process) {
            // Cannot happen for a well-formed page table, but keep the
            // all-or-nothing contract anyway.
            Self::release_frames(pm, &process.page_table);
            return Err(e);
        }

        info!("process {} created: {} bytes, {} pages", id, size, num_pages);
        self.slots[slot] = Some(process);
        self.active += 1;
        Ok(id)
    }

    /// Allocate one frame per page, in page order. On the first failure,
    /// free exactly the frames bound so far and reset their entries.
    fn allocate_frames(
        pm: &mut PhysicalMemory,
        page_table: &mut [PageTableEntry],
    ) -> Result<(), SimError> {
        for page in 0..page_table.len() {
            match pm.allocate_frame() {
                Ok(frame) => {
                    page_table[page] = PageTableEntry::mapped(frame);
                    debug!("page {} -> frame {}", page, frame);
                }
                Err(e) => {
                    warn!("allocation failed at page {}, rolling back", page);
                    Self::release_frames(pm, &page_table[..page]);
                    for entry in page_table[..page].iter_mut() {
                        *entry = PageTableEntry::unmapped();
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Copy the logical buffer into the frames backing each page. The final
    /// page copies only the bytes the process actually has.
    fn copy_to_physical(pm: &mut PhysicalMemory, process: &Process) -> Result<(), SimError> {
        let frame_size = pm.frame_size();
        for (page, entry) in process.page_table.iter().enumerate() {
            let Some(frame) = entry.frame else { continue };
            debug_assert!(!pm.is_frame_free(frame), "entry references an unowned frame");

            let logical_base = page * frame_size;
            if logical_base >= process.size {
                continue;
            }
            let count = frame_size.min(process.size - logical_base);
            let physical_base = pm.frame_base(frame);
            for i in 0..count {
                pm.write_byte(physical_base + i, process.logical[logical_base + i])?;
            }
            debug!("page {}: {} bytes copied to frame {}", page, count, frame);
        }
        Ok(())
    }

    fn release_frames(pm: &mut PhysicalMemory, entries: &[PageTableEntry]) {
        for entry in entries {
            if let Some(frame) = entry.frame {
                if pm.free_frame(frame) != Ok(FreeOutcome::Freed) {
                    warn!("frame {} was not owned at release", frame);
                }
            }
        }
    }

    /// Remove a live process, freeing every frame its present entries own.
    /// A second call with the same id is `NotFound` and changes nothing.
    pub fn remove_process(&mut self, pm: &mut PhysicalMemory, id: u32) -> Result<(), SimError> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|p| p.id == id))
            .ok_or(SimError::NotFound { id })?;

        let process = self.slots[slot].take().ok_or(SimError::NotFound { id })?;
        for entry in process.page_table.iter().filter(|e| e.present()) {
            if let Some(frame) = entry.frame {
                debug_assert!(!pm.is_frame_free(frame), "entry references an unowned frame");
                if pm.free_frame(frame) != Ok(FreeOutcome::Freed) {
                    warn!("frame {} was not owned by process {}", frame, id);
                }
            }
        }
        self.active -= 1;
        info!("process {} removed, {} pages reclaimed", id, process.num_pages());
        Ok(())
    }

    /// Look up a live process by id.
    pub fn find_process(&self, id: u32) -> Option<&Process> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .find(|p| p.id == id)
    }

    /// Summaries of all live processes, in slot order.
    pub fn list_processes(&self) -> Vec<ProcessInfo> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .map(|p| ProcessInfo { id: p.id, size: p.size, num_pages: p.num_pages() })
            .collect()
    }

    /// Read-only view of a live process's page table.
    pub fn page_table_view(&self, id: u32) -> Result<&[PageTableEntry], SimError> {
        self.find_process(id)
            .map(|p| p.page_table())
            .ok_or(SimError::NotFound { id })
    }

    /// Every frame referenced by a present entry across live processes.
    /// Used by invariant checks; the result must have no duplicates and
    /// match the set of occupied frames exactly.
    pub fn owned_frames(&self) -> Vec<usize> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .flat_map(|p| p.page_table.iter())
            .filter(|e| e.present())
            .filter_map(|e| e.frame)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FrameStats;

    fn small_memory(frames: usize) -> PhysicalMemory {
        PhysicalMemory::new(frames * 512, 512).unwrap()
    }

    /// No duplicate owned frames, and owned == occupied.
    fn assert_ownership_invariant(gp: &ProcessManager, pm: &PhysicalMemory) {
        let mut owned = gp.owned_frames();
        owned.sort_unstable();
        let deduped = owned.len();
        owned.dedup();
        assert_eq!(owned.len(), deduped, "duplicate frame ownership");

        let occupied: Vec<usize> =
            (0..pm.num_frames()).filter(|&f| !pm.is_frame_free(f)).collect();
        assert_eq!(owned, occupied);
    }

    #[test]
    fn test_create_process_maps_all_pages() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 8 * 512);

        let id = gp.create_process(&mut pm, 1, 3 * 512).unwrap();
        assert_eq!(id, 1);

        let process = gp.find_process(1).unwrap();
        assert_eq!(process.num_pages(), 3);
        assert!(process.page_table().iter().all(|e| e.present()));
        assert!(process.page_table().iter().all(|e| !e.modified()));
        assert_eq!(pm.frame_stats(), FrameStats { free: 13, occupied: 3 });
        assert_ownership_invariant(&gp, &pm);
    }

    #[test]
    fn test_page_count_rounds_up() {
        // 10000 bytes with 4096-byte frames: ceil(10000/4096) = 3 pages
        let mut pm = PhysicalMemory::new(16 * 4096, 4096).unwrap();
        let mut gp = ProcessManager::new(4, 64 * 1024);

        gp.create_process(&mut pm, 1, 10000).unwrap();
        assert_eq!(gp.find_process(1).unwrap().num_pages(), 3);
    }

    #[test]
    fn test_final_partial_page_copy() {
        // The last of 3 pages holds 10000 - 2*4096 = 1808 bytes
        let mut pm = PhysicalMemory::new(16 * 4096, 4096).unwrap();
        let mut gp = ProcessManager::new(4, 64 * 1024);
        gp.create_process(&mut pm, 1, 10000).unwrap();

        let process = gp.find_process(1).unwrap();
        let logical = process.logical_bytes().to_vec();
        let table = process.page_table().to_vec();

        let last_frame = table[2].frame.unwrap();
        let base = pm.frame_base(last_frame);
        for i in 0..1808 {
            assert_eq!(pm.read_byte(base + i).unwrap(), logical[2 * 4096 + i]);
        }
        // Bytes past the logical end were never written
        assert_eq!(pm.read_byte(base + 1808).unwrap(), 0);
    }

    #[test]
    fn test_copy_places_logical_content() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 8 * 512);
        gp.create_process(&mut pm, 7, 2 * 512).unwrap();

        let process = gp.find_process(7).unwrap();
        let logical = process.logical_bytes().to_vec();
        let table = process.page_table().to_vec();

        for (page, entry) in table.iter().enumerate() {
            let base = pm.frame_base(entry.frame.unwrap());
            for i in 0..512 {
                assert_eq!(pm.read_byte(base + i).unwrap(), logical[page * 512 + i]);
            }
        }
    }

    #[test]
    fn test_synthetic_content_deterministic_per_id() {
        let mut a = vec![0u8; 256];
        let mut b = vec![0u8; 256];
        fill_synthetic(5, &mut a);
        fill_synthetic(5, &mut b);
        assert_eq!(a, b);

        fill_synthetic(6, &mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_size_rejected() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 4 * 512);

        assert_eq!(
            gp.create_process(&mut pm, 1, 0),
            Err(SimError::InvalidSize { size: 0 })
        );
        assert_eq!(
            gp.create_process(&mut pm, 1, 4 * 512 + 1),
            Err(SimError::InvalidSize { size: 4 * 512 + 1 })
        );
        assert_eq!(gp.active_count(), 0);
        assert_eq!(pm.frame_stats().occupied, 0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 8 * 512);

        gp.create_process(&mut pm, 3, 512).unwrap();
        assert_eq!(
            gp.create_process(&mut pm, 3, 512),
            Err(SimError::DuplicateId { id: 3 })
        );
        assert_eq!(gp.active_count(), 1);
    }

    #[test]
    fn test_id_reusable_after_removal() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 8 * 512);

        gp.create_process(&mut pm, 3, 512).unwrap();
        gp.remove_process(&mut pm, 3).unwrap();
        assert_eq!(gp.create_process(&mut pm, 3, 512), Ok(3));
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(2, 8 * 512);

        gp.create_process(&mut pm, 1, 512).unwrap();
        gp.create_process(&mut pm, 2, 512).unwrap();
        assert_eq!(
            gp.create_process(&mut pm, 3, 512),
            Err(SimError::CapacityExceeded)
        );
        assert_eq!(gp.active_count(), 2);
        assert_eq!(pm.frame_stats().occupied, 2);
    }

    #[test]
    fn test_rollback_on_allocation_failure() {
        // 4 frames total, 1 already taken: a 4-page process cannot fit
        let mut pm = small_memory(4);
        let taken = pm.allocate_frame().unwrap();
        let before = pm.frame_stats();

        let mut gp = ProcessManager::new(4, 8 * 512);
        assert_eq!(
            gp.create_process(&mut pm, 1, 4 * 512),
            Err(SimError::OutOfMemory)
        );

        // All-or-nothing: free count restored, process absent
        assert_eq!(pm.frame_stats(), before);
        assert!(gp.find_process(1).is_none());
        assert!(gp.list_processes().is_empty());
        assert_eq!(gp.active_count(), 0);

        // The pre-existing allocation was not touched
        assert!(!pm.is_frame_free(taken));
    }

    #[test]
    fn test_rollback_frees_only_own_frames() {
        let mut pm = small_memory(4);
        let mut gp = ProcessManager::new(4, 8 * 512);

        // Victim owns frames 0 and 1
        gp.create_process(&mut pm, 1, 2 * 512).unwrap();
        // 2 frames left; a 3-page process fails after taking both
        assert_eq!(
            gp.create_process(&mut pm, 2, 3 * 512),
            Err(SimError::OutOfMemory)
        );

        let victim = gp.find_process(1).unwrap();
        assert!(victim.page_table().iter().all(|e| e.present()));
        assert_eq!(pm.frame_stats(), FrameStats { free: 2, occupied: 2 });
        assert_ownership_invariant(&gp, &pm);
    }

    #[test]
    fn test_remove_process_reclaims_frames() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 8 * 512);

        gp.create_process(&mut pm, 1, 3 * 512).unwrap();
        gp.create_process(&mut pm, 2, 2 * 512).unwrap();
        assert_eq!(pm.frame_stats().occupied, 5);

        gp.remove_process(&mut pm, 1).unwrap();
        assert_eq!(pm.frame_stats().occupied, 2);
        assert_eq!(gp.active_count(), 1);
        assert!(gp.find_process(1).is_none());
        assert_ownership_invariant(&gp, &pm);
    }

    #[test]
    fn test_remove_process_twice() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 8 * 512);

        gp.create_process(&mut pm, 1, 512).unwrap();
        gp.remove_process(&mut pm, 1).unwrap();

        let stats = pm.frame_stats();
        assert_eq!(
            gp.remove_process(&mut pm, 1),
            Err(SimError::NotFound { id: 1 })
        );
        assert_eq!(pm.frame_stats(), stats);
        assert_eq!(gp.active_count(), 0);
    }

    #[test]
    fn test_remove_unknown_id() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 8 * 512);
        assert_eq!(
            gp.remove_process(&mut pm, 99),
            Err(SimError::NotFound { id: 99 })
        );
    }

    #[test]
    fn test_list_processes_slot_order() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 8 * 512);

        gp.create_process(&mut pm, 10, 512).unwrap();
        gp.create_process(&mut pm, 20, 2 * 512).unwrap();
        gp.create_process(&mut pm, 30, 512).unwrap();
        gp.remove_process(&mut pm, 20).unwrap();

        // A new process takes the first empty slot
        gp.create_process(&mut pm, 40, 512).unwrap();

        let listed: Vec<u32> = gp.list_processes().iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![10, 40, 30]);

        let info = gp.list_processes()[0];
        assert_eq!((info.id, info.size, info.num_pages), (10, 512, 1));
    }

    #[test]
    fn test_page_table_view() {
        let mut pm = small_memory(16);
        let mut gp = ProcessManager::new(4, 8 * 512);

        gp.create_process(&mut pm, 1, 2 * 512).unwrap();
        let view = gp.page_table_view(1).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].frame, Some(0));
        assert_eq!(view[1].frame, Some(1));

        assert_eq!(gp.page_table_view(2), Err(SimError::NotFound { id: 2 }));
    }

    #[test]
    fn test_ownership_invariant_under_churn() {
        let mut pm = small_memory(32);
        let mut gp = ProcessManager::new(8, 16 * 512);

        for id in 1..=6 {
            gp.create_process(&mut pm, id, (id as usize) * 512).unwrap();
        }
        gp.remove_process(&mut pm, 2).unwrap();
        gp.remove_process(&mut pm, 5).unwrap();
        gp.create_process(&mut pm, 7, 4 * 512).unwrap();

        assert_ownership_invariant(&gp, &pm);
        let stats = pm.frame_stats();
        assert_eq!(stats.free + stats.occupied, pm.num_frames());
    }
}
