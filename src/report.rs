//! Textual reports over simulator state.
//!
//! Everything here is pure formatting: functions take core state and return
//! a `String`, never printing. The binary decides where the text goes.

use std::fmt::Write;

use crate::constants::FRAMES_PER_LINE;
use crate::error::SimError;
use crate::memory::PhysicalMemory;
use crate::process::ProcessManager;

/// Totals, frame counts and utilization of a physical memory.
pub fn memory_status(pm: &PhysicalMemory) -> String {
    let stats = pm.frame_stats();
    let utilization = stats.occupied as f64 / pm.num_frames() as f64 * 100.0;

    let mut out = String::new();
    writeln!(out, "=== Physical Memory Status ===").unwrap();
    writeln!(out, "Total size: {} bytes", pm.total_bytes()).unwrap();
    writeln!(out, "Frame size: {} bytes", pm.frame_size()).unwrap();
    writeln!(out, "Total frames: {}", pm.num_frames()).unwrap();
    writeln!(out, "Free frames: {}", stats.free).unwrap();
    writeln!(out, "Occupied frames: {}", stats.occupied).unwrap();
    writeln!(out, "Utilization: {:.2}%", utilization).unwrap();
    out
}

/// Occupancy grid, one character per frame: `.` free, `#` occupied.
/// Rows are prefixed with the starting frame index and grouped every
/// 8 frames. A `frames_per_line` of 0 falls back to the default width.
pub fn frame_map(pm: &PhysicalMemory, frames_per_line: usize) -> String {
    let per_line = if frames_per_line == 0 { FRAMES_PER_LINE } else { frames_per_line };

    let mut out = String::new();
    writeln!(out, "=== Frame Map ({} frames, . free / # occupied) ===", pm.num_frames())
        .unwrap();

    for row_start in (0..pm.num_frames()).step_by(per_line) {
        write!(out, "{:>6}: ", row_start).unwrap();
        let row_end = (row_start + per_line).min(pm.num_frames());
        for index in row_start..row_end {
            out.push(if pm.is_frame_free(index) { '.' } else { '#' });
            if (index - row_start + 1) % 8 == 0 && index + 1 < row_end {
                out.push(' ');
            }
        }
        out.push('\n');
    }
    out
}

/// Table of live processes: id, size and page count, in slot order.
pub fn process_list(gp: &ProcessManager) -> String {
    let processes = gp.list_processes();

    let mut out = String::new();
    writeln!(out, "=== Processes ===").unwrap();
    if processes.is_empty() {
        writeln!(out, "No active processes.").unwrap();
        return out;
    }

    writeln!(out, "{:>4} | {:>12} | {:>5}", "id", "size (bytes)", "pages").unwrap();
    for info in &processes {
        writeln!(out, "{:>4} | {:>12} | {:>5}", info.id, info.size, info.num_pages).unwrap();
    }
    writeln!(out, "Active: {}", processes.len()).unwrap();
    out
}

/// Per-page listing of a process's page table, with a presence summary.
pub fn page_table_report(gp: &ProcessManager, id: u32) -> Result<String, SimError> {
    let process = gp.find_process(id).ok_or(SimError::NotFound { id })?;
    let table = process.page_table();

    let mut out = String::new();
    writeln!(out, "=== Page Table - Process {} ===", id).unwrap();
    writeln!(out, "Size: {} bytes, pages: {}", process.size(), process.num_pages()).unwrap();
    writeln!(out, "{:>5} | {:>6} | {:>7} | {:>8}", "page", "frame", "present", "modified")
        .unwrap();

    for (page, entry) in table.iter().enumerate() {
        let frame = match entry.frame {
            Some(f) => f.to_string(),
            None => "-".to_string(),
        };
        writeln!(
            out,
            "{:>5} | {:>6} | {:>7} | {:>8}",
            page,
            frame,
            if entry.present() { "yes" } else { "no" },
            if entry.modified() { "yes" } else { "no" },
        )
        .unwrap();
    }

    let present = table.iter().filter(|e| e.present()).count();
    let modified = table.iter().filter(|e| e.modified()).count();
    writeln!(
        out,
        "Present: {}/{} ({:.1}%), modified: {}/{}",
        present,
        table.len(),
        present as f64 / table.len() as f64 * 100.0,
        modified,
        table.len(),
    )
    .unwrap();
    Ok(out)
}
