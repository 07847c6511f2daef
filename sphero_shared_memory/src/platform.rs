//! Linux mapping and process helpers

use crate::error::StateResult;
use memmap2::{MmapMut, MmapOptions};
use nix::sys::signal::kill;
use nix::unistd::{Pid, getpid};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Create (or truncate) the segment file, size it and map it shared.
///
/// The file starts zero-filled, which every overlaid type accepts as its
/// initial value.
pub fn create_segment_mmap(path: &Path, len: usize) -> StateResult<MmapMut> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .mode(0o600) // Owner read/write only
        .open(path)?;
    file.set_len(len as u64)?;

    // SAFETY: the file was just sized for this mapping; its contents are only
    // accessed through atomics overlaid by `Segment`.
    let mmap = unsafe { MmapOptions::new().populate().map_mut(&file)? };
    Ok(mmap)
}

/// Map an existing segment file.
pub fn attach_segment_mmap(path: &Path) -> StateResult<MmapMut> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;

    // SAFETY: see `create_segment_mmap`.
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

/// Zero-filled private mapping for single-process use.
pub fn anonymous_mmap(len: usize) -> StateResult<MmapMut> {
    Ok(MmapMut::map_anon(len)?)
}

/// Check if process is alive using kill(pid, 0)
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::Error::ESRCH) => false,
        Err(nix::Error::EPERM) => true, // Exists, owned by someone else
        Err(_) => false,
    }
}

pub fn current_pid() -> u32 {
    getpid().as_raw() as u32
}
