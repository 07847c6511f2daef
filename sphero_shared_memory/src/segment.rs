//! Mapped memory backing the shared state.
//!
//! A segment is either a named file (normally under `/dev/shm`) that other
//! processes can attach to, or an anonymous mapping private to this
//! process. Its bytes are only ever viewed as [`Shared`] types, so every
//! access from any process goes through an atomic.
//!
//! ```text
//! ┌──────────────────────────┐ 0
//! │ SegmentHeader            │ magic, layout version, owner pid,
//! │                          │ lifecycle, rgbd lock and pointers
//! ├──────────────────────────┤ 64
//! │ regions (see `Layout`)   │ rings, audio, telemetry, battery,
//! │                          │ action slots, stream stats
//! ├──────────────────────────┤ config_offset
//! │ FleetConfig as JSON      │ read back by attaching processes
//! └──────────────────────────┘
//! ```
//!
//! The creator fills the header and the config blob, then publishes the
//! magic number with release ordering; attachers refuse a segment whose
//! magic is not set yet.

use crate::action::ActionSlot;
use crate::error::{StateError, StateResult};
use crate::lifecycle::LifecycleCell;
use crate::lock::SpinLock;
use crate::platform::{
    anonymous_mmap, attach_segment_mmap, create_segment_mmap, current_pid, is_process_alive,
};
use crate::stream::now_micros;
use memmap2::MmapMut;
use sphero_common::consts::{CACHE_LINE_SIZE, SHM_LAYOUT_VERSION, SHM_MAGIC};
use static_assertions::const_assert;
use std::fmt;
use std::mem::{align_of, size_of};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI8, AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Types that may be overlaid on mapped bytes.
///
/// # Safety
///
/// Implementors must accept every bit pattern (all-zero included) as a
/// valid value and must only be mutated through atomics.
pub unsafe trait Shared: Sync {}

// SAFETY: atomics of plain integers accept any bit pattern.
unsafe impl Shared for AtomicU8 {}
unsafe impl Shared for AtomicI8 {}
unsafe impl Shared for AtomicU16 {}
unsafe impl Shared for AtomicU32 {}
unsafe impl Shared for AtomicU64 {}

/// First cache line of every segment.
#[derive(Debug)]
#[repr(C, align(64))]
pub struct SegmentHeader {
    pub magic: AtomicU64,
    pub layout_version: AtomicU32,
    /// Process that created the segment and removes it on exit.
    pub owner_pid: AtomicU32,
    pub created_us: AtomicU64,
    pub config_offset: AtomicU64,
    pub config_len: AtomicU64,
    pub lifecycle: LifecycleCell,
    /// Process holding the lifecycle write capability, `0` if none.
    pub lifecycle_writer: AtomicU32,
    /// Guards both camera ring pointers.
    pub rgbd_lock: SpinLock,
    pub video_pointer: AtomicU32,
    pub depth_pointer: AtomicU32,
}

// SAFETY: every field is an atomic or a `Shared` wrapper around one.
unsafe impl Shared for SegmentHeader {}

pub const HEADER_LEN: usize = size_of::<SegmentHeader>();

const_assert!(HEADER_LEN == CACHE_LINE_SIZE);
const_assert!(align_of::<SegmentHeader>() == CACHE_LINE_SIZE);
const_assert!(align_of::<ActionSlot>() <= CACHE_LINE_SIZE);

/// One mapping of a segment.
pub struct Segment {
    path: Option<PathBuf>,
    base: NonNull<u8>,
    len: usize,
    owner: bool,
    _mmap: MmapMut,
}

// SAFETY: `base` points into `_mmap`, which lives as long as the segment, and
// the bytes are only reachable through `Shared` (atomic) views.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Create the named segment at `path` with `len` zeroed bytes.
    ///
    /// A leftover file whose owner is gone (or that was never fully
    /// initialised) is replaced.
    ///
    /// # Errors
    /// [`StateError::SegmentInUse`] while a live process owns the file.
    pub fn create(path: &Path, len: usize) -> StateResult<Self> {
        if path.exists() {
            match Self::attach(path) {
                Ok(existing) => {
                    let pid = existing.header().owner_pid.load(Ordering::Acquire);
                    if is_process_alive(pid) {
                        return Err(StateError::SegmentInUse {
                            path: path.to_path_buf(),
                            pid,
                        });
                    }
                    warn!(path = %path.display(), pid, "replacing segment of dead owner");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "replacing unusable segment"),
            }
        }
        let mmap = create_segment_mmap(path, len.max(HEADER_LEN))?;
        let segment = Self::from_mmap(mmap, Some(path.to_path_buf()), true)?;
        segment.init_header();
        debug!(path = %path.display(), len = segment.len, "segment created");
        Ok(segment)
    }

    /// Process-private segment of `len` zeroed bytes.
    pub fn anonymous(len: usize) -> StateResult<Self> {
        let segment = Self::from_mmap(anonymous_mmap(len.max(HEADER_LEN))?, None, true)?;
        segment.init_header();
        Ok(segment)
    }

    /// Map the published segment at `path`.
    ///
    /// # Errors
    /// [`StateError::SegmentNotFound`] if there is no file and
    /// [`StateError::InvalidSegment`] if it is too short, unpublished or
    /// of another layout version.
    pub fn attach(path: &Path) -> StateResult<Self> {
        if !path.exists() {
            return Err(StateError::SegmentNotFound {
                path: path.to_path_buf(),
            });
        }
        let invalid = |reason: String| StateError::InvalidSegment {
            path: path.to_path_buf(),
            reason,
        };
        let mmap = attach_segment_mmap(path)?;
        if mmap.len() < HEADER_LEN {
            return Err(invalid(format!("{} bytes, shorter than its header", mmap.len())));
        }
        let segment = Self::from_mmap(mmap, Some(path.to_path_buf()), false)?;
        let header = segment.header();
        let magic = header.magic.load(Ordering::Acquire);
        if magic != SHM_MAGIC {
            return Err(invalid(format!("bad magic {magic:#018x}")));
        }
        let version = header.layout_version.load(Ordering::Acquire);
        if version != SHM_LAYOUT_VERSION {
            return Err(invalid(format!(
                "layout version {version}, expected {SHM_LAYOUT_VERSION}"
            )));
        }
        Ok(segment)
    }

    fn from_mmap(mut mmap: MmapMut, path: Option<PathBuf>, owner: bool) -> StateResult<Self> {
        let len = mmap.len();
        let base = NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| StateError::InvalidSegment {
            path: path.clone().unwrap_or_default(),
            reason: "null mapping".to_string(),
        })?;
        if base.as_ptr() as usize % CACHE_LINE_SIZE != 0 {
            return Err(StateError::InvalidSegment {
                path: path.unwrap_or_default(),
                reason: "mapping is not cache-line aligned".to_string(),
            });
        }
        Ok(Self {
            path,
            base,
            len,
            owner,
            _mmap: mmap,
        })
    }

    fn init_header(&self) {
        let header = self.header();
        header.owner_pid.store(current_pid(), Ordering::Relaxed);
        header.created_us.store(now_micros(), Ordering::Relaxed);
        header
            .layout_version
            .store(SHM_LAYOUT_VERSION, Ordering::Relaxed);
    }

    /// Record where the config blob lives and make the segment attachable.
    pub(crate) fn publish(&self, config_offset: usize, config_len: usize) {
        let header = self.header();
        header
            .config_offset
            .store(config_offset as u64, Ordering::Relaxed);
        header.config_len.store(config_len as u64, Ordering::Relaxed);
        header.magic.store(SHM_MAGIC, Ordering::Release);
    }

    /// `(offset, len)` of the config blob as published by the creator.
    pub(crate) fn config_blob(&self) -> StateResult<(usize, usize)> {
        let header = self.header();
        let offset = usize::try_from(header.config_offset.load(Ordering::Acquire));
        let len = usize::try_from(header.config_len.load(Ordering::Acquire));
        match (offset, len) {
            (Ok(offset), Ok(len)) if offset.checked_add(len).is_some_and(|end| end <= self.len) => {
                Ok((offset, len))
            }
            _ => Err(StateError::InvalidSegment {
                path: self.path.clone().unwrap_or_default(),
                reason: "config blob outside the mapping".to_string(),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn owner_pid(&self) -> u32 {
        self.header().owner_pid.load(Ordering::Acquire)
    }

    pub fn header(&self) -> &SegmentHeader {
        self.at(0)
    }

    /// View the `T` at byte `offset`.
    ///
    /// # Panics
    /// If the value would fall outside the mapping or is misaligned.
    pub(crate) fn at<T: Shared>(&self, offset: usize) -> &T {
        &self.slice::<T>(offset, 1)[0]
    }

    /// View `count` consecutive `T` starting at byte `offset`.
    ///
    /// # Panics
    /// If the run would fall outside the mapping or is misaligned.
    pub(crate) fn slice<T: Shared>(&self, offset: usize, count: usize) -> &[T] {
        let bytes = count
            .checked_mul(size_of::<T>())
            .and_then(|n| n.checked_add(offset));
        assert!(
            bytes.is_some_and(|end| end <= self.len),
            "region {offset}+{count}x{} outside segment of {} bytes",
            size_of::<T>(),
            self.len
        );
        assert_eq!(offset % align_of::<T>(), 0, "misaligned region at {offset}");
        // SAFETY: bounds and alignment were checked above, the base is
        // cache-line aligned, `T: Shared` accepts any bit pattern, and the
        // mapping outlives the returned borrow of `self`.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(offset).cast::<T>(), count) }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("owner", &self.owner)
            .finish()
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "segment removed"),
                Err(e) => warn!(path = %path.display(), error = %e, "segment removal failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEAD_PID: u32 = 0x7FFF_FFF0;

    #[test]
    fn attach_sees_creator_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sphero_test");
        let owner = Segment::create(&path, 4096).unwrap();
        owner.publish(4096, 0);
        let other = Segment::attach(&path).unwrap();

        owner.at::<AtomicU32>(128).store(7, Ordering::Release);
        assert_eq!(other.at::<AtomicU32>(128).load(Ordering::Acquire), 7);
        other.header().video_pointer.store(3, Ordering::Release);
        assert_eq!(owner.header().video_pointer.load(Ordering::Acquire), 3);
        assert_eq!(other.owner_pid(), current_pid());
    }

    #[test]
    fn unpublished_segment_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sphero_test");
        let _owner = Segment::create(&path, 4096).unwrap();
        assert!(matches!(
            Segment::attach(&path),
            Err(StateError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn live_owner_blocks_second_creator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sphero_test");
        let owner = Segment::create(&path, 4096).unwrap();
        owner.publish(4096, 0);
        match Segment::create(&path, 4096) {
            Err(StateError::SegmentInUse { pid, .. }) => assert_eq!(pid, current_pid()),
            other => panic!("expected SegmentInUse, got {other:?}"),
        }
    }

    #[test]
    fn segment_of_dead_owner_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sphero_test");
        let stale = Segment::create(&path, 4096).unwrap();
        stale.publish(4096, 0);
        stale.header().owner_pid.store(DEAD_PID, Ordering::Release);
        stale.at::<AtomicU32>(256).store(99, Ordering::Release);
        // Keep the file behind as a crashed owner would.
        std::mem::forget(stale);

        let fresh = Segment::create(&path, 4096).unwrap();
        assert_eq!(fresh.owner_pid(), current_pid());
        assert_eq!(fresh.at::<AtomicU32>(256).load(Ordering::Acquire), 0);
    }

    #[test]
    fn owner_removes_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sphero_test");
        let owner = Segment::create(&path, 4096).unwrap();
        owner.publish(4096, 0);
        let other = Segment::attach(&path).unwrap();
        drop(other);
        assert!(path.exists());
        drop(owner);
        assert!(!path.exists());
        assert!(matches!(
            Segment::attach(&path),
            Err(StateError::SegmentNotFound { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "outside segment")]
    fn out_of_bounds_view_panics() {
        let segment = Segment::anonymous(256).unwrap();
        let _ = segment.slice::<AtomicU64>(200, 8);
    }
}
