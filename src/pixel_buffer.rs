//! Scoped pixel buffer: a sized, writable RGB byte region backed by either
//! POSIX shared memory or a memory-mapped temp file, with a stable external
//! name/path and release-on-drop semantics.
//!
//! This is the zero-copy hand-off mechanism between the render pipeline and
//! the terminal's image protocol: workers write pixels directly into this
//! region, and the published [`crate::request::RenderResult::path`] tells
//! the terminal where to read them from.

use std::fmt;
use std::os::fd::FromRawFd;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::MmapMut;
use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::{close, ftruncate};

use crate::error::{EngineError, EngineResult};

/// The out-of-process carrier for rendered pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    SharedMemory,
    TempFile,
}

impl Medium {
    pub fn as_str(self) -> &'static str {
        match self {
            Medium::SharedMemory => "shm",
            Medium::TempFile => "tempfile",
        }
    }
}

static SHM_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_shm_name() -> String {
    let id = SHM_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("/pdvu_{}_{}", std::process::id(), id)
}

enum Backing {
    /// `byte_size == 0`: no OS resource was allocated at all.
    Empty { identifier: String },
    SharedMemory {
        name: String,
        fd: RawFd,
        ptr: *mut u8,
        len: usize,
    },
    TempFile {
        path: String,
        mmap: MmapMut,
    },
}

/// Exclusive owner of a sized RGB region plus a stable external identifier.
/// Multiple strong references (via `Arc<PixelBuffer>`) may outlive a single
/// render: the coordinator's "currently published" slot and a page cache
/// entry may both hold one. The OS resource is unlinked when the last
/// reference drops.
pub struct PixelBuffer {
    backing: Backing,
    medium: Medium,
    size: usize,
}

// SAFETY: the backing pointer/mmap is only ever accessed through disjoint,
// non-overlapping byte ranges handed out by the coordinator (see
// `band_slice`); the buffer itself carries no interior mutability that
// would race across threads.
unsafe impl Send for PixelBuffer {}
unsafe impl Sync for PixelBuffer {}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("medium", &self.medium)
            .field("size", &self.size)
            .field("name", &self.name())
            .finish()
    }
}

impl PixelBuffer {
    /// Allocate a new buffer of `size_bytes` in the given medium. A
    /// `size_bytes == 0` request is a trivially successful empty buffer: no
    /// shared-memory object or temp file is created at all, sidestepping
    /// the platform-dependent behavior of zero-length `mmap`.
    pub fn create(size_bytes: usize, medium: Medium) -> EngineResult<Self> {
        if size_bytes == 0 {
            return Ok(Self {
                backing: Backing::Empty {
                    identifier: next_shm_name(),
                },
                medium,
                size: 0,
            });
        }

        match medium {
            Medium::SharedMemory => Self::create_shared_memory(size_bytes),
            Medium::TempFile => Self::create_temp_file(size_bytes),
        }
    }

    fn create_shared_memory(size_bytes: usize) -> EngineResult<Self> {
        let name = next_shm_name();
        let oflag = OFlag::O_CREAT | OFlag::O_RDWR | OFlag::O_EXCL;
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;
        let fd = shm_open(name.as_str(), oflag, mode)
            .map_err(|e| EngineError::ResourceFailure(format!("shm_open {name}: {e}")))?;
        let raw_fd: RawFd = fd_as_raw(&fd);

        if let Err(e) = ftruncate(&fd, size_bytes as i64) {
            let _ = close(raw_fd);
            let _ = shm_unlink(name.as_str());
            return Err(EngineError::ResourceFailure(format!(
                "ftruncate {name}: {e}"
            )));
        }

        let ptr = unsafe {
            mmap(
                None,
                std::num::NonZeroUsize::new(size_bytes).unwrap(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                Some(&fd),
                0,
            )
        };
        let ptr = match ptr {
            Ok(p) => p,
            Err(e) => {
                let _ = close(raw_fd);
                let _ = shm_unlink(name.as_str());
                return Err(EngineError::ResourceFailure(format!("mmap {name}: {e}")));
            }
        };

        // We keep the fd open for the buffer's lifetime (matches the
        // reference renderer's shm.cpp); it is closed in Drop.
        std::mem::forget(fd);

        Ok(Self {
            backing: Backing::SharedMemory {
                name,
                fd: raw_fd,
                ptr: ptr as *mut u8,
                len: size_bytes,
            },
            medium: Medium::SharedMemory,
            size: size_bytes,
        })
    }

    fn create_temp_file(size_bytes: usize) -> EngineResult<Self> {
        let dir = std::env::temp_dir();
        let template = dir.join("pdvu_XXXXXX");
        let mut path_bytes = template
            .to_str()
            .ok_or_else(|| EngineError::ResourceFailure("non-utf8 temp dir".into()))?
            .as_bytes()
            .to_vec();
        path_bytes.push(0);

        let raw_fd = unsafe {
            let ret = nix::libc::mkstemp(path_bytes.as_mut_ptr() as *mut nix::libc::c_char);
            if ret < 0 {
                return Err(EngineError::ResourceFailure("mkstemp failed".into()));
            }
            ret
        };
        path_bytes.pop();
        let path = String::from_utf8(path_bytes)
            .map_err(|e| EngineError::ResourceFailure(format!("temp path: {e}")))?;

        let owned_fd = unsafe { std::os::fd::OwnedFd::from_raw_fd(raw_fd) };
        if let Err(e) = ftruncate(&owned_fd, size_bytes as i64) {
            drop(owned_fd);
            let _ = std::fs::remove_file(&path);
            return Err(EngineError::ResourceFailure(format!(
                "ftruncate {path}: {e}"
            )));
        }

        let file = std::fs::File::from(owned_fd);
        let mmap = unsafe { MmapMut::map_mut(&file) };
        let mmap = match mmap {
            Ok(m) => m,
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                return Err(EngineError::ResourceFailure(format!("mmap {path}: {e}")));
            }
        };
        // `file` closes on drop here; the mapping stays valid independently
        // of the fd once established.

        Ok(Self {
            backing: Backing::TempFile { path, mmap },
            medium: Medium::TempFile,
            size: size_bytes,
        })
    }

    /// Stable external identifier: the shared-memory object name, or the
    /// mapped temp file path.
    pub fn name(&self) -> &str {
        match &self.backing {
            Backing::Empty { identifier } => identifier,
            Backing::SharedMemory { name, .. } => name,
            Backing::TempFile { path, .. } => path,
        }
    }

    pub fn medium(&self) -> Medium {
        self.medium
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Read-only snapshot of the buffer's contents into `dst`. Used by the
    /// coordinator's page-cache admission path to own a copy of
    /// shared-memory bytes (the shared-memory object's lifetime is tied to
    /// the terminal consumer, not the producer — see `PageCacheEntry`).
    pub fn copy_out(&self, dst: &mut [u8]) {
        assert!(dst.len() >= self.size);
        dst[..self.size].copy_from_slice(self.as_slice());
    }

    fn as_slice(&self) -> &[u8] {
        match &self.backing {
            Backing::Empty { .. } => &[],
            Backing::SharedMemory { ptr, len, .. } => unsafe {
                std::slice::from_raw_parts(*ptr, *len)
            },
            Backing::TempFile { mmap, .. } => &mmap[..],
        }
    }

    /// Exclusive, disjoint sub-slice of the buffer's bytes, handed to a
    /// single fan-out task. Safety: the caller (the coordinator) must
    /// guarantee `offset..offset+len` does not overlap any other live
    /// `band_slice` call on this buffer — true by construction for bands
    /// produced by [`crate::band::split_bounds`].
    pub unsafe fn band_slice(&self, offset: usize, len: usize) -> &mut [u8] {
        assert!(offset + len <= self.size, "band out of bounds");
        match &self.backing {
            Backing::Empty { .. } => &mut [],
            Backing::SharedMemory { ptr, .. } => {
                std::slice::from_raw_parts_mut(ptr.add(offset), len)
            }
            Backing::TempFile { mmap, .. } => {
                let base = mmap.as_ptr() as *mut u8;
                std::slice::from_raw_parts_mut(base.add(offset), len)
            }
        }
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        match &self.backing {
            Backing::Empty { .. } => {}
            Backing::SharedMemory { name, fd, ptr, len } => {
                if *len > 0 {
                    let _ = unsafe { munmap(*ptr as *mut _, *len) };
                }
                let _ = close(*fd);
                let _ = shm_unlink(name.as_str());
            }
            Backing::TempFile { path, .. } => {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

fn fd_as_raw(fd: &std::os::fd::OwnedFd) -> RawFd {
    use std::os::fd::AsRawFd;
    fd.as_raw_fd()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_memory_roundtrip_write_and_copy_out() {
        let buf = PixelBuffer::create(16, Medium::SharedMemory).unwrap();
        unsafe {
            let slice = buf.band_slice(0, 16);
            slice.copy_from_slice(&[7u8; 16]);
        }
        let mut out = vec![0u8; 16];
        buf.copy_out(&mut out);
        assert_eq!(out, vec![7u8; 16]);
        assert!(buf.name().starts_with("/pdvu_"));
    }

    #[test]
    fn temp_file_roundtrip_write_and_copy_out() {
        let buf = PixelBuffer::create(16, Medium::TempFile).unwrap();
        unsafe {
            let slice = buf.band_slice(0, 16);
            slice.copy_from_slice(&[9u8; 16]);
        }
        let mut out = vec![0u8; 16];
        buf.copy_out(&mut out);
        assert_eq!(out, vec![9u8; 16]);
        assert!(std::path::Path::new(buf.name()).exists());
    }

    #[test]
    fn temp_file_unlinked_on_drop() {
        let buf = PixelBuffer::create(16, Medium::TempFile).unwrap();
        let path = buf.name().to_string();
        drop(buf);
        assert!(!std::path::Path::new(&path).exists());
    }

    #[test]
    fn disjoint_band_writes_do_not_alias() {
        let buf = PixelBuffer::create(8, Medium::SharedMemory).unwrap();
        unsafe {
            buf.band_slice(0, 4).copy_from_slice(&[1, 1, 1, 1]);
            buf.band_slice(4, 4).copy_from_slice(&[2, 2, 2, 2]);
        }
        let mut out = vec![0u8; 8];
        buf.copy_out(&mut out);
        assert_eq!(out, vec![1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn zero_size_buffer_allocates_no_os_resource() {
        let buf = PixelBuffer::create(0, Medium::SharedMemory).unwrap();
        assert_eq!(buf.size(), 0);
        let mut out: Vec<u8> = Vec::new();
        buf.copy_out(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn shm_names_are_unique_per_process() {
        let a = PixelBuffer::create(4, Medium::SharedMemory).unwrap();
        let b = PixelBuffer::create(4, Medium::SharedMemory).unwrap();
        assert_ne!(a.name(), b.name());
    }
}
