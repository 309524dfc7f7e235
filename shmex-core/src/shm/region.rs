// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedMemoryRegion - POSIX shared memory wrapper.
//!
//! Provides safe abstraction over `shm_open` and `mmap` for named regions.
//! Every region starts with a [`FrameHeader`]; the payload area follows it.
//! All unsafe operations are encapsulated with bounds checking.

use std::ffi::CString;
use std::ptr::NonNull;
use std::time::{Duration, Instant};

use crate::error::SharedMemoryError;
use crate::shm::frame::{FrameHeader, FRAME_HEADER_SIZE};
use crate::types::Capacity;

/// How long an attach waits for a concurrent creator to size the object and
/// write its frame header.
const ATTACH_TIMEOUT: Duration = Duration::from_millis(50);

/// Delay between attach attempts while the creator is still initializing.
const ATTACH_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Represents a mapped shared memory region.
///
/// This struct owns the mapping and unmaps it on drop. It never unlinks the
/// backing object: the region outlives the process until [`SharedMemoryRegion::unlink`]
/// is called, so a reader started later can still attach.
pub struct SharedMemoryRegion {
    /// Name of the shared memory object (without the leading slash).
    name: String,
    /// Pointer to the start of the mapping (frame header).
    ptr: NonNull<u8>,
    /// Length of the mapping in bytes, header included.
    mapped_len: usize,
    /// File descriptor for the shared memory object.
    fd: i32,
    /// Whether the mapping is `PROT_WRITE`.
    writable: bool,
}

// SAFETY: SharedMemoryRegion owns its mapping; the pointer stays valid until drop.
unsafe impl Send for SharedMemoryRegion {}

// SAFETY: Shared access goes through the atomic frame header and the sequence lock.
unsafe impl Sync for SharedMemoryRegion {}

impl SharedMemoryRegion {
    /// Create a region, or attach to an existing one with the same name.
    ///
    /// # Arguments
    /// * `name` - Name of the shared memory object (will be prefixed with /)
    /// * `capacity` - Payload capacity in bytes, excluding the frame header
    ///
    /// # Errors
    /// Returns `InvalidCapacity` for a zero or oversized capacity,
    /// `IncompatibleSize` if an existing region is smaller than requested,
    /// and `CreateFailed`/`MapFailed` when the OS refuses the mapping.
    pub fn create_or_open(name: &str, capacity: u64) -> Result<Self, SharedMemoryError> {
        if capacity == 0 {
            return Err(SharedMemoryError::InvalidCapacity {
                capacity,
                reason: "Capacity must be positive".to_string(),
            });
        }
        if capacity > Capacity::MAX {
            return Err(SharedMemoryError::InvalidCapacity {
                capacity,
                reason: format!("Capacity exceeds maximum {}", Capacity::MAX),
            });
        }

        let c_name = shm_path(name)?;
        let mapped_len = FRAME_HEADER_SIZE + capacity as usize;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };

        if fd >= 0 {
            return Self::initialize(name, &c_name, fd, mapped_len, capacity);
        }

        let errno = std::io::Error::last_os_error();
        if errno.raw_os_error() != Some(libc::EEXIST) {
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        // Somebody created it first: attach read-write.
        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", std::io::Error::last_os_error()),
            });
        }

        let region = Self::attach(name, fd, true)?;
        let existing = region.capacity() as u64;
        if existing < capacity {
            return Err(SharedMemoryError::IncompatibleSize {
                name: name.to_string(),
                existing,
                requested: capacity,
            });
        }

        tracing::debug!(
            name = %name,
            capacity = existing,
            requested = capacity,
            "Attached to existing shared memory region"
        );

        Ok(region)
    }

    /// Open an existing region read-only.
    ///
    /// # Errors
    /// Returns `RegionNotFound` if no object with that name exists.
    pub fn open(name: &str) -> Result<Self, SharedMemoryError> {
        let c_name = shm_path(name)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Err(SharedMemoryError::RegionNotFound {
                    name: name.to_string(),
                });
            }
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        let region = Self::attach(name, fd, false)?;

        tracing::debug!(
            name = %name,
            capacity = region.capacity(),
            "Opened shared memory region"
        );

        Ok(region)
    }

    /// Remove the named object. Existing mappings stay valid until they are dropped.
    ///
    /// Returns `false` if no object with that name existed.
    pub fn unlink(name: &str) -> Result<bool, SharedMemoryError> {
        let c_name = shm_path(name)?;

        // SAFETY: c_name is a valid CString
        let result = unsafe { libc::shm_unlink(c_name.as_ptr()) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Ok(false);
            }
            return Err(SharedMemoryError::UnlinkFailed {
                name: name.to_string(),
                reason: format!("shm_unlink failed: {}", errno),
            });
        }

        tracing::debug!(name = %name, "Unlinked shared memory region");
        Ok(true)
    }

    /// Size a freshly created object, map it and write the frame header.
    fn initialize(
        name: &str,
        c_name: &CString,
        fd: i32,
        mapped_len: usize,
        capacity: u64,
    ) -> Result<Self, SharedMemoryError> {
        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, mapped_len as libc::off_t) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        let ptr = match map(fd, mapped_len, true) {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                return Err(e);
            }
        };

        let region = Self {
            name: name.to_string(),
            ptr,
            mapped_len,
            fd,
            writable: true,
        };

        // ftruncate zero-fills, so only the header fields need setting.
        region.header().initialize(capacity);

        tracing::debug!(name = %name, capacity = capacity, "Created shared memory region");

        Ok(region)
    }

    /// Map an already-open object and validate its frame header.
    ///
    /// A concurrent creator may not have sized the object or written the header
    /// yet, so this polls for up to [`ATTACH_TIMEOUT`] before giving up.
    fn attach(name: &str, fd: i32, writable: bool) -> Result<Self, SharedMemoryError> {
        let deadline = Instant::now() + ATTACH_TIMEOUT;

        let (ptr, size) = loop {
            match map_initialized(fd, writable) {
                Ok(Mapping::Ready { ptr, size }) => break (ptr, size),
                Ok(Mapping::Pending { size }) if Instant::now() >= deadline => {
                    unsafe { libc::close(fd) };
                    return Err(SharedMemoryError::CreateFailed {
                        name: name.to_string(),
                        reason: pending_reason(size, name),
                    });
                }
                Ok(Mapping::Pending { .. }) => std::thread::sleep(ATTACH_POLL_INTERVAL),
                Err(e) => {
                    unsafe { libc::close(fd) };
                    return Err(match e {
                        AttachError::Stat(e) => SharedMemoryError::CreateFailed {
                            name: name.to_string(),
                            reason: format!("fstat failed: {}", e),
                        },
                        AttachError::Map(e) => e,
                    });
                }
            }
        };

        // From here on Drop releases the mapping and the descriptor.
        let region = Self {
            name: name.to_string(),
            ptr,
            mapped_len: size,
            fd,
            writable,
        };

        let declared = region.header().capacity();
        if declared == 0 || declared as usize > size - FRAME_HEADER_SIZE {
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!(
                    "Header declares capacity {} but only {} payload bytes are mapped",
                    declared,
                    size - FRAME_HEADER_SIZE
                ),
            });
        }

        Ok(region)
    }

    /// Get the name of this shared memory region.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload capacity in bytes, as declared by the creator.
    pub fn capacity(&self) -> usize {
        self.header().capacity() as usize
    }

    /// Length of the whole mapping, frame header included.
    pub fn mapped_len(&self) -> usize {
        self.mapped_len
    }

    /// Whether this handle may publish frames.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Frame header at offset zero.
    pub(crate) fn header(&self) -> &FrameHeader {
        // SAFETY: the mapping is page-aligned and at least FRAME_HEADER_SIZE bytes
        // (checked at creation/attach); FrameHeader is repr(C) and made of atomics.
        unsafe { &*(self.ptr.as_ptr() as *const FrameHeader) }
    }

    /// Pointer to the payload area right after the header.
    pub(crate) fn data_ptr(&self) -> *mut u8 {
        // SAFETY: FRAME_HEADER_SIZE is within the mapping bounds
        unsafe { self.ptr.as_ptr().add(FRAME_HEADER_SIZE) }
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and mapped_len were set when mapping
        let result =
            unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.mapped_len) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared memory"
            );
        }

        // SAFETY: fd was opened when mapping
        unsafe { libc::close(self.fd) };
    }
}

/// Build the `/name` path passed to `shm_open`.
fn shm_path(name: &str) -> Result<CString, SharedMemoryError> {
    if name.is_empty() {
        return Err(SharedMemoryError::CreateFailed {
            name: name.to_string(),
            reason: "Name cannot be empty".to_string(),
        });
    }
    if name.contains('/') {
        return Err(SharedMemoryError::CreateFailed {
            name: name.to_string(),
            reason: "Name cannot contain '/'".to_string(),
        });
    }

    CString::new(format!("/{}", name)).map_err(|e| SharedMemoryError::CreateFailed {
        name: name.to_string(),
        reason: format!("Invalid name: {}", e),
    })
}

/// Current size of the object behind `fd`.
fn object_size(fd: i32) -> std::io::Result<usize> {
    let mut stat = std::mem::MaybeUninit::<libc::stat>::uninit();

    // SAFETY: fd is valid and stat points to writable storage of the right type
    let result = unsafe { libc::fstat(fd, stat.as_mut_ptr()) };
    if result < 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: fstat succeeded and initialized the struct
    let stat = unsafe { stat.assume_init() };
    usize::try_from(stat.st_size)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "negative object size"))
}

/// State of an existing object as seen by one attach attempt.
enum Mapping {
    /// Mapped, with a published frame header.
    Ready { ptr: NonNull<u8>, size: usize },
    /// Too small or not yet stamped with the frame magic. Nothing stays mapped.
    Pending { size: usize },
}

enum AttachError {
    Stat(std::io::Error),
    Map(SharedMemoryError),
}

/// Map the object behind `fd` if its creator has finished initializing it.
fn map_initialized(fd: i32, writable: bool) -> Result<Mapping, AttachError> {
    let size = object_size(fd).map_err(AttachError::Stat)?;
    if size < FRAME_HEADER_SIZE {
        return Ok(Mapping::Pending { size });
    }

    let ptr = map(fd, size, writable).map_err(AttachError::Map)?;

    // SAFETY: the mapping is page-aligned and at least FRAME_HEADER_SIZE bytes;
    // FrameHeader is repr(C) and made of atomics.
    let header = unsafe { &*(ptr.as_ptr() as *const FrameHeader) };
    if header.is_initialized() {
        return Ok(Mapping::Ready { ptr, size });
    }

    // SAFETY: ptr/size describe the mapping created just above
    unsafe { libc::munmap(ptr.as_ptr() as *mut libc::c_void, size) };
    Ok(Mapping::Pending { size })
}

/// Error text for an object that never became a usable region.
fn pending_reason(size: usize, name: &str) -> String {
    let problem = if size < FRAME_HEADER_SIZE {
        format!(
            "Object is {} bytes, smaller than the {}-byte frame header",
            size, FRAME_HEADER_SIZE
        )
    } else {
        "Object has no frame header".to_string()
    };

    format!(
        "{} after {}ms. It is not a shmex region, or its creator exited while initializing it; \
         remove it with `shmex remove --name {}` and retry",
        problem,
        ATTACH_TIMEOUT.as_millis(),
        name
    )
}

/// `mmap` the whole object shared, read-only or read-write.
fn map(fd: i32, len: usize, writable: bool) -> Result<NonNull<u8>, SharedMemoryError> {
    let prot = if writable {
        libc::PROT_READ | libc::PROT_WRITE
    } else {
        libc::PROT_READ
    };

    // SAFETY: fd is valid, len is non-zero and matches the object size, offset 0 is valid
    let ptr = unsafe { libc::mmap(std::ptr::null_mut(), len, prot, libc::MAP_SHARED, fd, 0) };

    if ptr == libc::MAP_FAILED {
        return Err(SharedMemoryError::MapFailed {
            reason: format!("mmap failed: {}", std::io::Error::last_os_error()),
        });
    }

    NonNull::new(ptr as *mut u8).ok_or_else(|| SharedMemoryError::MapFailed {
        reason: "mmap returned a null pointer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("shmex-region-{}-{}", tag, std::process::id())
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = SharedMemoryRegion::create_or_open(&unique("zero"), 0)
            .err()
            .unwrap();
        assert!(matches!(err, SharedMemoryError::InvalidCapacity { .. }));
    }

    #[test]
    fn test_capacity_too_large_rejected() {
        let err = SharedMemoryRegion::create_or_open(&unique("huge"), Capacity::MAX + 1)
            .err()
            .unwrap();
        assert!(matches!(err, SharedMemoryError::InvalidCapacity { .. }));
    }

    #[test]
    fn test_invalid_names() {
        assert!(SharedMemoryRegion::create_or_open("", 64).is_err());
        assert!(SharedMemoryRegion::create_or_open("a/b", 64).is_err());
        assert!(SharedMemoryRegion::create_or_open("nul\0", 64).is_err());
    }

    #[test]
    fn test_open_missing_region() {
        let err = SharedMemoryRegion::open(&unique("missing")).err().unwrap();
        assert!(matches!(err, SharedMemoryError::RegionNotFound { .. }));
    }

    #[test]
    fn test_create_then_open() {
        let name = unique("create");
        let writer = SharedMemoryRegion::create_or_open(&name, 1000).unwrap();
        assert_eq!(writer.capacity(), 1000);
        assert_eq!(writer.mapped_len(), FRAME_HEADER_SIZE + 1000);
        assert!(writer.is_writable());

        let reader = SharedMemoryRegion::open(&name).unwrap();
        assert_eq!(reader.capacity(), 1000);
        assert!(!reader.is_writable());

        assert!(SharedMemoryRegion::unlink(&name).unwrap());
        assert!(!SharedMemoryRegion::unlink(&name).unwrap());
    }

    #[test]
    fn test_reattach_capacity_rules() {
        let name = unique("reattach");
        let _first = SharedMemoryRegion::create_or_open(&name, 512).unwrap();

        let smaller = SharedMemoryRegion::create_or_open(&name, 128).unwrap();
        assert_eq!(smaller.capacity(), 512);

        let err = SharedMemoryRegion::create_or_open(&name, 513).err().unwrap();
        assert!(matches!(
            err,
            SharedMemoryError::IncompatibleSize {
                existing: 512,
                requested: 513,
                ..
            }
        ));

        SharedMemoryRegion::unlink(&name).unwrap();
    }

    /// Leave behind an object the way a creator that died before writing the
    /// header would: sized to `len` bytes of zeros, no magic.
    fn create_stale_object(name: &str, len: usize) {
        let c_name = shm_path(name).unwrap();
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };
        assert!(fd >= 0, "{}", std::io::Error::last_os_error());
        assert_eq!(unsafe { libc::ftruncate(fd, len as libc::off_t) }, 0);
        unsafe { libc::close(fd) };
    }

    fn assert_points_to_remove(err: SharedMemoryError, name: &str) {
        match err {
            SharedMemoryError::CreateFailed { reason, .. } => {
                assert!(reason.contains("shmex remove"), "{}", reason);
                assert!(reason.contains(name), "{}", reason);
            }
            other => panic!("expected CreateFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_object_without_header() {
        let name = unique("stale-header");
        create_stale_object(&name, FRAME_HEADER_SIZE + 64);

        let err = SharedMemoryRegion::create_or_open(&name, 64).err().unwrap();
        assert_points_to_remove(err, &name);
        let err = SharedMemoryRegion::open(&name).err().unwrap();
        assert_points_to_remove(err, &name);

        // Removing it is enough to recover.
        assert!(SharedMemoryRegion::unlink(&name).unwrap());
        let region = SharedMemoryRegion::create_or_open(&name, 64).unwrap();
        assert_eq!(region.capacity(), 64);
        SharedMemoryRegion::unlink(&name).unwrap();
    }

    #[test]
    fn test_stale_empty_object() {
        let name = unique("stale-empty");
        create_stale_object(&name, 0);

        let started = Instant::now();
        let err = SharedMemoryRegion::open(&name).err().unwrap();
        assert!(started.elapsed() >= ATTACH_TIMEOUT);
        assert_points_to_remove(err, &name);

        SharedMemoryRegion::unlink(&name).unwrap();
    }

    #[test]
    fn test_attach_waits_for_creator() {
        let name = unique("late-header");
        create_stale_object(&name, 0);

        // Finish initializing from another thread while the attach is polling.
        let creator = {
            let name = name.clone();
            std::thread::spawn(move || {
                std::thread::sleep(ATTACH_TIMEOUT / 10);
                let c_name = shm_path(&name).unwrap();
                let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
                assert!(fd >= 0);
                let len = FRAME_HEADER_SIZE + 128;
                assert_eq!(unsafe { libc::ftruncate(fd, len as libc::off_t) }, 0);
                let ptr = map(fd, len, true).unwrap();
                let header = unsafe { &*(ptr.as_ptr() as *const FrameHeader) };
                header.initialize(128);
                unsafe { libc::munmap(ptr.as_ptr() as *mut libc::c_void, len) };
                unsafe { libc::close(fd) };
            })
        };

        let region = SharedMemoryRegion::create_or_open(&name, 128).unwrap();
        assert_eq!(region.capacity(), 128);
        creator.join().unwrap();

        SharedMemoryRegion::unlink(&name).unwrap();
    }
}
