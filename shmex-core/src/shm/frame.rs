// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Frame header and sequence lock.
//!
//! Every region starts with a fixed 64-byte header describing the payload that
//! follows it: kind, schema id, exact length and CRC32. A sequence counter in the
//! header implements a single-writer/multi-reader seqlock:
//!
//! * even, non-zero: a complete frame is published
//! * odd: a write is in progress
//! * zero: nothing has ever been published
//!
//! Readers copy the frame out and re-check the sequence afterwards, so a
//! concurrent write is reported instead of being decoded.

use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};

use crate::error::SharedMemoryError;
use crate::shm::validator::{PayloadKind, PayloadValidator};
use crate::shm::SharedMemoryRegion;

/// Identifies a framed region ("SHMX" in little-endian byte order).
pub const FRAME_MAGIC: u32 = 0x584D_4853;

/// Layout version of [`FrameHeader`].
pub const FRAME_VERSION: u32 = 1;

/// Header size in bytes. The payload area starts at this offset.
pub const FRAME_HEADER_SIZE: usize = 64;

/// Frame header stored at the start of shared memory.
#[repr(C)]
pub(crate) struct FrameHeader {
    /// Always FRAME_MAGIC once initialized.
    magic: AtomicU32,
    /// Always FRAME_VERSION once initialized.
    format_version: AtomicU32,
    /// Seqlock counter.
    sequence: AtomicU64,
    /// Payload capacity fixed at creation.
    capacity: AtomicU64,
    /// PayloadKind of the published frame.
    kind: AtomicU32,
    /// Schema of a structured payload, 0 for text.
    schema_id: AtomicU32,
    /// Exact payload length in bytes.
    payload_len: AtomicU32,
    /// CRC32 of the payload bytes.
    checksum: AtomicU32,
    _reserved: [u64; 3],
}

const _: () = assert!(std::mem::size_of::<FrameHeader>() == FRAME_HEADER_SIZE);

impl FrameHeader {
    /// Write a fresh header. Magic goes last so attachers never see a half-written one.
    pub(crate) fn initialize(&self, capacity: u64) {
        self.sequence.store(0, Ordering::Relaxed);
        self.capacity.store(capacity, Ordering::Relaxed);
        self.kind.store(PayloadKind::Empty as u32, Ordering::Relaxed);
        self.schema_id.store(0, Ordering::Relaxed);
        self.payload_len.store(0, Ordering::Relaxed);
        self.checksum.store(0, Ordering::Relaxed);
        self.format_version.store(FRAME_VERSION, Ordering::Relaxed);
        self.magic.store(FRAME_MAGIC, Ordering::Release);
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.magic.load(Ordering::Acquire) == FRAME_MAGIC
            && self.format_version.load(Ordering::Relaxed) == FRAME_VERSION
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Acquire)
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }
}

/// Why a consistent frame could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreadable {
    /// Nothing has been published to the region yet.
    Empty,
    /// A writer holds the sequence lock.
    WriteInProgress { sequence: u64 },
    /// A write started or finished while the frame was being copied.
    Torn { before: u64, after: u64 },
}

impl std::fmt::Display for Unreadable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "region is empty"),
            Self::WriteInProgress { sequence } => {
                write!(f, "write in progress (sequence {})", sequence)
            }
            Self::Torn { before, after } => {
                write!(f, "torn read (sequence {} -> {})", before, after)
            }
        }
    }
}

/// Result of a snapshot that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    /// A complete, checksum-verified frame.
    Ready(Snapshot<T>),
    /// Nothing consistent to read right now; retrying may succeed.
    Unreadable(Unreadable),
}

impl<T> ReadOutcome<T> {
    /// The value, if one was read.
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(snapshot) => Some(snapshot.value),
            Self::Unreadable(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Transform the value, keeping sequence and unreadable reasons.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<ReadOutcome<U>, E> {
        match self {
            Self::Ready(snapshot) => Ok(ReadOutcome::Ready(Snapshot {
                sequence: snapshot.sequence,
                value: f(snapshot.value)?,
            })),
            Self::Unreadable(reason) => Ok(ReadOutcome::Unreadable(reason)),
        }
    }
}

/// A value read from a frame together with the sequence it was published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    pub sequence: u64,
    pub value: T,
}

/// Raw, verified frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub kind: PayloadKind,
    pub schema_id: u32,
    pub bytes: Vec<u8>,
}

/// Header fields as seen at one instant, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub format_version: u32,
    pub sequence: u64,
    pub capacity: u64,
    pub kind: u32,
    pub schema_id: u32,
    pub payload_len: u32,
    pub checksum: u32,
}

impl FrameInfo {
    pub(crate) fn read(header: &FrameHeader) -> Self {
        Self {
            format_version: header.format_version.load(Ordering::Relaxed),
            sequence: header.sequence.load(Ordering::Acquire),
            capacity: header.capacity.load(Ordering::Relaxed),
            kind: header.kind.load(Ordering::Relaxed),
            schema_id: header.schema_id.load(Ordering::Relaxed),
            payload_len: header.payload_len.load(Ordering::Relaxed),
            checksum: header.checksum.load(Ordering::Relaxed),
        }
    }

    /// Number of completed writes.
    pub fn generation(&self) -> u64 {
        self.sequence / 2
    }

    pub fn write_in_progress(&self) -> bool {
        self.sequence & 1 == 1
    }
}

/// Publish `payload` as the region's frame. Returns the new (even) sequence.
pub(crate) fn publish(
    region: &SharedMemoryRegion,
    kind: PayloadKind,
    schema_id: u32,
    payload: &[u8],
) -> Result<u64, SharedMemoryError> {
    if !region.is_writable() {
        return Err(SharedMemoryError::MapFailed {
            reason: format!("Region {} is mapped read-only", region.name()),
        });
    }

    let capacity = region.capacity();
    PayloadValidator::validate_for_write(payload, capacity)?;

    let header = region.header();
    let current = header.sequence.load(Ordering::Acquire);
    if current & 1 == 1 {
        return Err(SharedMemoryError::WriterBusy {
            name: region.name().to_string(),
            sequence: current,
        });
    }

    header
        .sequence
        .compare_exchange(current, current + 1, Ordering::Acquire, Ordering::Relaxed)
        .map_err(|seen| SharedMemoryError::WriterBusy {
            name: region.name().to_string(),
            sequence: seen,
        })?;
    fence(Ordering::Release);

    let previous_len = (header.payload_len.load(Ordering::Relaxed) as usize).min(capacity);
    let checksum = PayloadValidator::calculate_checksum(payload);

    // SAFETY: payload.len() <= capacity and previous_len <= capacity, both within the
    // data area; the odd sequence keeps readers from trusting these bytes.
    unsafe {
        let data = region.data_ptr();
        std::ptr::copy_nonoverlapping(payload.as_ptr(), data, payload.len());

        // Clear the tail of a previous, longer payload.
        if previous_len > payload.len() {
            std::ptr::write_bytes(data.add(payload.len()), 0, previous_len - payload.len());
        }
    }

    header.kind.store(kind as u32, Ordering::Relaxed);
    header.schema_id.store(schema_id, Ordering::Relaxed);
    header
        .payload_len
        .store(payload.len() as u32, Ordering::Relaxed);
    header.checksum.store(checksum, Ordering::Relaxed);

    let published = current + 2;
    header.sequence.store(published, Ordering::Release);

    Ok(published)
}

/// Copy the current frame out of the region if it is consistent.
pub(crate) fn snapshot(
    region: &SharedMemoryRegion,
) -> Result<ReadOutcome<RawFrame>, SharedMemoryError> {
    let header = region.header();

    let before = header.sequence.load(Ordering::Acquire);
    if before == 0 {
        return Ok(ReadOutcome::Unreadable(Unreadable::Empty));
    }
    if before & 1 == 1 {
        return Ok(ReadOutcome::Unreadable(Unreadable::WriteInProgress {
            sequence: before,
        }));
    }

    let kind = header.kind.load(Ordering::Relaxed);
    let schema_id = header.schema_id.load(Ordering::Relaxed);
    let payload_len = header.payload_len.load(Ordering::Relaxed) as usize;
    let checksum = header.checksum.load(Ordering::Relaxed);

    let capacity = region.capacity();
    let in_bounds = payload_len <= capacity;
    let mut bytes = vec![0u8; if in_bounds { payload_len } else { 0 }];
    if in_bounds {
        // SAFETY: payload_len <= capacity, so the copy stays within the data area
        unsafe {
            std::ptr::copy_nonoverlapping(region.data_ptr(), bytes.as_mut_ptr(), payload_len);
        }
    }

    fence(Ordering::Acquire);
    let after = header.sequence.load(Ordering::Relaxed);
    if after != before {
        return Ok(ReadOutcome::Unreadable(Unreadable::Torn { before, after }));
    }

    if !in_bounds {
        return Err(SharedMemoryError::Decode {
            reason: format!(
                "Header payload length {} exceeds capacity {}",
                payload_len, capacity
            ),
        });
    }

    let kind = PayloadKind::try_from(kind)?;
    if kind == PayloadKind::Empty {
        return Err(SharedMemoryError::Decode {
            reason: format!("Sequence {} published but frame kind is empty", before),
        });
    }

    PayloadValidator::validate_checksum(&bytes, checksum)?;

    Ok(ReadOutcome::Ready(Snapshot {
        sequence: before,
        value: RawFrame {
            kind,
            schema_id,
            bytes,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(tag: &str, capacity: u64) -> SharedMemoryRegion {
        let name = format!("shmex-frame-{}-{}", tag, std::process::id());
        let region = SharedMemoryRegion::create_or_open(&name, capacity).unwrap();
        SharedMemoryRegion::unlink(&name).unwrap();
        region
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FRAME_HEADER_SIZE);
        assert_eq!(&FRAME_MAGIC.to_le_bytes(), b"SHMX");
    }

    #[test]
    fn test_fresh_region_is_empty() {
        let region = region("empty", 64);
        let outcome = snapshot(&region).unwrap();
        assert_eq!(outcome, ReadOutcome::Unreadable(Unreadable::Empty));
    }

    #[test]
    fn test_publish_advances_sequence_by_two() {
        let region = region("seq", 64);
        assert_eq!(publish(&region, PayloadKind::Text, 0, b"one").unwrap(), 2);
        assert_eq!(publish(&region, PayloadKind::Text, 0, b"two").unwrap(), 4);

        let info = FrameInfo::read(region.header());
        assert_eq!(info.generation(), 2);
        assert!(!info.write_in_progress());
        assert_eq!(info.payload_len, 3);
    }

    #[test]
    fn test_odd_sequence_blocks_readers_and_writers() {
        let region = region("odd", 64);
        publish(&region, PayloadKind::Text, 0, b"data").unwrap();
        region.header().sequence.store(3, Ordering::Release);

        assert_eq!(
            snapshot(&region).unwrap(),
            ReadOutcome::Unreadable(Unreadable::WriteInProgress { sequence: 3 })
        );

        let err = publish(&region, PayloadKind::Text, 0, b"more").unwrap_err();
        assert!(matches!(
            err,
            SharedMemoryError::WriterBusy { sequence: 3, .. }
        ));
    }

    #[test]
    fn test_shorter_write_clears_stale_tail() {
        let region = region("tail", 32);
        publish(&region, PayloadKind::Text, 0, b"a much longer payload").unwrap();
        publish(&region, PayloadKind::Text, 0, b"short").unwrap();

        // SAFETY: capacity is 32 bytes
        let data = unsafe { std::slice::from_raw_parts(region.data_ptr(), 32) };
        assert_eq!(&data[..5], b"short");
        assert!(data[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_corrupted_body_fails_checksum() {
        let region = region("crc", 32);
        publish(&region, PayloadKind::Text, 0, b"hello").unwrap();

        // SAFETY: first payload byte is within capacity
        unsafe { *region.data_ptr() = b'j' };

        let err = snapshot(&region).unwrap_err();
        assert!(matches!(err, SharedMemoryError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_oversized_length_is_decode_error() {
        let region = region("len", 16);
        publish(&region, PayloadKind::Text, 0, b"ok").unwrap();
        region.header().payload_len.store(17, Ordering::Relaxed);

        let err = snapshot(&region).unwrap_err();
        assert!(matches!(err, SharedMemoryError::Decode { .. }));
    }

    #[test]
    fn test_capacity_exceeded_keeps_previous_frame() {
        let region = region("cap", 4);
        publish(&region, PayloadKind::Text, 0, b"abcd").unwrap();

        let err = publish(&region, PayloadKind::Text, 0, b"abcde").unwrap_err();
        assert!(matches!(
            err,
            SharedMemoryError::CapacityExceeded {
                size: 5,
                capacity: 4
            }
        ));

        let frame = snapshot(&region).unwrap().ready().unwrap();
        assert_eq!(frame.bytes, b"abcd");
    }
}
