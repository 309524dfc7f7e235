// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Pandey

//! Payload validation using capacity limits and checksums.
//!
//! Validates payload size before every write and integrity at every read.
//! Fails immediately on mismatch, there is no fallback.

use crate::error::SharedMemoryError;

/// Validator for region payloads.
///
/// Checks integrity using CRC32 checksums and validates size limits.
pub struct PayloadValidator;

impl PayloadValidator {
    /// Validate a payload before writing.
    ///
    /// A payload exactly as long as the capacity is accepted; one byte more is not.
    pub fn validate_for_write(payload: &[u8], capacity: usize) -> Result<(), SharedMemoryError> {
        if payload.len() > capacity {
            return Err(SharedMemoryError::CapacityExceeded {
                size: payload.len(),
                capacity,
            });
        }

        Ok(())
    }

    /// Calculate CRC32 checksum for a payload.
    pub fn calculate_checksum(payload: &[u8]) -> u32 {
        crc32fast::hash(payload)
    }

    /// Validate a payload after reading.
    ///
    /// Verifies checksum matches expected value.
    pub fn validate_checksum(payload: &[u8], expected: u32) -> Result<(), SharedMemoryError> {
        let actual = Self::calculate_checksum(payload);

        if actual != expected {
            return Err(SharedMemoryError::ChecksumMismatch { expected, actual });
        }

        Ok(())
    }

    /// Validate that a structured frame carries the schema the caller expects.
    pub fn validate_schema(expected: u32, found: u32) -> Result<(), SharedMemoryError> {
        if expected != found {
            return Err(SharedMemoryError::Decode {
                reason: format!(
                    "Schema mismatch: expected {:#010x}, found {:#010x}",
                    expected, found
                ),
            });
        }

        Ok(())
    }
}

/// Kind of payload occupying a region.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Nothing has been published yet.
    Empty = 0,
    /// Self-describing structured record (JSON).
    Structured = 1,
    /// Raw UTF-8 text.
    Text = 2,
}

impl PayloadKind {
    /// Human-readable name used in logs and `inspect` output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Structured => "structured",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u32> for PayloadKind {
    type Error = SharedMemoryError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Empty),
            1 => Ok(Self::Structured),
            2 => Ok(Self::Text),
            _ => Err(SharedMemoryError::Decode {
                reason: format!("Unknown payload kind: {}", value),
            }),
        }
    }
}
