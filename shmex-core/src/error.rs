// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for shmex.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the shmex library.
#[derive(Debug, Error)]
pub enum ShmexError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Shared Memory Errors
    // =========================================================================
    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] SharedMemoryError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors reject a configuration before any region is touched.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Shared memory errors. Every failure is reported to the caller, never retried.
#[derive(Debug, Error)]
pub enum SharedMemoryError {
    // Region lifecycle
    #[error("Shared memory region not found: {name}")]
    RegionNotFound { name: String },

    #[error("Failed to create shared memory region: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Failed to map shared memory: {reason}")]
    MapFailed { reason: String },

    #[error("Failed to unlink shared memory region: {name} - {reason}")]
    UnlinkFailed { name: String, reason: String },

    #[error("Invalid region capacity: {capacity} - {reason}")]
    InvalidCapacity { capacity: u64, reason: String },

    #[error(
        "Region {name} has capacity {existing} bytes, cannot attach with {requested} bytes"
    )]
    IncompatibleSize {
        name: String,
        existing: u64,
        requested: u64,
    },

    // Write path
    #[error("Payload size exceeds region capacity: {size} > {capacity}")]
    CapacityExceeded { size: usize, capacity: usize },

    #[error("Failed to encode payload: {reason}")]
    Encode { reason: String },

    #[error("Region {name} is being written by another writer (sequence {sequence})")]
    WriterBusy { name: String, sequence: u64 },

    // Read path
    #[error("Failed to decode payload: {reason}")]
    Decode { reason: String },

    #[error("Payload checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Timed out after {waited_ms}ms waiting for a payload in region {name}")]
    Timeout { name: String, waited_ms: u64 },
}

impl SharedMemoryError {
    /// True for failures where the mapped bytes do not form the expected payload.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::ChecksumMismatch { .. })
    }

    /// True for failures while creating, opening or mapping a region.
    pub fn is_region_error(&self) -> bool {
        matches!(
            self,
            Self::CreateFailed { .. }
                | Self::MapFailed { .. }
                | Self::UnlinkFailed { .. }
                | Self::InvalidCapacity { .. }
                | Self::IncompatibleSize { .. }
        )
    }
}

/// Result type alias using ShmexError.
pub type ShmexResult<T> = Result<T, ShmexError>;
