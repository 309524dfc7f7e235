// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;

use crate::error::HardValidationError;

/// Maximum region name length in bytes (NAME_MAX minus the leading slash, with headroom).
const MAX_NAME_LEN: usize = 200;

/// Validated shared memory region name.
/// Non-empty, ASCII alphanumeric with `-`, `_` or `.`, max 200 bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionName(String);

impl RegionName {
    /// Create a new RegionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "region_name",
                value: name,
                reason: "Region name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_NAME_LEN {
            return Err(HardValidationError::InvalidFieldValue {
                field: "region_name",
                value: name.clone(),
                reason: format!(
                    "Region name too long: {} bytes (max {})",
                    name.len(),
                    MAX_NAME_LEN
                ),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "region_name",
                value: name,
                reason: "Region name must contain only ASCII alphanumerics, '-', '_' and '.'"
                    .to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated payload capacity of a region, in bytes.
/// Must be between 1 byte and [`Capacity::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Capacity(u64);

impl Capacity {
    /// Largest payload capacity a region may declare (1 GB).
    pub const MAX: u64 = 1024 * 1024 * 1024;

    /// Create a new Capacity with bounds validation.
    pub fn new(bytes: u64) -> Result<Self, HardValidationError> {
        if bytes == 0 || bytes > Self::MAX {
            return Err(HardValidationError::InvalidFieldValue {
                field: "capacity_bytes",
                value: bytes.to_string(),
                reason: format!("Capacity must be between 1 and {} bytes", Self::MAX),
            });
        }
        Ok(Self(bytes))
    }

    /// Get the capacity in bytes.
    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}
