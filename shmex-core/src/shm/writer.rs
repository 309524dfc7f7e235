// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared-region writer.
//!
//! Creates or reattaches to a named region and publishes one payload at a time,
//! either a structured record or raw text.

use crate::config::RegionConfig;
use crate::error::SharedMemoryError;
use crate::model::Schema;
use crate::shm::frame::{self, FrameInfo};
use crate::shm::validator::PayloadKind;
use crate::shm::SharedMemoryRegion;
use crate::types::{Capacity, RegionName};

/// Schema id recorded for text frames.
const TEXT_SCHEMA_ID: u32 = 0;

/// Single writer of a named region.
pub struct RegionWriter {
    region: SharedMemoryRegion,
}

impl RegionWriter {
    /// Create the region, or attach to an existing one of at least `capacity` bytes.
    pub fn create_or_open(
        name: &RegionName,
        capacity: Capacity,
    ) -> Result<Self, SharedMemoryError> {
        let region = SharedMemoryRegion::create_or_open(name.as_str(), capacity.bytes())
            .inspect_err(|e| {
                tracing::warn!(name = %name, capacity = capacity.bytes(), error = %e, "Failed to create or open region");
            })?;

        Ok(Self { region })
    }

    /// Create or attach using a validated region configuration.
    pub fn from_config(config: &RegionConfig) -> Result<Self, SharedMemoryError> {
        Self::create_or_open(&config.name, config.capacity)
    }

    /// Serialize `value` as JSON and publish it as a structured frame.
    ///
    /// Returns the sequence number the frame was published under.
    pub fn write_structured<T: Schema>(&self, value: &T) -> Result<u64, SharedMemoryError> {
        let payload = serde_json::to_vec(value).map_err(|e| SharedMemoryError::Encode {
            reason: format!("{}: {}", T::NAME, e),
        })?;

        let sequence = self.publish(PayloadKind::Structured, T::SCHEMA_ID, &payload)?;

        tracing::debug!(
            name = %self.region.name(),
            schema = T::NAME,
            size = payload.len(),
            sequence = sequence,
            "Published structured payload"
        );

        Ok(sequence)
    }

    /// Publish the UTF-8 bytes of `text` as a text frame.
    pub fn write_text(&self, text: &str) -> Result<u64, SharedMemoryError> {
        let sequence = self.publish(PayloadKind::Text, TEXT_SCHEMA_ID, text.as_bytes())?;

        tracing::debug!(
            name = %self.region.name(),
            size = text.len(),
            sequence = sequence,
            "Published text payload"
        );

        Ok(sequence)
    }

    fn publish(
        &self,
        kind: PayloadKind,
        schema_id: u32,
        payload: &[u8],
    ) -> Result<u64, SharedMemoryError> {
        frame::publish(&self.region, kind, schema_id, payload).inspect_err(|e| {
            tracing::warn!(
                name = %self.region.name(),
                kind = %kind,
                size = payload.len(),
                error = %e,
                "Failed to publish payload"
            );
        })
    }

    pub fn name(&self) -> &str {
        self.region.name()
    }

    /// Payload capacity of the attached region (may exceed the requested one).
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Sequence of the most recent publish (0 if none).
    pub fn sequence(&self) -> u64 {
        self.region.header().sequence()
    }

    pub fn inspect(&self) -> FrameInfo {
        FrameInfo::read(self.region.header())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Auth;

    fn writer(tag: &str, capacity: u64) -> RegionWriter {
        let name = RegionName::new(format!("shmex-writer-{}-{}", tag, std::process::id())).unwrap();
        let writer = RegionWriter::create_or_open(&name, Capacity::new(capacity).unwrap()).unwrap();
        SharedMemoryRegion::unlink(name.as_str()).unwrap();
        writer
    }

    #[test]
    fn test_write_structured_records_schema() {
        let writer = writer("structured", 1000);
        let sequence = writer.write_structured(&Auth::new("token")).unwrap();
        assert_eq!(sequence, 2);
        assert_eq!(writer.sequence(), 2);

        let info = writer.inspect();
        assert_eq!(info.kind, PayloadKind::Structured as u32);
        assert_eq!(info.schema_id, Auth::SCHEMA_ID);
        assert_eq!(info.payload_len as usize, r#"{"Bearer":"token"}"#.len());
    }

    #[test]
    fn test_write_text_records_kind() {
        let writer = writer("text", 16);
        writer.write_text("hello").unwrap();

        let info = writer.inspect();
        assert_eq!(info.kind, PayloadKind::Text as u32);
        assert_eq!(info.schema_id, TEXT_SCHEMA_ID);
        assert_eq!(info.payload_len, 5);
    }

    #[test]
    fn test_structured_capacity_boundary() {
        let encoded_len = r#"{"Bearer":"abc"}"#.len() as u64;

        let exact = writer("exact", encoded_len);
        assert!(exact.write_structured(&Auth::new("abc")).is_ok());

        let short = writer("short", encoded_len - 1);
        let err = short.write_structured(&Auth::new("abc")).unwrap_err();
        assert!(matches!(err, SharedMemoryError::CapacityExceeded { .. }));
        assert_eq!(short.sequence(), 0);
    }
}
