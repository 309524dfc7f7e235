// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared-region reader.
//!
//! Attaches read-only to an existing region and decodes its current frame as a
//! structured record or as raw text. Reads never block; the `wait_*` variants
//! poll the sequence lock until a complete frame is available.

use std::time::Duration;

use crate::config::ReaderConfig;
use crate::error::SharedMemoryError;
use crate::model::Schema;
use crate::shm::frame::{self, FrameInfo, RawFrame, ReadOutcome, Snapshot};
use crate::shm::validator::{PayloadKind, PayloadValidator};
use crate::shm::SharedMemoryRegion;
use crate::types::RegionName;

/// Polling parameters for the `wait_*` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long. Zero means a single attempt.
    pub timeout: Duration,
    /// Delay between attempts.
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl From<&ReaderConfig> for WaitOptions {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            timeout: config.wait_timeout,
            poll_interval: config.poll_interval,
        }
    }
}

/// Reader of a named region.
pub struct RegionReader {
    region: SharedMemoryRegion,
}

impl RegionReader {
    /// Attach to an existing region.
    ///
    /// Fails with `RegionNotFound` when nothing has created `name` yet.
    pub fn open(name: &RegionName) -> Result<Self, SharedMemoryError> {
        let region = SharedMemoryRegion::open(name.as_str()).inspect_err(|e| {
            tracing::warn!(name = %name, error = %e, "Failed to open region");
        })?;

        Ok(Self { region })
    }

    /// Decode the current frame as `T`.
    ///
    /// Returns `ReadOutcome::Unreadable` when the region is empty or a write is in
    /// progress, and a decode error when the frame is not a `T`.
    pub fn read_structured<T: Schema>(&self) -> Result<ReadOutcome<T>, SharedMemoryError> {
        self.snapshot()?
            .try_map(decode_structured::<T>)
            .inspect_err(|e| self.log_decode_failure(e))
    }

    /// Return the current frame as text. Structured frames read as their JSON form.
    pub fn read_text(&self) -> Result<ReadOutcome<String>, SharedMemoryError> {
        self.snapshot()?
            .try_map(decode_text)
            .inspect_err(|e| self.log_decode_failure(e))
    }

    /// Poll until a complete `T` is published or `options.timeout` expires.
    pub async fn wait_structured<T: Schema>(
        &self,
        options: &WaitOptions,
    ) -> Result<Snapshot<T>, SharedMemoryError> {
        self.wait_for(options, |reader| reader.read_structured::<T>())
            .await
    }

    /// Poll until a complete frame is published, then return it as text.
    pub async fn wait_text(
        &self,
        options: &WaitOptions,
    ) -> Result<Snapshot<String>, SharedMemoryError> {
        self.wait_for(options, |reader| reader.read_text()).await
    }

    /// Header fields as they are right now.
    pub fn inspect(&self) -> FrameInfo {
        FrameInfo::read(self.region.header())
    }

    pub fn name(&self) -> &str {
        self.region.name()
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    fn snapshot(&self) -> Result<ReadOutcome<RawFrame>, SharedMemoryError> {
        frame::snapshot(&self.region).inspect_err(|e| self.log_decode_failure(e))
    }

    async fn wait_for<U>(
        &self,
        options: &WaitOptions,
        read: impl Fn(&Self) -> Result<ReadOutcome<U>, SharedMemoryError>,
    ) -> Result<Snapshot<U>, SharedMemoryError> {
        let started = tokio::time::Instant::now();

        loop {
            let reason = match read(self)? {
                ReadOutcome::Ready(snapshot) => return Ok(snapshot),
                ReadOutcome::Unreadable(reason) => reason,
            };

            let waited = started.elapsed();
            if waited >= options.timeout {
                tracing::warn!(
                    name = %self.region.name(),
                    reason = %reason,
                    waited_ms = waited.as_millis() as u64,
                    "Gave up waiting for a payload"
                );
                return Err(SharedMemoryError::Timeout {
                    name: self.region.name().to_string(),
                    waited_ms: waited.as_millis() as u64,
                });
            }

            tracing::trace!(name = %self.region.name(), reason = %reason, "Region not readable yet");
            tokio::time::sleep(options.poll_interval.min(options.timeout - waited)).await;
        }
    }

    fn log_decode_failure(&self, error: &SharedMemoryError) {
        tracing::warn!(name = %self.region.name(), error = %error, "Failed to read payload");
    }
}

fn decode_structured<T: Schema>(frame: RawFrame) -> Result<T, SharedMemoryError> {
    if frame.kind != PayloadKind::Structured {
        return Err(SharedMemoryError::Decode {
            reason: format!("Expected a structured payload, found {}", frame.kind),
        });
    }

    PayloadValidator::validate_schema(T::SCHEMA_ID, frame.schema_id)?;

    serde_json::from_slice(&frame.bytes).map_err(|e| SharedMemoryError::Decode {
        reason: format!("{}: {}", T::NAME, e),
    })
}

fn decode_text(frame: RawFrame) -> Result<String, SharedMemoryError> {
    String::from_utf8(frame.bytes).map_err(|e| SharedMemoryError::Decode {
        reason: format!("Payload is not valid UTF-8: {}", e),
    })
}
