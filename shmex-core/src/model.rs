// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Structured payload records.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record that can be published as a structured frame.
///
/// `SCHEMA_ID` is stored in the frame header so a reader expecting a different
/// record type fails with a decode error instead of misreading the body.
pub trait Schema: Serialize + DeserializeOwned {
    /// Stable identifier of the record shape. Must be non-zero.
    const SCHEMA_ID: u32;

    /// Human-readable name for logs.
    const NAME: &'static str;
}

/// Bearer token handed from a producer to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Auth {
    #[serde(rename = "Bearer")]
    pub bearer: String,
}

impl Auth {
    pub fn new(bearer: impl Into<String>) -> Self {
        Self {
            bearer: bearer.into(),
        }
    }
}

impl Schema for Auth {
    // "AUTH"
    const SCHEMA_ID: u32 = 0x4854_5541;
    const NAME: &'static str = "auth";
}
