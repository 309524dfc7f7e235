// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmex inspect` command - Show the frame header of a region.

use shmex_core::shm::PayloadKind;
use shmex_core::{Config, RegionReader};

pub async fn execute(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let reader = RegionReader::open(&config.region.name)?;
    let info = reader.inspect();

    let kind = PayloadKind::try_from(info.kind)
        .map(|kind| kind.to_string())
        .unwrap_or_else(|_| format!("unknown ({})", info.kind));
    let state = if info.write_in_progress() {
        "write in progress"
    } else if info.sequence == 0 {
        "empty"
    } else {
        "published"
    };

    println!("Region '{}':", reader.name());
    println!("  Format Version:  {}", info.format_version);
    println!("  Capacity:        {} bytes", info.capacity);
    println!("  State:           {}", state);
    println!("  Sequence:        {} (generation {})", info.sequence, info.generation());
    println!("  Payload Kind:    {}", kind);
    println!("  Schema ID:       {:#010x}", info.schema_id);
    println!("  Payload Length:  {} bytes", info.payload_len);
    println!("  Checksum:        {:#010x}", info.checksum);

    Ok(())
}
