// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmex produce` command - Publish a payload into the region.

use shmex_core::shm::SharedMemoryRegion;
use shmex_core::{Auth, Config, RegionWriter};

pub async fn execute(
    config: &Config,
    bearer: &str,
    text: Option<&str>,
    hold: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let region = &config.region;
    tracing::info!(name = %region.name, capacity = region.capacity.bytes(), "Opening region for writing");

    let writer = RegionWriter::from_config(region)?;

    let sequence = match text {
        Some(text) => writer.write_text(text)?,
        None => writer.write_structured(&Auth::new(bearer))?,
    };

    println!(
        "✓ Published {} to region '{}' (sequence {}, capacity {} bytes)",
        if text.is_some() { "text" } else { "auth record" },
        writer.name(),
        sequence,
        writer.capacity()
    );

    if hold {
        println!("Holding region open, press Ctrl-C to remove it...");
        tokio::signal::ctrl_c().await?;

        drop(writer);
        SharedMemoryRegion::unlink(region.name.as_str())?;
        tracing::info!(name = %region.name, "Region removed on shutdown");
        println!("✓ Region '{}' removed", region.name);
    }

    Ok(())
}
