// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmex remove` command - Unlink the region.

use shmex_core::shm::SharedMemoryRegion;
use shmex_core::Config;

pub async fn execute(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let name = &config.region.name;
    tracing::info!(name = %name, "Removing region");

    if SharedMemoryRegion::unlink(name.as_str())? {
        println!("✓ Region '{}' removed", name);
    } else {
        println!("Region '{}' does not exist", name);
    }

    Ok(())
}
