// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmex validate` command - Validate configuration file.

use shmex_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Region Settings:");
            println!("  Name:            {}", config.region.name);
            println!("  Capacity:        {}", config.region.capacity);
            println!();
            println!("Reader Settings:");
            println!(
                "  Wait Timeout:    {}ms",
                config.reader.wait_timeout.as_millis()
            );
            println!(
                "  Poll Interval:   {}ms",
                config.reader.poll_interval.as_millis()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
