// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmex consume` command - Read the region back.
//!
//! Prints the bearer token of the Auth record, then the payload as raw text.

use std::time::Duration;

use shmex_core::{Auth, Config, ReadOutcome, RegionReader, WaitOptions};

pub async fn execute(
    config: &Config,
    raw: bool,
    wait_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = WaitOptions::from(&config.reader);
    if let Some(ms) = wait_ms {
        options.timeout = Duration::from_millis(ms);
    }

    tracing::info!(
        name = %config.region.name,
        wait_ms = options.timeout.as_millis() as u64,
        "Opening region for reading"
    );

    let reader = RegionReader::open(&config.region.name)?;

    if !raw {
        let auth = read_auth(&reader, &options).await?;
        println!("{}", auth.bearer);
    }

    let text = read_text(&reader, &options).await?;
    println!("{}", text);

    Ok(())
}

async fn read_auth(
    reader: &RegionReader,
    options: &WaitOptions,
) -> Result<Auth, Box<dyn std::error::Error>> {
    if !options.timeout.is_zero() {
        return Ok(reader.wait_structured::<Auth>(options).await?.value);
    }

    ready_or_err(reader, reader.read_structured::<Auth>()?)
}

async fn read_text(
    reader: &RegionReader,
    options: &WaitOptions,
) -> Result<String, Box<dyn std::error::Error>> {
    if !options.timeout.is_zero() {
        return Ok(reader.wait_text(options).await?.value);
    }

    ready_or_err(reader, reader.read_text()?)
}

fn ready_or_err<T>(
    reader: &RegionReader,
    outcome: ReadOutcome<T>,
) -> Result<T, Box<dyn std::error::Error>> {
    match outcome {
        ReadOutcome::Ready(snapshot) => {
            tracing::debug!(name = %reader.name(), sequence = snapshot.sequence, "Read payload");
            Ok(snapshot.value)
        }
        ReadOutcome::Unreadable(reason) => {
            Err(format!("Region '{}' is not readable: {}", reader.name(), reason).into())
        }
    }
}
