// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared Memory IPC module.
//!
//! Named POSIX shared memory regions carrying one framed payload at a time.
//! A sequence lock in the frame header lets one writer publish while readers
//! detect in-progress and torn writes.

mod frame;
mod reader;
mod region;
mod validator;
mod writer;

pub use frame::{
    FrameInfo, RawFrame, ReadOutcome, Snapshot, Unreadable, FRAME_HEADER_SIZE, FRAME_MAGIC,
    FRAME_VERSION,
};
pub use reader::{RegionReader, WaitOptions};
pub use region::SharedMemoryRegion;
pub use validator::{PayloadKind, PayloadValidator};
pub use writer::RegionWriter;
