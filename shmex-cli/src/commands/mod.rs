// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod consume;
pub mod inspect;
pub mod produce;
pub mod remove;
pub mod validate;
