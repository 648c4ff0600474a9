// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Command-line tooling for sfs flash images.

pub mod commands;
pub mod telemetry;
