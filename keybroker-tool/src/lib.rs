// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! Library portion of keybroker-tool, exposing the command-line surface for testing.

pub mod cli;
pub mod common;
pub mod error;
pub mod subcommands;
pub mod util;
