// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! Base CLI implementation.

use crate::common::{PROJECT_AUTHOR, PROJECT_DESC, PROJECT_NAME, PROJECT_VERSION};
use crate::subcommands::Subcommand;
use structopt::StructOpt;

/// Struct representing the command-line interface of keybroker-tool
#[derive(Debug, StructOpt)]
#[structopt(name=PROJECT_NAME, about=PROJECT_DESC, author=PROJECT_AUTHOR, version=PROJECT_VERSION)]
pub struct KeyBrokerToolApp {
    /// The subcommand -- e.g., validate or wrap
    #[structopt(subcommand)]
    pub subcommand: Subcommand,
}
