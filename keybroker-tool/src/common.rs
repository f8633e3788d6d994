// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! Project-wide constants used by the command-line interface.

/// The name of the tool, as shown in help output.
pub const PROJECT_NAME: &str = "keybroker-tool";

/// One-line description of the tool.
pub const PROJECT_DESC: &str =
    "A tool for operating and testing attestation-gated key release with the key broker";

/// The project author string.
pub const PROJECT_AUTHOR: &str = "Contributors to the Key Broker project";

/// The tool version, taken from the crate manifest.
pub const PROJECT_VERSION: &str = env!("CARGO_PKG_VERSION");
