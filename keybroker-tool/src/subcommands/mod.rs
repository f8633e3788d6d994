// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! Individual commands supported by keybroker-tool.

mod nonce;
mod pubkey;
mod validate;
mod wrap;

use crate::error::Result;

use crate::subcommands::nonce::Nonce;
use crate::subcommands::pubkey::PubKey;
use crate::subcommands::validate::Validate;
use crate::subcommands::wrap::Wrap;

use structopt::StructOpt;

/// Command-line interface to keybroker-tool operations.
#[derive(Debug, StructOpt)]
pub enum Subcommand {
    /// Evaluates a decoded attestation claim set against a key transfer policy, reporting
    /// whether the claims would authorize a key release.
    Validate(Validate),

    /// Wraps a key from a file-based key store into the two-layer release envelope for a
    /// given RSA public key.
    Wrap(Wrap),

    /// Re-encodes an RSA public key as a base64 SubjectPublicKeyInfo structure, which is
    /// the format expected when registering a wrapping key with cloud-side key management
    /// services.
    PubKey(PubKey),

    /// Requests a challenge nonce from an attestation service and prints it.
    Nonce(Nonce),
}

impl Subcommand {
    /// Runs the command.
    pub fn run(&self) -> Result<()> {
        match &self {
            Subcommand::Validate(cmd) => cmd.run(),
            Subcommand::Wrap(cmd) => cmd.run(),
            Subcommand::PubKey(cmd) => cmd.run(),
            Subcommand::Nonce(cmd) => cmd.run(),
        }
    }
}
