// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! Evaluates a decoded attestation claim set against a key transfer policy. This is an
//! operator debugging aid: it answers "would this workload receive this key?" without
//! touching any store or service.

use crate::error::Result;

use keybroker::attest::AttestationTokenClaim;
use keybroker::policy::{matcher, KeyTransferPolicy};

use structopt::StructOpt;

/// Models the options required by the validate command.
#[derive(Debug, StructOpt)]
pub struct Validate {
    /// Path to a JSON file holding the key transfer policy document.
    #[structopt(short = "p", long = "policy")]
    policy_file: String,

    /// Path to a JSON file holding the decoded attestation token claims.
    #[structopt(short = "c", long = "claims")]
    claims_file: String,
}

impl Validate {
    /// Runs the claim matcher over the given policy and claims documents.
    pub fn run(&self) -> Result<()> {
        let policy_doc = std::fs::read_to_string(&self.policy_file)?;
        let policy: KeyTransferPolicy = serde_json::from_str(&policy_doc)?;

        let claims_doc = std::fs::read_to_string(&self.claims_file)?;
        let claims: AttestationTokenClaim = serde_json::from_str(&claims_doc)?;

        match matcher::validate(&claims, &policy) {
            Ok(()) => {
                println!("Claims satisfy policy `{}`. A key gated by this policy would be released.", policy.id);
                Ok(())
            }
            Err(e) => {
                println!("Claims do not satisfy policy `{}`: {}", policy.id, e);
                Err(e.into())
            }
        }
    }
}
