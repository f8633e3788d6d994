// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! Requests a challenge nonce from an attestation service and prints it. This exercises the
//! broker's attestation service client against a live endpoint, which is useful when
//! commissioning a deployment.

use crate::error::Result;
use crate::util;

use keybroker::attest::http::AttestationServiceClient;
use keybroker::attest::AttestationService;

use structopt::StructOpt;

/// Models the options required by the nonce command.
#[derive(Debug, StructOpt)]
pub struct Nonce {
    /// The base URL of the attestation service. If this option is not specified, then it
    /// will be obtained from the `KEYBROKER_AS_ENDPOINT` environment variable instead.
    #[structopt(short = "e", long = "endpoint")]
    endpoint: Option<String>,

    /// The API key for the attestation service. If this option is not specified, then it
    /// will be obtained from the `KEYBROKER_AS_API_KEY` environment variable instead.
    #[structopt(short = "a", long = "api-key")]
    api_key: Option<String>,
}

impl Nonce {
    /// Requests a nonce and writes it to standard output as JSON.
    pub fn run(&self) -> Result<()> {
        let endpoint = util::get_config_from_command_or_env(
            &self.endpoint,
            "KEYBROKER_AS_ENDPOINT",
            "attestation service endpoint",
        )?;
        let api_key = util::get_config_from_command_or_env(
            &self.api_key,
            "KEYBROKER_AS_API_KEY",
            "attestation service API key",
        )?;

        let client = AttestationServiceClient::new(&endpoint, &api_key)?;
        let nonce = client.nonce()?;

        println!("{}", serde_json::to_string_pretty(&nonce)?);

        Ok(())
    }
}
