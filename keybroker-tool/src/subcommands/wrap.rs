// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! Wraps a key from a file-based key store into the two-layer release envelope for a given
//! RSA public key, bypassing the evidence exchange. This mirrors what the broker produces at
//! the end of a successful transfer and is useful for preparing test fixtures and for
//! small local deployments where the recipient key has been verified out of band.

use crate::error::Result;
use crate::util;

use keybroker::envelope;
use keybroker::keys::file::FileKeyStore;
use keybroker::keys::{KeyManager, KeyStore};

use serde::Serialize;
use structopt::StructOpt;

/// The JSON document printed on success: the same two artifacts a transfer response
/// carries, base64-encoded.
#[derive(Serialize)]
struct WrapOutput {
    wrapped_key: String,
    wrapped_swk: String,
}

/// Models the options required by the wrap command.
#[derive(Debug, StructOpt)]
pub struct Wrap {
    /// Path to the JSON key store file holding the key material.
    #[structopt(short = "k", long = "keys")]
    keys_file: String,

    /// The identity of the key to wrap. This would typically be a UUID in string form.
    #[structopt(short = "i", long = "key-id")]
    key_id: String,

    /// Path to the recipient's RSA public key, in PKCS#1 PEM or DER format.
    #[structopt(short = "r", long = "recipient")]
    recipient_file: String,
}

impl Wrap {
    /// Wraps the key and writes the envelope artifacts to standard output as JSON.
    pub fn run(&self) -> Result<()> {
        let store = FileKeyStore::from_file_path(&self.keys_file)?;
        let record = store.get(&self.key_id)?;
        let (algorithm, secret) = store.plaintext_key(&self.key_id)?;

        let recipient = util::read_rsa_public_key(&self.recipient_file)?;

        let envelope = envelope::wrap(algorithm, &secret, &recipient)?;
        let output = WrapOutput {
            wrapped_key: base64::encode(&envelope.wrapped_key),
            wrapped_swk: base64::encode(&envelope.wrapped_swk),
        };

        log::info!("Wrapped key `{}` ({:?})", record.id, record.algorithm);
        println!("{}", serde_json::to_string_pretty(&output)?);

        Ok(())
    }
}
