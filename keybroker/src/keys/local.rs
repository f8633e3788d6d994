// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module implements an ephemeral client-side key pair held in local process memory,
//! standing in for the wrapping key that a real confidential workload would generate inside
//! its TEE and bind into its attestation evidence. It is especially convenient for testing
//! environments, where it plays the client's half of the transfer protocol: publishing the
//! public key (as PKCS#1 DER or as token held data) and unwrapping released envelopes.

use super::Result;
use crate::envelope;
use crate::envelope::heldkey;

use pkcs1::ToRsaPublicKey;
use rand::rngs::OsRng;
use rsa::{PaddingScheme, RsaPrivateKey, RsaPublicKey};

/// This structure implements an ephemeral RSA 2048-bit key pair in local process memory.
pub struct LocalWrappingKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl LocalWrappingKeyPair {
    /// Create a default RSA 2048-bit random key pair in local memory.
    ///
    /// Local key pairs should only be used in dev/test environments, because the private
    /// part of the key pair is stored in the process memory, and the public part is not
    /// bound into any attestation evidence, making it impossible for the broker to judge
    /// whether it is safe to release a secret to this key.
    pub fn default() -> LocalWrappingKeyPair {
        let bits = 2048;
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        LocalWrappingKeyPair {
            private_key,
            public_key,
        }
    }

    /// Gets the public part of the wrapping key pair, as an RSA public key in PKCS#1 DER
    /// format as per [RFC3279](https://datatracker.ietf.org/doc/html/rfc3279):
    ///
    /// `````text
    /// RSAPublicKey ::= SEQUENCE {
    ///           modulus        INTEGER,
    ///           publicExponent INTEGER }
    /// `````
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        let public_key_document = self.public_key.to_pkcs1_der()?;
        Ok(public_key_document.as_der().to_vec())
    }

    /// Gets the public part of the wrapping key pair in the attestation-token held-data
    /// encoding, as a workload would bind it into its quote.
    pub fn held_data(&self) -> String {
        heldkey::held_data_for_key(&self.public_key)
    }

    /// Recovers a secret from the two envelope artifacts returned by a transfer: decrypts
    /// the SWK with the private half of the pair, then opens the symmetric layer.
    pub fn unwrap_envelope(&self, wrapped_key: &[u8], wrapped_swk: &[u8]) -> Result<Vec<u8>> {
        let padding = PaddingScheme::new_oaep::<sha2::Sha256>();
        let swk = self.private_key.decrypt(padding, wrapped_swk)?;
        Ok(envelope::open(wrapped_key, &swk)?)
    }

    /// Recovers a secret released through the legacy direct path, which is a single
    /// RSA-OAEP/SHA-384 ciphertext with no SWK layer.
    pub fn unwrap_direct(&self, wrapped: &[u8]) -> Result<Vec<u8>> {
        let padding = PaddingScheme::new_oaep::<sha2::Sha384>();
        Ok(self.private_key.decrypt(padding, wrapped)?)
    }
}
