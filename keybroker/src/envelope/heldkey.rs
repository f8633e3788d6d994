// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module recovers the client's RSA wrapping key from the held data reported in an
//! attestation token.
//!
//! In background mode the public key is not transmitted as a separate request field: the
//! workload binds it into its quote, and the attestation service reports it back verbatim as
//! held data. The platform encoding is idiosyncratic and must be reproduced exactly: after
//! base64 decoding, the first four bytes are the RSA public exponent in little-endian order,
//! and every remaining byte is the modulus, also in little-endian order, so the modulus must
//! be byte-reversed before the integer is constructed. Any change to this convention in
//! attester firmware would silently corrupt key wrapping, which is why the conversion is
//! isolated here behind a single function with its own fixture test.

use super::error::EnvelopeError;
use super::Result;

use rsa::{BigUint, PublicKeyParts, RsaPublicKey};

/// The held-data prefix holding the public exponent.
const EXPONENT_LENGTH: usize = 4;

/// Decodes the base64 held data from an attestation token into the client's RSA public
/// wrapping key.
pub fn rsa_public_key_from_held_data(held_data: &str) -> Result<RsaPublicKey> {
    let data = base64::decode(held_data)?;
    if data.len() <= EXPONENT_LENGTH {
        return Err(EnvelopeError::HeldDataTooShort);
    }

    let mut exponent_bytes = [0u8; EXPONENT_LENGTH];
    exponent_bytes.copy_from_slice(&data[..EXPONENT_LENGTH]);
    let exponent = u32::from_le_bytes(exponent_bytes);

    // The modulus arrives little-endian; reverse it into the big-endian order expected by
    // the integer constructor.
    let mut modulus = data[EXPONENT_LENGTH..].to_vec();
    modulus.reverse();

    let key = RsaPublicKey::new(BigUint::from_bytes_be(&modulus), BigUint::from(exponent))?;
    Ok(key)
}

/// Encodes an RSA public key in the held-data convention. This is the exact inverse of
/// [rsa_public_key_from_held_data] and exists for test fixtures and for dev/test clients
/// that simulate an attesting workload.
pub fn held_data_for_key(key: &RsaPublicKey) -> String {
    let mut exponent = key.e().to_bytes_le();
    exponent.resize(EXPONENT_LENGTH, 0);

    let mut data = exponent;
    data.extend_from_slice(&key.n().to_bytes_le());
    base64::encode(&data)
}
