// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module provides the error definitions for envelope wrapping and unwrapping.
//! Error messages never contain key material; a failed cryptographic operation is reported
//! without further detail.

use thiserror::Error;

/// Specific error types for errors that can occur while building or opening the wrapped-key
/// envelope.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// A random-generation, AEAD or key-derivation primitive failed.
    #[error("A cryptographic operation failed.")]
    CryptoError(#[from] ring::error::Unspecified),

    /// Error coming from the RSA crate while wrapping the SWK or parsing a public key.
    #[error(transparent)]
    RsaError(#[from] rsa::errors::Error),

    /// Error coming from the PKCS#8 crate while re-framing a private-key secret.
    #[error(transparent)]
    Pkcs8Error(#[from] pkcs8::Error),

    /// Error coming from the PKCS#1 crate while parsing a caller public key.
    #[error(transparent)]
    Pkcs1Error(#[from] pkcs1::Error),

    /// The envelope metadata header could not be encoded or decoded.
    #[error(transparent)]
    HeaderError(#[from] bincode::Error),

    /// The held data was not valid base64.
    #[error(transparent)]
    Base64DecodeError(#[from] base64::DecodeError),

    /// A private-key secret was neither a PEM document nor a DER document.
    #[error("The private key material is not in a recognised PEM or DER framing.")]
    MalformedPrivateKey,

    /// The envelope bytes do not add up to the lengths declared in the metadata header.
    #[error("The envelope is truncated or its header is inconsistent.")]
    TruncatedEnvelope,

    /// The held data is too short to carry an exponent and a modulus.
    #[error("The held data is too short to carry an RSA public key.")]
    HeldDataTooShort,
}
