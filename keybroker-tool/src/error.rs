// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! Error definitions/handling.

use thiserror::Error;

/// Errors in keybroker-tool
#[derive(Error, Debug)]
pub enum Error {
    /// Error emanating from standard I/O.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Errors relating to JSON processing.
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// Errors relating to the key, policy and key-material stores.
    #[error(transparent)]
    KeyStoreError(#[from] keybroker::keys::error::KeyError),

    /// A set of attestation claims was rejected by a key transfer policy.
    #[error(transparent)]
    ClaimMatchError(#[from] keybroker::policy::error::MatchError),

    /// Errors relating to envelope wrapping.
    #[error(transparent)]
    EnvelopeError(#[from] keybroker::envelope::error::EnvelopeError),

    /// Errors coming from the attestation service client.
    #[error(transparent)]
    AttestError(#[from] keybroker::attest::error::AttestError),

    /// Errors related to RSA operations
    #[error(transparent)]
    RsaError(#[from] rsa::errors::Error),

    /// Errors related to PKCS#1 key parsing
    #[error(transparent)]
    Pkcs1Error(#[from] pkcs1::Error),

    /// Errors related to ASN.1 processing of public keys
    #[error(transparent)]
    Asn1Error(#[from] picky_asn1_der::Asn1DerError),

    /// A base64 input could not be decoded.
    #[error(transparent)]
    Base64DecodeError(#[from] base64::DecodeError),

    /// Error emanating from the keybroker-tool itself.
    #[error(transparent)]
    ToolError(#[from] ToolErrorKind),
}

/// Errors originating in the keybroker-tool itself.
#[derive(Error, Debug)]
pub enum ToolErrorKind {
    /// There is some missing configuration for a command, such as a required environment
    /// variable or configuration file/option.
    #[error("Missing configuration")]
    MissingConfiguration,

    /// The given public key file is neither PEM nor DER in a supported format.
    #[error("Unsupported public key format")]
    UnsupportedPublicKeyFormat,
}

/// A Result type with the Err variant set as a ToolError
pub type Result<T> = std::result::Result<T, Error>;
