// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module provides the error definitions for the attestation collaborators: the
//! attestation service client and the token verifier seam.

use thiserror::Error;

/// Specific error types for errors that can occur while obtaining nonces and tokens from an
/// attestation service, or while verifying a token.
#[derive(Error, Debug)]
pub enum AttestError {
    /// Error emanating from the HTTP client while talking to the attestation service.
    #[cfg(feature = "attest-http")]
    #[error(transparent)]
    WebRequestError(#[from] reqwest::Error),

    /// Errors relating to JSON processing of service requests and responses.
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// The attestation service answered, but with a failure status.
    #[error("The attestation service returned HTTP status {0}.")]
    ServiceFailure(u16),

    /// An attestation type string was encountered that this broker does not understand.
    #[error("Unknown attestation type.")]
    UnknownAttestationType,

    /// The attestation token failed signature or certificate validation, or its body could
    /// not be decoded. The reason is deliberately not detailed further.
    #[error("The attestation token could not be verified.")]
    TokenVerificationFailed,
}
