// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module provides the error taxonomy of the transfer protocol. The variants map
//! directly onto the statuses the surrounding HTTP layer reports: a missing resource, an
//! access denial, a malformed request, an upstream attestation-service failure, and an
//! internal fault.
//!
//! [TransferError::Unauthorized] deliberately covers both authentication failures (the
//! token would not verify) and authorization failures (the claims did not satisfy the
//! policy), so that a rejected caller cannot tell which check it failed. The precise reason
//! is logged broker-side instead. No variant ever carries secret material or raw claim
//! contents.

use crate::attest::error::AttestError;

use thiserror::Error;

/// The terminal failures of a transfer request. Nothing in the protocol retries
/// automatically; each of these ends the current request.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The requested key does not exist at this broker.
    #[error("The requested resource could not be found.")]
    NotFound,

    /// The evidence was rejected: token verification failed, the attestation type did not
    /// match the policy, or the claims did not satisfy the policy.
    #[error("Access to the requested key was denied.")]
    Unauthorized,

    /// The request is structurally invalid. The message names the missing or conflicting
    /// element, never its contents.
    #[error("The transfer request is malformed: {0}.")]
    BadRequest(&'static str),

    /// The attestation service could not be reached, or answered with a failure.
    #[error("The attestation service request failed.")]
    UpstreamFailure(#[from] AttestError),

    /// A broker-side fault: an integrity inconsistency between stores, or a failed
    /// cryptographic operation. The cause is logged, not reported to the caller.
    #[error("An internal error occurred while processing the transfer.")]
    Internal,
}
