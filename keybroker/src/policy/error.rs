// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module provides the error definitions for claim matching. Matcher errors name the
//! policy field that failed to match, never the claimed value: claim contents must not leak
//! into error messages or logs.

use thiserror::Error;

/// The ways in which a set of attestation claims can fail to satisfy a key transfer policy.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatchError {
    /// The policy does not carry a block for its own declared attestation type, or declares
    /// no attestation type at all.
    #[error("The policy does not support the requested attestation type.")]
    UnsupportedAttestationType,

    /// No appraisal policy id matched and the policy has no attribute block to fall back on.
    #[error("No policy id matched and the policy has no attributes to fall back on.")]
    NoPolicyIdMatch,

    /// The claims do not carry the measurement set required by the policy's attestation
    /// type.
    #[error("The token does not carry the measurement claims required by the policy.")]
    MissingMeasurementClaims,

    /// A measurement attribute did not match. Only the field name is reported.
    #[error("The claims do not match the key transfer policy attributes ({0}).")]
    AttributesMismatch(&'static str),
}
