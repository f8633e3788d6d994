// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module defines the key transfer policy data model and the claim matcher.
//!
//! A key transfer policy is authored by an administrator and attached to one or more keys in
//! the broker. It names the TEE technology the key may be released to and the hardware
//! measurements an attesting workload must present. Policies are persisted by an external
//! policy store (see [`crate::keys::PolicyStore`]) and are consumed read-only here.
//!
//! Two matching strategies exist, tried in order:
//!
//! 1. A *policy-identifier fast path*: if the attestation service has already matched one of
//!    the appraisal policy ids listed in the transfer policy, the claims are accepted without
//!    further attribute inspection.
//! 2. Full attribute matching against the measurement lists in the policy.
//!
//! The matcher itself lives in [`matcher`] and is a pure function of the claims and the
//! policy; it performs no I/O and holds no state.

pub mod error;
pub mod matcher;

use crate::attest::AttestationType;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Convenient result alias for this module, where errors are of type [error::MatchError].
pub type Result<T> = std::result::Result<T, error::MatchError>;

/// The SGX measurements a policy can require, plus the TCB currency flag.
///
/// List-valued fields are allow-lists: a claimed measurement matches when it is present in
/// the list. An empty `mrenclave` list means "any enclave measurement"; the other lists must
/// contain the claimed value. Absent optional fields are not enforced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SgxAttributes {
    /// Accepted enclave signer measurements.
    #[serde(default)]
    pub mrsigner: Vec<String>,

    /// Accepted ISV product identities.
    #[serde(default)]
    pub isvprodid: Vec<u16>,

    /// Accepted enclave build measurements. Empty means any.
    #[serde(default)]
    pub mrenclave: Vec<String>,

    /// Required ISV security version number. Absent means not enforced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isvsvn: Option<u16>,

    /// When true, the attesting platform's TCB status must be up to date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforce_tcb_upto_date: Option<bool>,
}

/// The TDX measurements a policy can require, plus the TCB currency flag.
///
/// The `mrsignerseam` and `mrseam` lists must contain the claimed value; an empty `mrtd` list
/// means "any trust-domain measurement". Each RTMR value is either empty (not enforced) or an
/// exact required value. Absent optional fields are not enforced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TdxAttributes {
    /// Accepted SEAM module signer measurements.
    #[serde(default)]
    pub mrsignerseam: Vec<String>,

    /// Accepted SEAM module measurements.
    #[serde(default)]
    pub mrseam: Vec<String>,

    /// Required SEAM security version number. Absent means not enforced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seamsvn: Option<u16>,

    /// Accepted trust-domain build measurements. Empty means any.
    #[serde(default)]
    pub mrtd: Vec<String>,

    /// Required value of RTMR0. Empty means not enforced.
    #[serde(default)]
    pub rtmr0: String,

    /// Required value of RTMR1. Empty means not enforced.
    #[serde(default)]
    pub rtmr1: String,

    /// Required value of RTMR2. Empty means not enforced.
    #[serde(default)]
    pub rtmr2: String,

    /// Required value of RTMR3. Empty means not enforced.
    #[serde(default)]
    pub rtmr3: String,

    /// When true, the attesting platform's TCB status must be up to date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforce_tcb_upto_date: Option<bool>,
}

/// One TEE-specific block of a transfer policy: an optional appraisal-policy-id allow-list
/// (the fast path) and an optional set of measurement attributes.
///
/// At least one of the two must be present: a policy with neither has nothing to match
/// against and will reject every claim set. The generic parameter distinguishes the SGX and
/// TDX attribute shapes while keeping the surrounding structure identical.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyBlock<A> {
    /// Identifiers of appraisal policies already evaluated by the attestation service.
    /// When one of these appears in the token's matched list, attribute matching is skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_ids: Option<Vec<String>>,

    /// The measurements to match when the fast path does not decide.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<A>,
}

/// An administrator-defined key transfer policy.
///
/// `attestation_type` is a non-empty list, but in practice holds exactly one entry; the first
/// entry is the effective type and selects which of the `sgx`/`tdx` blocks applies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyTransferPolicy {
    /// The identity of the policy, used by key records to reference it.
    pub id: String,

    /// When the policy was created.
    pub created_at: DateTime<Utc>,

    /// The TEE technologies this policy accepts evidence from.
    pub attestation_type: Vec<AttestationType>,

    /// The SGX block, present when the policy accepts SGX evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sgx: Option<PolicyBlock<SgxAttributes>>,

    /// The TDX block, present when the policy accepts TDX evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tdx: Option<PolicyBlock<TdxAttributes>>,
}

impl KeyTransferPolicy {
    /// The effective attestation type of this policy: the first (and in practice only)
    /// accepted type. `None` indicates a malformed policy record.
    pub fn effective_attestation_type(&self) -> Option<AttestationType> {
        self.attestation_type.first().copied()
    }

    /// The appraisal policy identifiers of the block matching the effective attestation
    /// type, for forwarding to the attestation service. Empty when none are configured.
    pub fn allowed_policy_ids(&self) -> Vec<String> {
        let ids = match self.effective_attestation_type() {
            Some(AttestationType::Sgx) => self.sgx.as_ref().and_then(|b| b.policy_ids.clone()),
            Some(AttestationType::Tdx) => self.tdx.as_ref().and_then(|b| b.policy_ids.clone()),
            None => None,
        };
        ids.unwrap_or_default()
    }
}
