// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module implements the claim matcher: the pure decision function that determines
//! whether the claims in a verified attestation token satisfy a key transfer policy.
//!
//! Matching proceeds in two stages. If both the token and the policy carry appraisal policy
//! identifiers, an intersection between the token's matched ids and the policy's allow-list
//! accepts the claims immediately. Otherwise every measurement attribute configured in the
//! policy must hold. All comparisons are case-sensitive exact matches; measurements are hex
//! digests and are never normalised here. Membership lookups are linear scans, which is
//! appropriate for the small allow-lists (tens of entries) policies carry in practice.

use super::error::MatchError;
use super::{KeyTransferPolicy, Result, SgxAttributes, TdxAttributes};
use crate::attest::{AttestationTokenClaim, AttestationType, SgxClaims, TdxClaims, TCB_STATUS_UP_TO_DATE};

/// Membership test for string-valued measurement lists.
fn list_contains_str(list: &[String], value: &str) -> bool {
    list.iter().any(|entry| entry == value)
}

/// Membership test for integer-valued measurement lists.
fn list_contains_u16(list: &[u16], value: u16) -> bool {
    list.iter().any(|entry| *entry == value)
}

/// Decides whether the given claims satisfy the given policy.
///
/// Returns `Ok(())` when the claims are acceptable, and a [MatchError] naming the first
/// failed check otherwise. The caller is expected to map any failure to an authorization
/// error; the distinction between the variants is for operator logs only.
pub fn validate(claims: &AttestationTokenClaim, policy: &KeyTransferPolicy) -> Result<()> {
    match policy.effective_attestation_type() {
        Some(AttestationType::Sgx) => {
            let block = policy
                .sgx
                .as_ref()
                .ok_or(MatchError::UnsupportedAttestationType)?;
            if fast_path_accepts(claims, block.policy_ids.as_deref()) {
                log::debug!("policy {}: accepted via policy-id fast path", policy.id);
                return Ok(());
            }
            let attributes = block.attributes.as_ref().ok_or(MatchError::NoPolicyIdMatch)?;
            let sgx = claims
                .sgx
                .as_ref()
                .ok_or(MatchError::MissingMeasurementClaims)?;
            validate_sgx_attributes(sgx, &claims.attester_tcb_status, attributes)
        }
        Some(AttestationType::Tdx) => {
            let block = policy
                .tdx
                .as_ref()
                .ok_or(MatchError::UnsupportedAttestationType)?;
            if fast_path_accepts(claims, block.policy_ids.as_deref()) {
                log::debug!("policy {}: accepted via policy-id fast path", policy.id);
                return Ok(());
            }
            let attributes = block.attributes.as_ref().ok_or(MatchError::NoPolicyIdMatch)?;
            let tdx = claims
                .tdx
                .as_ref()
                .ok_or(MatchError::MissingMeasurementClaims)?;
            validate_tdx_attributes(tdx, &claims.attester_tcb_status, attributes)
        }
        None => Err(MatchError::UnsupportedAttestationType),
    }
}

/// The policy-id fast path: true when any appraisal policy id that the attestation service
/// already matched appears in the policy's allow-list. Order is irrelevant on both sides.
fn fast_path_accepts(claims: &AttestationTokenClaim, allowed: Option<&[String]>) -> bool {
    let allowed = match allowed {
        Some(ids) if !ids.is_empty() => ids,
        _ => return false,
    };
    claims
        .policy_ids_matched
        .iter()
        .any(|id| list_contains_str(allowed, id))
}

/// Checks the TCB currency requirement shared by both attestation types.
fn validate_tcb_status(tcb_status: &str, enforce: Option<bool>) -> Result<()> {
    if enforce == Some(true) && tcb_status != TCB_STATUS_UP_TO_DATE {
        return Err(MatchError::AttributesMismatch("attester_tcb_status"));
    }
    Ok(())
}

/// Full attribute matching for SGX claims. Every configured attribute must hold.
fn validate_sgx_attributes(
    claims: &SgxClaims,
    tcb_status: &str,
    attributes: &SgxAttributes,
) -> Result<()> {
    if !list_contains_str(&attributes.mrsigner, &claims.mr_signer) {
        return Err(MatchError::AttributesMismatch("mrsigner"));
    }
    if !list_contains_u16(&attributes.isvprodid, claims.isv_product_id) {
        return Err(MatchError::AttributesMismatch("isvprodid"));
    }
    // An empty mrenclave list accepts any enclave measurement.
    if !attributes.mrenclave.is_empty()
        && !list_contains_str(&attributes.mrenclave, &claims.mr_enclave)
    {
        return Err(MatchError::AttributesMismatch("mrenclave"));
    }
    if let Some(required) = attributes.isvsvn {
        if claims.isv_svn != required {
            return Err(MatchError::AttributesMismatch("isvsvn"));
        }
    }
    validate_tcb_status(tcb_status, attributes.enforce_tcb_upto_date)
}

/// Full attribute matching for TDX claims. Every configured attribute must hold.
fn validate_tdx_attributes(
    claims: &TdxClaims,
    tcb_status: &str,
    attributes: &TdxAttributes,
) -> Result<()> {
    if !list_contains_str(&attributes.mrsignerseam, &claims.mr_signer_seam) {
        return Err(MatchError::AttributesMismatch("mrsignerseam"));
    }
    if !list_contains_str(&attributes.mrseam, &claims.mr_seam) {
        return Err(MatchError::AttributesMismatch("mrseam"));
    }
    if let Some(required) = attributes.seamsvn {
        if claims.seam_svn != required {
            return Err(MatchError::AttributesMismatch("seamsvn"));
        }
    }
    // An empty mrtd list accepts any trust-domain measurement.
    if !attributes.mrtd.is_empty() && !list_contains_str(&attributes.mrtd, &claims.mr_td) {
        return Err(MatchError::AttributesMismatch("mrtd"));
    }
    let registers = [
        (&attributes.rtmr0, &claims.rtmr0, "rtmr0"),
        (&attributes.rtmr1, &claims.rtmr1, "rtmr1"),
        (&attributes.rtmr2, &claims.rtmr2, "rtmr2"),
        (&attributes.rtmr3, &claims.rtmr3, "rtmr3"),
    ];
    for (required, claimed, field) in registers {
        if !required.is_empty() && required != claimed {
            return Err(MatchError::AttributesMismatch(field));
        }
    }
    validate_tcb_status(tcb_status, attributes.enforce_tcb_upto_date)
}
