// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module defines the attestation side of the key release protocol: the decoded
//! attestation token claims, the verifier nonce, and the trait seams through which the broker
//! talks to an external attestation service and token verifier.
//!
//! The broker never inspects raw hardware quotes and never checks token signatures itself.
//! Quotes are appraised by an attestation service (reachable through [`AttestationService`]),
//! and the resulting token is checked and decoded by a [`TokenVerifier`], which is expected to
//! perform signature, certificate-chain and revocation validation before handing back the
//! claim set. Both collaborators are external; this module only fixes their contracts.

pub mod error;

#[cfg(feature = "attest-http")]
pub mod http;

use serde::{Deserialize, Serialize};

/// Convenient result alias for this module, where errors are of type [error::AttestError].
pub type Result<T> = std::result::Result<T, error::AttestError>;

/// The TCB status reported by the attestation service when the platform is fully up to date.
/// Policies that enforce TCB currency compare the claimed status against this sentinel.
pub const TCB_STATUS_UP_TO_DATE: &str = "OK";

/// The TEE technologies understood by the broker. A key transfer policy accepts evidence from
/// exactly one of these, and the claims in an attestation token declare which one produced
/// the underlying quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationType {
    /// Intel SGX enclave attestation.
    #[serde(rename = "SGX")]
    Sgx,

    /// Intel TDX trust-domain attestation.
    #[serde(rename = "TDX")]
    Tdx,
}

impl std::fmt::Display for AttestationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttestationType::Sgx => write!(f, "SGX"),
            AttestationType::Tdx => write!(f, "TDX"),
        }
    }
}

impl std::str::FromStr for AttestationType {
    type Err = error::AttestError;

    fn from_str(s: &str) -> Result<AttestationType> {
        match s {
            "SGX" => Ok(AttestationType::Sgx),
            "TDX" => Ok(AttestationType::Tdx),
            _ => Err(error::AttestError::UnknownAttestationType),
        }
    }
}

/// A nonce issued by the attestation service. The client embeds the nonce in a fresh quote,
/// and the service echoes it back inside the verified token so that the broker can be sure
/// the evidence was produced for this exchange and not replayed.
///
/// All three fields are base64 strings and are treated as opaque by the broker; only the
/// attestation service interprets them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifierNonce {
    /// The random nonce value.
    pub val: String,

    /// The issuance timestamp, as recorded by the attestation service.
    pub iat: String,

    /// The service's signature over the nonce value and timestamp.
    pub signature: String,
}

/// The measurement claims found in a token produced from an SGX enclave quote.
///
/// The measurement fields are lower-case hex digests exactly as the attestation service
/// reports them; the broker compares them case-sensitively and never re-encodes them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SgxClaims {
    /// Hash of the enclave signing key.
    #[serde(rename = "sgx_mrsigner")]
    pub mr_signer: String,

    /// Hash of the enclave build measurement.
    #[serde(rename = "sgx_mrenclave")]
    pub mr_enclave: String,

    /// The product identity assigned by the enclave signer.
    #[serde(rename = "sgx_isvprodid")]
    pub isv_product_id: u16,

    /// The security version number of the enclave.
    #[serde(rename = "sgx_isvsvn")]
    pub isv_svn: u16,
}

/// The measurement claims found in a token produced from a TDX trust-domain quote.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TdxClaims {
    /// Hash of the SEAM module signing key.
    #[serde(rename = "tdx_mrsignerseam")]
    pub mr_signer_seam: String,

    /// Measurement of the SEAM module itself.
    #[serde(rename = "tdx_mrseam")]
    pub mr_seam: String,

    /// The security version number of the SEAM module.
    #[serde(rename = "tdx_seamsvn")]
    pub seam_svn: u16,

    /// The trust-domain build measurement.
    #[serde(rename = "tdx_mrtd")]
    pub mr_td: String,

    /// Runtime-extendable measurement register 0.
    #[serde(rename = "tdx_rtmr0")]
    pub rtmr0: String,

    /// Runtime-extendable measurement register 1.
    #[serde(rename = "tdx_rtmr1")]
    pub rtmr1: String,

    /// Runtime-extendable measurement register 2.
    #[serde(rename = "tdx_rtmr2")]
    pub rtmr2: String,

    /// Runtime-extendable measurement register 3.
    #[serde(rename = "tdx_rtmr3")]
    pub rtmr3: String,
}

/// The decoded body of a verified attestation token, as returned by a [`TokenVerifier`].
///
/// Exactly one of the SGX or TDX claim sets is present, matching [`AttestationTokenClaim::attester_type`].
/// The broker treats the token as trustworthy at this point; deciding whether the claims
/// satisfy a policy is the job of [`crate::policy::matcher`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttestationTokenClaim {
    /// SGX measurement claims, present when the attester is an SGX enclave.
    #[serde(flatten)]
    pub sgx: Option<SgxClaims>,

    /// TDX measurement claims, present when the attester is a TDX trust domain.
    #[serde(flatten)]
    pub tdx: Option<TdxClaims>,

    /// Data bound into the quote by the attesting workload itself and reported verbatim by
    /// the verifier. For key release this carries the workload's RSA public wrapping key in
    /// the platform encoding decoded by [`crate::envelope::heldkey`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attester_held_data: Option<String>,

    /// The TEE technology that produced the underlying quote.
    pub attester_type: AttestationType,

    /// The TCB status of the attesting platform, as judged by the attestation service.
    #[serde(default)]
    pub attester_tcb_status: String,

    /// Identifiers of appraisal policies that the attestation service already evaluated and
    /// found to match the evidence.
    #[serde(default)]
    pub policy_ids_matched: Vec<String>,

    /// Identifiers of appraisal policies that the attestation service evaluated and found
    /// not to match.
    #[serde(default)]
    pub policy_ids_unmatched: Vec<String>,

    /// Echo of the nonce that the broker handed to the client in the challenge round.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_nonce: Option<VerifierNonce>,
}

/// The raw evidence a client submits in the second round of the exchange (background mode):
/// a fresh quote embedding the challenge nonce, plus optional runtime data and event log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Evidence {
    /// The hardware quote, base64-encoded.
    pub quote: String,

    /// The nonce issued by the attestation service in the challenge round.
    pub verifier_nonce: VerifierNonce,

    /// Runtime data bound into the quote by the workload, base64-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,

    /// The boot-time event log of the platform, where the TEE provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_log: Option<String>,
}

/// The contract of the external attestation service.
///
/// The service issues challenge nonces and appraises quotes, returning a signed attestation
/// token. The broker calls it once per round trip and treats any failure as terminal for the
/// current request; retries belong to the caller's transport layer.
pub trait AttestationService {
    /// Obtains a fresh nonce for the client to embed in its quote.
    fn nonce(&self) -> Result<VerifierNonce>;

    /// Submits the client's evidence for appraisal against the given appraisal policy
    /// identifiers, returning the signed attestation token as a compact string.
    fn attestation_token(&self, evidence: &Evidence, policy_ids: &[String]) -> Result<String>;
}

/// The contract of the external token verifier.
///
/// Implementations must perform full signature, certificate-chain and revocation validation
/// of the token before decoding its body. The broker only ever sees claims that have passed
/// that validation.
pub trait TokenVerifier {
    /// Verifies the given token and returns its decoded claim set.
    fn verify(&self, token: &str) -> Result<AttestationTokenClaim>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgx_claims_deserialize_flattened() {
        let doc = r#"{
            "sgx_mrenclave": "0102",
            "sgx_mrsigner": "0304",
            "sgx_isvprodid": 1,
            "sgx_isvsvn": 0,
            "attester_held_data": "aGVsZA==",
            "attester_type": "SGX",
            "attester_tcb_status": "OK",
            "policy_ids_matched": ["p-1"]
        }"#;
        let claim: AttestationTokenClaim = serde_json::from_str(doc).unwrap();
        assert_eq!(claim.attester_type, AttestationType::Sgx);
        let sgx = claim.sgx.expect("sgx claims should be present");
        assert_eq!(sgx.mr_enclave, "0102");
        assert_eq!(sgx.isv_product_id, 1);
        assert!(claim.tdx.is_none());
        assert_eq!(claim.policy_ids_matched, vec!["p-1".to_string()]);
        assert!(claim.policy_ids_unmatched.is_empty());
    }

    #[test]
    fn test_tdx_claims_deserialize_flattened() {
        let doc = r#"{
            "tdx_mrsignerseam": "aa",
            "tdx_mrseam": "bb",
            "tdx_seamsvn": 3,
            "tdx_mrtd": "cc",
            "tdx_rtmr0": "r0",
            "tdx_rtmr1": "r1",
            "tdx_rtmr2": "r2",
            "tdx_rtmr3": "r3",
            "attester_type": "TDX"
        }"#;
        let claim: AttestationTokenClaim = serde_json::from_str(doc).unwrap();
        assert_eq!(claim.attester_type, AttestationType::Tdx);
        assert!(claim.sgx.is_none());
        let tdx = claim.tdx.expect("tdx claims should be present");
        assert_eq!(tdx.seam_svn, 3);
        assert_eq!(tdx.rtmr3, "r3");
    }

    #[test]
    fn test_attestation_type_round_trip() {
        let sgx: AttestationType = "SGX".parse().unwrap();
        assert_eq!(sgx, AttestationType::Sgx);
        assert_eq!(sgx.to_string(), "SGX");
        assert!("SEV".parse::<AttestationType>().is_err());
    }
}
