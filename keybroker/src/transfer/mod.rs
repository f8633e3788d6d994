// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module drives the evidence exchange that gates key release.
//!
//! The exchange is a two-round-trip protocol with no server-side session. In the first round
//! the client names a key and receives a challenge: a fresh nonce from the attestation
//! service together with the attestation type demanded by the key's transfer policy. The
//! client embeds the nonce in a fresh quote and retries with the evidence attached
//! (background mode), or presents an attestation token it already holds (passport mode).
//! Every piece of state the second round needs (the key identity, the policy) is re-derived
//! from the request and the backing stores, so any number of transfers can be in flight
//! concurrently and a dropped exchange costs nothing to abandon.
//!
//! The request walks through four stages: the key and policy lookups, token acquisition,
//! claim validation, and envelope wrapping. A failure at any stage is terminal for the
//! request and is reported through the deliberately coarse taxonomy in [error].

pub mod error;

use crate::attest::{
    AttestationService, AttestationTokenClaim, AttestationType, Evidence, TokenVerifier,
    VerifierNonce,
};
use crate::envelope;
use crate::envelope::heldkey;
use crate::keys::error::KeyError;
use crate::keys::{KeyManager, KeyRecord, KeyStore, PolicyStore};
use crate::policy::{matcher, KeyTransferPolicy};

use self::error::TransferError;
use pkcs1::FromRsaPublicKey;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

/// Convenient result alias for this module, where errors are of type [error::TransferError].
pub type Result<T> = std::result::Result<T, TransferError>;

/// A key transfer request, as assembled by the HTTP layer from one client call.
///
/// The population of the optional fields selects the protocol mode:
///
/// - no attestation type and no token: first round; the response is a nonce challenge.
/// - an attestation type and evidence: background mode; the broker obtains a token from the
///   attestation service on the client's behalf.
/// - a token and no attestation type: passport mode; the token is taken to verification
///   directly.
///
/// `public_key` plays no part in the evidence exchange; it is the out-of-band-verified key
/// consumed by the legacy direct path ([KeyReleaseService::transfer_key]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferKeyRequest {
    /// The identity of the key to transfer.
    pub key_id: String,

    /// The attestation-type header, present in background mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_type: Option<AttestationType>,

    /// A pre-issued attestation token, present in passport mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_token: Option<String>,

    /// The raw evidence, present in background mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,

    /// A pre-fetched client public key (base64 PKCS#1 DER) for the legacy direct path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// The outcome of a transfer request: either the challenge for the second round, or the two
/// wrapped artifacts. The wrapped fields are base64 for JSON transport.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransferKeyResponse {
    /// First-round response: the client must embed this nonce in a fresh quote of the named
    /// attestation type and retry.
    Challenge {
        /// The nonce to embed in the quote.
        verifier_nonce: VerifierNonce,

        /// The attestation type the key's transfer policy demands.
        attestation_type: AttestationType,
    },

    /// Second-round response: the released key.
    Key {
        /// The enveloped secret: metadata header, GCM nonce and ciphertext, base64-encoded.
        wrapped_key: String,

        /// The SWK under RSA-OAEP/SHA-256, base64-encoded.
        wrapped_swk: String,
    },
}

/// The key release façade: combines the storage collaborators, the attestation service and
/// the token verifier into the two transfer operations.
///
/// The service holds no per-request state and can be shared freely across worker threads.
pub struct KeyReleaseService<S, P, M, A, V> {
    key_store: S,
    policy_store: P,
    key_manager: M,
    attestation: A,
    verifier: V,
}

impl<S, P, M, A, V> KeyReleaseService<S, P, M, A, V>
where
    S: KeyStore,
    P: PolicyStore,
    M: KeyManager,
    A: AttestationService,
    V: TokenVerifier,
{
    /// Assembles a release service from its collaborators.
    pub fn new(
        key_store: S,
        policy_store: P,
        key_manager: M,
        attestation: A,
        verifier: V,
    ) -> KeyReleaseService<S, P, M, A, V> {
        KeyReleaseService {
            key_store,
            policy_store,
            key_manager,
            attestation,
            verifier,
        }
    }

    /// The legacy direct transfer: wraps the key under RSA-OAEP/SHA-384 against an
    /// out-of-band-verified public key (PKCS#1 DER), with no SWK layer and no attestation
    /// check.
    ///
    /// This path performs no policy evaluation whatsoever. It must only be reachable
    /// through an already-authenticated administrative channel; exposing it to untrusted
    /// callers defeats the purpose of the broker.
    pub fn transfer_key(&self, key_id: &str, public_key_der: &[u8]) -> Result<Vec<u8>> {
        let record = self.lookup_key(key_id)?;

        let recipient = RsaPublicKey::from_pkcs1_der(public_key_der)
            .map_err(|_| TransferError::BadRequest("public key is not PKCS#1 DER"))?;

        let (_, secret) = self.plaintext_key(&record)?;
        let wrapped = envelope::wrap_direct(&secret, &recipient).map_err(|e| {
            log::error!("direct wrap failed for key {}: {}", record.id, e);
            TransferError::Internal
        })?;

        log::info!("key {} released through the direct path", record.id);
        Ok(wrapped)
    }

    /// The attestation-gated transfer. Depending on the request mode this either issues the
    /// first-round challenge or carries the evidence through verification, claim matching
    /// and envelope wrapping.
    pub fn transfer_key_with_evidence(
        &self,
        request: &TransferKeyRequest,
    ) -> Result<TransferKeyResponse> {
        let record = self.lookup_key(&request.key_id)?;
        let policy = self.lookup_policy(&record)?;

        let effective_type = policy.effective_attestation_type().ok_or_else(|| {
            log::error!("policy {} names no attestation type", policy.id);
            TransferError::Internal
        })?;

        let token = match (request.attestation_type, &request.attestation_token) {
            (None, None) => {
                // First round: challenge the client with a fresh nonce. No session is
                // recorded; the retry re-derives everything from its own request.
                let verifier_nonce = self.attestation.nonce()?;
                log::info!(
                    "key {}: challenge issued, awaiting {} evidence",
                    record.id,
                    effective_type
                );
                return Ok(TransferKeyResponse::Challenge {
                    verifier_nonce,
                    attestation_type: effective_type,
                });
            }
            (None, Some(token)) => {
                log::debug!("key {}: passport mode token presented", record.id);
                token.clone()
            }
            (Some(header_type), _) => {
                if header_type != effective_type {
                    log::debug!(
                        "key {}: request attestation type {} does not match policy",
                        record.id,
                        header_type
                    );
                    return Err(TransferError::Unauthorized);
                }
                let evidence = request
                    .evidence
                    .as_ref()
                    .ok_or(TransferError::BadRequest("evidence is missing"))?;
                let policy_ids = policy.allowed_policy_ids();
                self.attestation.attestation_token(evidence, &policy_ids)?
            }
        };

        let claims = self.verifier.verify(&token).map_err(|e| {
            log::debug!("key {}: token verification failed: {}", record.id, e);
            TransferError::Unauthorized
        })?;

        if claims.attester_type != effective_type {
            log::debug!(
                "key {}: token attester type {} does not match policy",
                record.id,
                claims.attester_type
            );
            return Err(TransferError::Unauthorized);
        }

        matcher::validate(&claims, &policy).map_err(|e| {
            log::debug!("key {}: claims rejected: {}", record.id, e);
            TransferError::Unauthorized
        })?;

        let recipient = self.recipient_key(&record, &claims)?;
        let (algorithm, secret) = self.plaintext_key(&record)?;

        let wrapped = envelope::wrap(algorithm, &secret, &recipient).map_err(|e| {
            log::error!("envelope wrap failed for key {}: {}", record.id, e);
            TransferError::Internal
        })?;

        log::info!("key {} released to attested {} workload", record.id, effective_type);
        Ok(TransferKeyResponse::Key {
            wrapped_key: base64::encode(&wrapped.wrapped_key),
            wrapped_swk: base64::encode(&wrapped.wrapped_swk),
        })
    }

    fn lookup_key(&self, key_id: &str) -> Result<KeyRecord> {
        self.key_store.get(key_id).map_err(|e| match e {
            KeyError::KeyNotFound => TransferError::NotFound,
            other => {
                log::error!("key store failure for key {}: {}", key_id, other);
                TransferError::Internal
            }
        })
    }

    /// A key record that names a policy which cannot be fetched is an integrity fault of
    /// the broker's own stores, not a client error.
    fn lookup_policy(&self, record: &KeyRecord) -> Result<KeyTransferPolicy> {
        self.policy_store
            .get(&record.transfer_policy_id)
            .map_err(|e| {
                log::error!(
                    "transfer policy {} for key {} unavailable: {}",
                    record.transfer_policy_id,
                    record.id,
                    e
                );
                TransferError::Internal
            })
    }

    /// Likewise, key material missing for a key that has a record is an integrity fault.
    fn plaintext_key(&self, record: &KeyRecord) -> Result<(crate::keys::KeyAlgorithm, Vec<u8>)> {
        self.key_manager.plaintext_key(&record.id).map_err(|e| {
            log::error!("key material for key {} unavailable: {}", record.id, e);
            TransferError::Internal
        })
    }

    /// Recovers the client's wrapping key from the held data the verifier reported. A token
    /// that carries no held data, or held data that does not decode to an RSA key, cannot
    /// authorize a release.
    fn recipient_key(
        &self,
        record: &KeyRecord,
        claims: &AttestationTokenClaim,
    ) -> Result<RsaPublicKey> {
        let held_data = claims.attester_held_data.as_deref().ok_or_else(|| {
            log::debug!("key {}: token carries no held data", record.id);
            TransferError::Unauthorized
        })?;
        heldkey::rsa_public_key_from_held_data(held_data).map_err(|e| {
            log::debug!("key {}: held data rejected: {}", record.id, e);
            TransferError::Unauthorized
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attest::error::AttestError;
    use crate::attest::{SgxClaims, TCB_STATUS_UP_TO_DATE};
    use crate::keys::file::{FileKeyStore, FilePolicyStore};
    use crate::keys::local::LocalWrappingKeyPair;
    use crate::policy::{PolicyBlock, SgxAttributes};

    use chrono::Utc;
    use std::cell::Cell;
    use std::rc::Rc;

    const KEY_ID: &str = "5d286b7e-ff68-4b4b-b7b8-05f55dbfd0c7";
    const POLICY_ID: &str = "9f7d1b3c-0a52-4c2e-8b51-7e2b9a1f7c11";
    const TOKEN: &str = "header.payload.signature";

    fn key_store() -> FileKeyStore {
        let document = format!(
            r#"{{
                "{}": {{
                    "algorithm": "aes",
                    "transfer_policy_id": "{}",
                    "key": "{}"
                }}
            }}"#,
            KEY_ID,
            POLICY_ID,
            base64::encode(&secret())
        );
        FileKeyStore::from_json(&document).unwrap()
    }

    fn secret() -> Vec<u8> {
        (100u8..132).collect()
    }

    fn sgx_policy() -> KeyTransferPolicy {
        KeyTransferPolicy {
            id: String::from(POLICY_ID),
            created_at: Utc::now(),
            attestation_type: vec![AttestationType::Sgx],
            sgx: Some(PolicyBlock {
                policy_ids: None,
                attributes: Some(SgxAttributes {
                    mrsigner: vec!["aa".repeat(32)],
                    isvprodid: vec![1],
                    mrenclave: vec![],
                    isvsvn: Some(0),
                    enforce_tcb_upto_date: Some(true),
                }),
            }),
            tdx: None,
        }
    }

    fn nonce() -> VerifierNonce {
        VerifierNonce {
            val: String::from("bm9uY2U="),
            iat: String::from("aWF0"),
            signature: String::from("c2ln"),
        }
    }

    fn evidence() -> Evidence {
        Evidence {
            quote: String::from("cXVvdGU="),
            verifier_nonce: nonce(),
            user_data: None,
            event_log: None,
        }
    }

    fn claims_for(pair: &LocalWrappingKeyPair) -> AttestationTokenClaim {
        AttestationTokenClaim {
            sgx: Some(SgxClaims {
                mr_signer: "aa".repeat(32),
                mr_enclave: "cc".repeat(32),
                isv_product_id: 1,
                isv_svn: 0,
            }),
            tdx: None,
            attester_held_data: Some(pair.held_data()),
            attester_type: AttestationType::Sgx,
            attester_tcb_status: String::from(TCB_STATUS_UP_TO_DATE),
            policy_ids_matched: vec![],
            policy_ids_unmatched: vec![],
            verifier_nonce: Some(nonce()),
        }
    }

    /// Counts calls so that tests can assert which network round trips happened.
    struct StubAttestation {
        nonce_calls: Rc<Cell<u32>>,
        token_calls: Rc<Cell<u32>>,
    }

    impl StubAttestation {
        fn new() -> (StubAttestation, Rc<Cell<u32>>, Rc<Cell<u32>>) {
            let nonce_calls = Rc::new(Cell::new(0));
            let token_calls = Rc::new(Cell::new(0));
            (
                StubAttestation {
                    nonce_calls: nonce_calls.clone(),
                    token_calls: token_calls.clone(),
                },
                nonce_calls,
                token_calls,
            )
        }
    }

    impl AttestationService for StubAttestation {
        fn nonce(&self) -> crate::attest::Result<VerifierNonce> {
            self.nonce_calls.set(self.nonce_calls.get() + 1);
            Ok(nonce())
        }

        fn attestation_token(
            &self,
            _evidence: &Evidence,
            _policy_ids: &[String],
        ) -> crate::attest::Result<String> {
            self.token_calls.set(self.token_calls.get() + 1);
            Ok(String::from(TOKEN))
        }
    }

    struct StubVerifier {
        claims: Option<AttestationTokenClaim>,
    }

    impl TokenVerifier for StubVerifier {
        fn verify(&self, token: &str) -> crate::attest::Result<AttestationTokenClaim> {
            assert_eq!(token, TOKEN);
            self.claims
                .clone()
                .ok_or(AttestError::TokenVerificationFailed)
        }
    }

    fn service(
        claims: Option<AttestationTokenClaim>,
    ) -> (
        KeyReleaseService<FileKeyStore, FilePolicyStore, FileKeyStore, StubAttestation, StubVerifier>,
        Rc<Cell<u32>>,
        Rc<Cell<u32>>,
    ) {
        let (attestation, nonce_calls, token_calls) = StubAttestation::new();
        let service = KeyReleaseService::new(
            key_store(),
            FilePolicyStore::from_policies(vec![sgx_policy()]),
            key_store(),
            attestation,
            StubVerifier { claims },
        );
        (service, nonce_calls, token_calls)
    }

    fn challenge_request() -> TransferKeyRequest {
        TransferKeyRequest {
            key_id: String::from(KEY_ID),
            attestation_type: None,
            attestation_token: None,
            evidence: None,
            public_key: None,
        }
    }

    #[test]
    fn test_first_round_returns_nonce_challenge() {
        let (service, nonce_calls, token_calls) = service(None);

        let response = service
            .transfer_key_with_evidence(&challenge_request())
            .unwrap();
        match response {
            TransferKeyResponse::Challenge {
                verifier_nonce,
                attestation_type,
            } => {
                assert_eq!(verifier_nonce, nonce());
                assert_eq!(attestation_type, AttestationType::Sgx);
            }
            _ => panic!("expected a nonce challenge"),
        }
        assert_eq!(nonce_calls.get(), 1);
        assert_eq!(token_calls.get(), 0);
    }

    #[test]
    fn test_second_round_releases_key() {
        let pair = LocalWrappingKeyPair::default();
        let (service, nonce_calls, token_calls) = service(Some(claims_for(&pair)));

        let mut request = challenge_request();
        request.attestation_type = Some(AttestationType::Sgx);
        request.evidence = Some(evidence());

        let response = service.transfer_key_with_evidence(&request).unwrap();
        match response {
            TransferKeyResponse::Key {
                wrapped_key,
                wrapped_swk,
            } => {
                let recovered = pair
                    .unwrap_envelope(
                        &base64::decode(&wrapped_key).unwrap(),
                        &base64::decode(&wrapped_swk).unwrap(),
                    )
                    .unwrap();
                assert_eq!(recovered, secret());
            }
            _ => panic!("expected the wrapped key"),
        }
        assert_eq!(nonce_calls.get(), 0);
        assert_eq!(token_calls.get(), 1);
    }

    #[test]
    fn test_passport_mode_skips_attestation_service() {
        let pair = LocalWrappingKeyPair::default();
        let (service, nonce_calls, token_calls) = service(Some(claims_for(&pair)));

        let mut request = challenge_request();
        request.attestation_token = Some(String::from(TOKEN));

        let response = service.transfer_key_with_evidence(&request).unwrap();
        assert!(matches!(response, TransferKeyResponse::Key { .. }));
        assert_eq!(nonce_calls.get(), 0);
        assert_eq!(token_calls.get(), 0);
    }

    #[test]
    fn test_header_type_mismatch_fails_before_attestation_call() {
        let (service, nonce_calls, token_calls) = service(None);

        let mut request = challenge_request();
        request.attestation_type = Some(AttestationType::Tdx);
        request.evidence = Some(evidence());

        assert!(matches!(
            service.transfer_key_with_evidence(&request),
            Err(TransferError::Unauthorized)
        ));
        assert_eq!(nonce_calls.get(), 0);
        assert_eq!(token_calls.get(), 0);
    }

    #[test]
    fn test_header_without_evidence_is_bad_request() {
        let (service, _, token_calls) = service(None);

        let mut request = challenge_request();
        request.attestation_type = Some(AttestationType::Sgx);

        assert!(matches!(
            service.transfer_key_with_evidence(&request),
            Err(TransferError::BadRequest(_))
        ));
        assert_eq!(token_calls.get(), 0);
    }

    #[test]
    fn test_unknown_key_is_not_found() {
        let (service, _, _) = service(None);

        let mut request = challenge_request();
        request.key_id = String::from("absent");

        assert!(matches!(
            service.transfer_key_with_evidence(&request),
            Err(TransferError::NotFound)
        ));
    }

    #[test]
    fn test_missing_policy_record_is_internal() {
        let (attestation, _, _) = StubAttestation::new();
        let service = KeyReleaseService::new(
            key_store(),
            FilePolicyStore::from_policies(vec![]),
            key_store(),
            attestation,
            StubVerifier { claims: None },
        );

        assert!(matches!(
            service.transfer_key_with_evidence(&challenge_request()),
            Err(TransferError::Internal)
        ));
    }

    #[test]
    fn test_claim_mismatch_is_unauthorized() {
        let pair = LocalWrappingKeyPair::default();
        let mut claims = claims_for(&pair);
        claims.attester_tcb_status = String::from("OUT_OF_DATE");
        let (service, _, _) = service(Some(claims));

        let mut request = challenge_request();
        request.attestation_token = Some(String::from(TOKEN));

        assert!(matches!(
            service.transfer_key_with_evidence(&request),
            Err(TransferError::Unauthorized)
        ));
    }

    #[test]
    fn test_token_attester_type_mismatch_is_unauthorized() {
        let pair = LocalWrappingKeyPair::default();
        let mut claims = claims_for(&pair);
        claims.attester_type = AttestationType::Tdx;
        let (service, _, _) = service(Some(claims));

        let mut request = challenge_request();
        request.attestation_token = Some(String::from(TOKEN));

        assert!(matches!(
            service.transfer_key_with_evidence(&request),
            Err(TransferError::Unauthorized)
        ));
    }

    #[test]
    fn test_token_without_held_data_is_unauthorized() {
        let pair = LocalWrappingKeyPair::default();
        let mut claims = claims_for(&pair);
        claims.attester_held_data = None;
        let (service, _, _) = service(Some(claims));

        let mut request = challenge_request();
        request.attestation_token = Some(String::from(TOKEN));

        assert!(matches!(
            service.transfer_key_with_evidence(&request),
            Err(TransferError::Unauthorized)
        ));
    }

    #[test]
    fn test_unverifiable_token_is_unauthorized() {
        let (service, _, _) = service(None);

        let mut request = challenge_request();
        request.attestation_token = Some(String::from(TOKEN));

        assert!(matches!(
            service.transfer_key_with_evidence(&request),
            Err(TransferError::Unauthorized)
        ));
    }

    #[test]
    fn test_direct_transfer_round_trip() {
        let (service, _, _) = service(None);
        let pair = LocalWrappingKeyPair::default();

        let wrapped = service
            .transfer_key(KEY_ID, &pair.public_key_der().unwrap())
            .unwrap();
        let recovered = pair.unwrap_direct(&wrapped).unwrap();
        assert_eq!(recovered, secret());
    }

    #[test]
    fn test_direct_transfer_rejects_bad_public_key() {
        let (service, _, _) = service(None);
        assert!(matches!(
            service.transfer_key(KEY_ID, b"not a der document"),
            Err(TransferError::BadRequest(_))
        ));
    }
}
