// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module implements the [AttestationService] contract in terms of an HTTP/REST
//! attestation service, enabling the broker to obtain nonces and appraise quotes against a
//! hosted verification endpoint.
//!
//! The wire contract implemented here is the nonce/appraisal API used by hosted attestation
//! verification services: `GET {base}/appraisal/v1/nonce` and `POST {base}/appraisal/v1/attest`,
//! authenticated with an API key header. Other service styles can be supported by providing
//! further implementations of the [AttestationService] trait.

use super::error::AttestError;
use super::{AttestationService, Evidence, Result, VerifierNonce};

use serde::{Deserialize, Serialize};

const NONCE_PATH: &str = "appraisal/v1/nonce";
const ATTEST_PATH: &str = "appraisal/v1/attest";
const API_KEY_HEADER: &str = "x-api-key";

/// The request body for the appraisal endpoint. The quote and runtime data travel exactly as
/// the client supplied them; the broker adds the policy identifiers extracted from the key's
/// transfer policy so that the service can evaluate them server-side.
#[derive(Debug, Serialize)]
struct AppraisalRequest<'a> {
    quote: &'a str,
    verifier_nonce: &'a VerifierNonce,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime_data: Option<&'a str>,
    policy_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    event_log: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AppraisalResponse {
    token: String,
}

/// An [AttestationService] implementation backed by a remote HTTP appraisal service.
pub struct AttestationServiceClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl AttestationServiceClient {
    /// Creates a client for the attestation service at the given base URL, authenticating
    /// with the given API key. Any trailing slash on the base URL is tolerated.
    pub fn new(base_url: &str, api_key: &str) -> Result<AttestationServiceClient> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(AttestationServiceClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl AttestationService for AttestationServiceClient {
    fn nonce(&self) -> Result<VerifierNonce> {
        let response = self
            .client
            .get(&self.url(NONCE_PATH))
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;

        if !response.status().is_success() {
            return Err(AttestError::ServiceFailure(response.status().as_u16()));
        }

        Ok(response.json::<VerifierNonce>()?)
    }

    fn attestation_token(&self, evidence: &Evidence, policy_ids: &[String]) -> Result<String> {
        let request = AppraisalRequest {
            quote: &evidence.quote,
            verifier_nonce: &evidence.verifier_nonce,
            runtime_data: evidence.user_data.as_deref(),
            policy_ids,
            event_log: evidence.event_log.as_deref(),
        };

        let response = self
            .client
            .post(&self.url(ATTEST_PATH))
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            return Err(AttestError::ServiceFailure(response.status().as_u16()));
        }

        Ok(response.json::<AppraisalResponse>()?.token)
    }
}
