// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! The keybroker crate implements an attestation-gated key release protocol for confidential
//! computing workloads. A secret key held by the broker is only released to a client that can
//! prove, via a hardware-rooted attestation token, that it is running inside an approved
//! enclave or trust-domain configuration, and the key is never sent in the clear: it travels
//! inside a single-use envelope bound to a wrapping key supplied by the workload itself.
//!
//! The crate is organised around the stages of the release protocol:
//!
//! - [`policy`] defines the administrator-authored key transfer policies and the claim
//!   matcher that decides whether a set of attestation claims satisfies a policy.
//! - [`attest`] defines the attestation token claims and the trait seams for the external
//!   attestation service and token verifier.
//! - [`envelope`] produces the two-layer wrapped key material that is returned to a client.
//! - [`transfer`] drives the evidence exchange: nonce issuance, token acquisition, claim
//!   validation and, finally, envelope wrapping.
//! - [`keys`] defines the trait seams for the key and policy stores, together with simple
//!   file-backed and in-memory implementations for development and testing.
//!
//! Persistence backends, JWT signature verification, HTTP routing and TLS are all outside
//! this crate; they plug in through the traits in [`keys`] and [`attest`].

pub mod attest;
pub mod envelope;
pub mod keys;
pub mod policy;
pub mod transfer;
