// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module defines the storage collaborators of the key release protocol. The top-level
//! module defines the contracts as traits, and the sub-modules implement them in some useful
//! ways.
//!
//! Three collaborators exist:
//!
//! - a [KeyStore] holds the broker's *key records*: the identity of each transferable key,
//!   its algorithm, and the transfer policy that gates its release. Key records never
//!   contain key material.
//! - a [KeyManager] produces the *plaintext key material* for a key identity. In production
//!   this abstracts a KMIP appliance, a cloud vault or an HSM; the broker never talks to a
//!   specific backend directly and never persists the material it receives.
//! - a [PolicyStore] persists the administrator-authored [crate::policy::KeyTransferPolicy]
//!   records, consumed read-only during a transfer.
//!
//! The implementations provided here ([file], [local]) are deliberately simple and are
//! intended for development, testing and small local deployments; production deployments
//! are expected to implement these traits against their own storage services.

pub mod error;
pub mod file;
pub mod local;

use crate::policy::KeyTransferPolicy;

use serde::{Deserialize, Serialize};

/// Convenient result alias for this module, where errors are of type [error::KeyError].
pub type Result<T> = std::result::Result<T, error::KeyError>;

/// The algorithm of a stored key, which determines how the envelope frames the secret: AES
/// secrets travel as raw bytes, RSA and EC secrets as DER private-key documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    /// A symmetric AES key.
    Aes,

    /// An RSA private key.
    Rsa,

    /// An elliptic-curve private key.
    Ec,
}

/// A key record: everything the broker knows about a transferable key other than the key
/// material itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyRecord {
    /// The identity of the key, typically a UUID in string form.
    pub id: String,

    /// The algorithm of the stored key.
    pub algorithm: KeyAlgorithm,

    /// The identity of the [KeyTransferPolicy] that gates release of this key.
    pub transfer_policy_id: String,
}

/// This trait models the broker's key record store.
pub trait KeyStore {
    /// Looks up the record for the given key identity. Fails with
    /// [error::KeyError::KeyNotFound] when no such key exists.
    fn get(&self, key_id: &str) -> Result<KeyRecord>;
}

/// This trait models the backend that holds the actual key material. Only retrieval is
/// relevant to the broker; provisioning, rotation and deletion belong to the backend's own
/// administrative surface.
pub trait KeyManager {
    /// Obtains the plaintext material for the given key identity, along with its algorithm.
    ///
    /// The returned bytes are a raw symmetric key for AES keys, and a PEM- or DER-framed
    /// private-key document for RSA and EC keys.
    fn plaintext_key(&self, key_id: &str) -> Result<(KeyAlgorithm, Vec<u8>)>;
}

/// This trait models the store of administrator-authored key transfer policies.
pub trait PolicyStore {
    /// Looks up the policy with the given identity. Fails with
    /// [error::KeyError::PolicyNotFound] when no such policy exists.
    fn get(&self, policy_id: &str) -> Result<KeyTransferPolicy>;
}
