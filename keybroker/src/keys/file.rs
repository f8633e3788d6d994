// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module implements simple file-based key and policy stores. The purpose of these
//! stores is mainly to allow the broker to be developed and tested in the absence of any
//! KMIP appliance, cloud vault or database service. In production environments, key material
//! would almost certainly live in a managed backend instead. This option is mainly for
//! convenience in testing small, local deployments of the broker.

use crate::keys::error::KeyError;
use crate::policy::KeyTransferPolicy;

use super::{KeyAlgorithm, KeyManager, KeyRecord, KeyStore, PolicyStore, Result};

use serde::Deserialize;

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

/// One entry in a key store document: the record fields plus the base64-encoded key
/// material. Holding material and record in one document is acceptable only because this
/// store is a dev/test convenience.
#[derive(Clone, Debug, Deserialize)]
struct KeyEntry {
    algorithm: KeyAlgorithm,
    transfer_policy_id: String,
    key: String,
}

/// This structure implements both the key record store and the key manager on top of a
/// single JSON file on the local filesystem.
///
/// The file is a map of key identifiers to entries carrying the algorithm, the transfer
/// policy identity and the base64-encoded key material:
///
/// `````text
/// {
///     "5d286b7e-ff68-4b4b-b7b8-05f55dbfd0c7": {
///         "algorithm": "aes",
///         "transfer_policy_id": "9f7d1b3c-0a52-4c2e-8b51-7e2b9a1f7c11",
///         "key": "QfTjWnZr4u7x!A%D*G-KaPdRgUkXp2s5"
///     }
/// }
/// `````
///
/// File key stores are immutable. The contents need to have been created separately by an
/// admin; the broker is not able to add, remove or modify keys within the store.
pub struct FileKeyStore {
    map: HashMap<String, KeyEntry>,
}

impl FileKeyStore {
    /// Makes a [FileKeyStore] from the given file path. The given path should be a path to
    /// a file that exists and can be opened on the local file system, containing valid JSON
    /// in the format described for [FileKeyStore].
    pub fn from_file_path(file_path: &str) -> Result<FileKeyStore> {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);
        let root: serde_json::Value = serde_json::from_reader(reader)?;
        FileKeyStore::from_value(root)
    }

    /// Makes a [FileKeyStore] from an in-memory JSON document in the same format.
    pub fn from_json(document: &str) -> Result<FileKeyStore> {
        let root: serde_json::Value = serde_json::from_str(document)?;
        FileKeyStore::from_value(root)
    }

    fn from_value(root: serde_json::Value) -> Result<FileKeyStore> {
        let object = root.as_object().ok_or(KeyError::StoreBadFormat)?;
        let mut map = HashMap::with_capacity(object.len());
        for (id, entry) in object {
            let entry: KeyEntry =
                serde_json::from_value(entry.clone()).map_err(|_| KeyError::StoreBadFormat)?;
            map.insert(id.clone(), entry);
        }
        Ok(FileKeyStore { map })
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, key_id: &str) -> Result<KeyRecord> {
        let entry = self.map.get(key_id).ok_or(KeyError::KeyNotFound)?;
        Ok(KeyRecord {
            id: key_id.to_string(),
            algorithm: entry.algorithm,
            transfer_policy_id: entry.transfer_policy_id.clone(),
        })
    }
}

impl KeyManager for FileKeyStore {
    fn plaintext_key(&self, key_id: &str) -> Result<(KeyAlgorithm, Vec<u8>)> {
        let entry = self.map.get(key_id).ok_or(KeyError::KeyNotFound)?;
        let material = base64::decode(&entry.key)?;
        Ok((entry.algorithm, material))
    }
}

/// This structure implements a policy store on top of a JSON file holding an array of
/// [KeyTransferPolicy] documents. Like [FileKeyStore], it is immutable and intended for
/// dev/test use.
pub struct FilePolicyStore {
    map: HashMap<String, KeyTransferPolicy>,
}

impl FilePolicyStore {
    /// Makes a [FilePolicyStore] from the given file path.
    pub fn from_file_path(file_path: &str) -> Result<FilePolicyStore> {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);
        let policies: Vec<KeyTransferPolicy> =
            serde_json::from_reader(reader).map_err(|_| KeyError::StoreBadFormat)?;
        Ok(FilePolicyStore::from_policies(policies))
    }

    /// Makes a [FilePolicyStore] from an in-memory JSON array of policy documents.
    pub fn from_json(document: &str) -> Result<FilePolicyStore> {
        let policies: Vec<KeyTransferPolicy> =
            serde_json::from_str(document).map_err(|_| KeyError::StoreBadFormat)?;
        Ok(FilePolicyStore::from_policies(policies))
    }

    /// Makes a [FilePolicyStore] directly from already-parsed policies, which is convenient
    /// for tests.
    pub fn from_policies(policies: Vec<KeyTransferPolicy>) -> FilePolicyStore {
        let map = policies
            .into_iter()
            .map(|policy| (policy.id.clone(), policy))
            .collect();
        FilePolicyStore { map }
    }
}

impl PolicyStore for FilePolicyStore {
    fn get(&self, policy_id: &str) -> Result<KeyTransferPolicy> {
        self.map
            .get(policy_id)
            .cloned()
            .ok_or(KeyError::PolicyNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_DOCUMENT: &str = r#"{
        "key-1": {
            "algorithm": "aes",
            "transfer_policy_id": "policy-1",
            "key": "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8="
        }
    }"#;

    const POLICY_DOCUMENT: &str = r#"[
        {
            "id": "policy-1",
            "created_at": "2023-04-01T12:00:00Z",
            "attestation_type": ["SGX"],
            "sgx": {
                "attributes": {
                    "mrsigner": ["aa"],
                    "isvprodid": [1]
                }
            }
        }
    ]"#;

    #[test]
    fn test_key_store_lookup() {
        let store = FileKeyStore::from_json(KEY_DOCUMENT).unwrap();
        let record = store.get("key-1").unwrap();
        assert_eq!(record.algorithm, KeyAlgorithm::Aes);
        assert_eq!(record.transfer_policy_id, "policy-1");

        let (algorithm, material) = store.plaintext_key("key-1").unwrap();
        assert_eq!(algorithm, KeyAlgorithm::Aes);
        assert_eq!(material, (0u8..32).collect::<Vec<u8>>());
    }

    #[test]
    fn test_key_store_missing_key() {
        let store = FileKeyStore::from_json(KEY_DOCUMENT).unwrap();
        assert!(matches!(store.get("absent"), Err(KeyError::KeyNotFound)));
        assert!(matches!(
            store.plaintext_key("absent"),
            Err(KeyError::KeyNotFound)
        ));
    }

    #[test]
    fn test_key_store_rejects_malformed_document() {
        assert!(matches!(
            FileKeyStore::from_json("[1, 2, 3]"),
            Err(KeyError::StoreBadFormat)
        ));
        assert!(matches!(
            FileKeyStore::from_json(r#"{"key-1": {"algorithm": "aes"}}"#),
            Err(KeyError::StoreBadFormat)
        ));
    }

    #[test]
    fn test_policy_store_lookup() {
        let store = FilePolicyStore::from_json(POLICY_DOCUMENT).unwrap();
        let policy = store.get("policy-1").unwrap();
        assert_eq!(policy.id, "policy-1");
        assert!(matches!(
            store.get("absent"),
            Err(KeyError::PolicyNotFound)
        ));
    }
}
