// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module provides the error definitions for the key, policy and key-material stores.

use thiserror::Error;

/// Specific error types for errors that can occur within the storage collaborators.
#[derive(Error, Debug)]
pub enum KeyError {
    /// Error emanating from standard I/O, such as a store file that cannot be opened.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Errors relating to JSON processing of store documents.
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// A stored key was not valid base64.
    #[error(transparent)]
    Base64DecodeError(#[from] base64::DecodeError),

    /// Error coming from the RSA crate, which can happen when local memory RSA key pairs
    /// are used as wrapping keys.
    #[error(transparent)]
    RsaError(#[from] rsa::errors::Error),

    /// Error coming from the PKCS1 crate, which can happen when local memory RSA key pairs
    /// are used as wrapping keys.
    #[error(transparent)]
    Pkcs1Error(#[from] pkcs1::Error),

    /// Errors coming from envelope processing in the local dev/test client.
    #[error(transparent)]
    EnvelopeError(#[from] crate::envelope::error::EnvelopeError),

    /// An attempt was made to obtain a key record or key material, but the store had no
    /// entry for the given identity.
    #[error("The requested key could not be found at the given key store.")]
    KeyNotFound,

    /// An attempt was made to obtain a transfer policy, but the store had no entry for the
    /// given identity.
    #[error("The requested transfer policy could not be found at the given policy store.")]
    PolicyNotFound,

    /// A store document does not conform to the required JSON format.
    #[error("The JSON format of the store document is incorrect.")]
    StoreBadFormat,
}
