// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! General-purpose utilities used throughout the keybroker-tool crate.

use crate::error::{Error, Result, ToolErrorKind};

use pkcs1::FromRsaPublicKey;
use rsa::RsaPublicKey;

/// Utility to get a string value either from a command-line option or a named environment
/// variable.
pub fn get_config_from_command_or_env(
    config_option: &Option<String>,
    env_var_name: &str,
    purpose: &str,
) -> Result<String> {
    if let Some(option) = config_option {
        return Ok(option.clone());
    }
    match std::env::var(env_var_name) {
        Ok(value) => Ok(value),
        Err(_) => {
            // The option hasn't been specified on the command-line or in the environment.
            println!(
                "No {} specified. Please specify on the command-line or by setting the `{}` environment variable.",
                purpose, env_var_name
            );
            Err(Error::ToolError(ToolErrorKind::MissingConfiguration))
        }
    }
}

/// Reads an RSA public key from a file holding either a PKCS#1 PEM document or a PKCS#1 DER
/// document.
pub fn read_rsa_public_key(file_path: &str) -> Result<RsaPublicKey> {
    let bytes = std::fs::read(file_path)?;
    if bytes.starts_with(b"-----BEGIN") {
        let pem = std::str::from_utf8(&bytes)
            .map_err(|_| Error::ToolError(ToolErrorKind::UnsupportedPublicKeyFormat))?;
        Ok(RsaPublicKey::from_pkcs1_pem(pem.trim())?)
    } else {
        Ok(RsaPublicKey::from_pkcs1_der(&bytes)?)
    }
}
