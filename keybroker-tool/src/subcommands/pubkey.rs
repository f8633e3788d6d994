// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! Re-encodes an RSA public wrapping key from a local file and writes it to the console as
//! base64-encoding of the ASN.1 SubjectPublicKeyInfo structure.

use crate::error::Result;
use crate::util;

use picky_asn1_x509::subject_public_key_info::SubjectPublicKeyInfo;
use picky_asn1_x509::RsaPublicKey;

use pkcs1::ToRsaPublicKey;

use structopt::StructOpt;

/// Models the options required by the pubkey command.
#[derive(Debug, StructOpt)]
pub struct PubKey {
    /// Path to the RSA public key to re-encode, in PKCS#1 PEM or DER format.
    #[structopt(short = "i", long = "in")]
    input_file: String,
}

impl PubKey {
    /// Reads the public key and writes it to standard output as a SubjectPublicKeyInfo
    /// structure in base64. (This format is used by default since it is directly compatible
    /// with the format expected by cloud-side key registration functions, meaning that the
    /// output of this command can be copied verbatim into any such function).
    pub fn run(&self) -> Result<()> {
        let public_key = util::read_rsa_public_key(&self.input_file)?;
        let public_key_der = public_key.to_pkcs1_der()?;
        let rsa_public_key: RsaPublicKey = picky_asn1_der::from_bytes(public_key_der.as_der())?;

        let subject_public_key_info = SubjectPublicKeyInfo::new_rsa_key(
            rsa_public_key.modulus,
            rsa_public_key.public_exponent,
        );

        let key_info_bytes = picky_asn1_der::to_vec(&subject_public_key_info)?;

        let public_key_base64 = base64::encode(key_info_bytes);

        // Print just the key data with no additional verbosity. This helps scripting clients
        // who just want the data to forward somewhere for key registration purposes.
        println!("{}", public_key_base64);

        Ok(())
    }
}
