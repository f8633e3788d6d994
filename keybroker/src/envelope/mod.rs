// Copyright 2023 Contributors to the Key Broker project.
// SPDX-License-Identifier: MIT

//! This module implements the envelope that carries a released key back to the client.
//!
//! The envelope has two layers. The secret itself is encrypted under a fresh 256-bit
//! symmetric wrapping key (SWK) with AES-256-GCM, and the SWK is in turn encrypted with
//! RSA-OAEP/SHA-256 under the public key the client proved possession of through its
//! attestation evidence. Only the client, holding the matching private key, can recover the
//! SWK and then the secret; the broker never learns the client's private key and the secret
//! never travels in the clear.
//!
//! The wire format of the symmetric layer is a fixed 12-byte metadata header of three
//! little-endian 32-bit values (nonce length, tag length, ciphertext length), followed by
//! the GCM nonce and then the ciphertext:
//!
//! `````text
//! uint32_le(ivLen) | uint32_le(16) | uint32_le(cipherLen) | nonce[ivLen] | ciphertext[cipherLen]
//! `````
//!
//! The ciphertext includes the GCM authentication tag appended by the AEAD. The tag-length
//! field always carries the literal 16 for wire compatibility; decryption never derives
//! behaviour from it, because the true tag length is implicit in the AEAD ciphertext.
//!
//! The header structure can be serialized and deserialized using
//! [bincode](https://crates.io/crates/bincode).
//!
//! A separate single-layer wrap ([wrap_direct]) exists for the legacy transfer path, where a
//! caller with an out-of-band-verified public key receives the secret under plain
//! RSA-OAEP/SHA-384 with no SWK layer.

pub mod error;
pub mod heldkey;

use crate::keys::KeyAlgorithm;
use self::error::EnvelopeError;

use pkcs8::PrivateKeyDocument;
use rand::rngs::OsRng;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use rsa::{PaddingScheme, PublicKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

/// Convenient result alias for this module, where errors are of type [error::EnvelopeError].
pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// The length, in bytes, of the symmetric wrapping key (AES-256).
pub const SWK_LENGTH: usize = 32;

/// The length, in bytes, of the AES-GCM nonce.
pub const GCM_NONCE_LENGTH: usize = 12;

/// The literal value carried in the header's tag-length field. Fixed for wire compatibility;
/// never used to drive decryption.
pub const TAG_LENGTH_FIELD: u32 = 16;

/// The fixed metadata header at the front of a wrapped key. Three 32-bit integer values in
/// little-endian order: the nonce length, the tag length (always the literal 16), and the
/// ciphertext length (which includes the appended authentication tag).
///
/// This structure can be serialized and deserialized using
/// [bincode](https://crates.io/crates/bincode).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Length, in bytes, of the GCM nonce that follows the header.
    pub iv_length: u32,

    /// Tag-length field. Always 16 on the wire.
    pub tag_length: u32,

    /// Length, in bytes, of the ciphertext (including the appended tag) that follows the
    /// nonce.
    pub cipher_length: u32,
}

impl EnvelopeHeader {
    /// The encoded size of the header, in bytes.
    pub const SIZE: usize = 12;

    /// Decodes a header from the first [EnvelopeHeader::SIZE] bytes of a wrapped key.
    pub fn parse(bytes: &[u8]) -> Result<EnvelopeHeader> {
        if bytes.len() < EnvelopeHeader::SIZE {
            return Err(EnvelopeError::TruncatedEnvelope);
        }
        let header: EnvelopeHeader = bincode::deserialize(&bytes[..EnvelopeHeader::SIZE])?;
        Ok(header)
    }
}

/// The two artifacts produced by a full envelope wrap: the symmetric-layer envelope and the
/// RSA-wrapped SWK. Both are raw byte vectors; transport encodings (base64 in JSON bodies)
/// are applied by the transfer layer.
#[derive(Debug)]
pub struct WrappedEnvelope {
    /// `header | nonce | ciphertext`, with the ciphertext carrying the appended GCM tag.
    pub wrapped_key: Vec<u8>,

    /// The SWK under RSA-OAEP/SHA-256, sized to the client's RSA modulus.
    pub wrapped_swk: Vec<u8>,
}

/// Wraps a secret for release to the holder of `recipient`.
///
/// A fresh SWK and a fresh GCM nonce are drawn from the system CSPRNG on every call; neither
/// is ever reused across requests, even for identical inputs. AES secrets are wrapped as
/// their raw bytes; RSA and EC secrets are first re-framed into their DER private-key
/// document (see [normalize_secret]).
pub fn wrap(
    algorithm: KeyAlgorithm,
    secret: &[u8],
    recipient: &RsaPublicKey,
) -> Result<WrappedEnvelope> {
    let rand = SystemRandom::new();

    let mut swk = [0u8; SWK_LENGTH];
    rand.fill(&mut swk)?;
    let mut nonce_bytes = [0u8; GCM_NONCE_LENGTH];
    rand.fill(&mut nonce_bytes)?;

    let mut in_out = normalize_secret(algorithm, secret)?;

    let unbound_key = UnboundKey::new(&AES_256_GCM, &swk)?;
    let sealing_key = LessSafeKey::new(unbound_key);
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);
    sealing_key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)?;

    let header = EnvelopeHeader {
        iv_length: GCM_NONCE_LENGTH as u32,
        tag_length: TAG_LENGTH_FIELD,
        cipher_length: in_out.len() as u32,
    };

    let mut wrapped_key = bincode::serialize(&header)?;
    wrapped_key.extend_from_slice(&nonce_bytes);
    wrapped_key.append(&mut in_out);

    let padding = PaddingScheme::new_oaep::<sha2::Sha256>();
    let mut rng = OsRng;
    let wrapped_swk = recipient.encrypt(&mut rng, padding, &swk)?;

    Ok(WrappedEnvelope {
        wrapped_key,
        wrapped_swk,
    })
}

/// Wraps a secret directly under RSA-OAEP/SHA-384 with no SWK layer, for the legacy
/// transfer path.
///
/// The secret travels as stored, without DER re-framing. The OAEP message limit makes this
/// path suitable for symmetric secrets; a secret larger than the recipient modulus allows
/// fails with an RSA error.
pub fn wrap_direct(secret: &[u8], recipient: &RsaPublicKey) -> Result<Vec<u8>> {
    let padding = PaddingScheme::new_oaep::<sha2::Sha384>();
    let mut rng = OsRng;
    Ok(recipient.encrypt(&mut rng, padding, secret)?)
}

/// Opens the symmetric layer of an envelope with an already-recovered SWK, returning the
/// original secret bytes.
///
/// This is the client-side half of the exchange; the broker itself never unwraps. It is used
/// by dev/test clients and by tests to prove the round trip. The nonce and ciphertext are
/// located with the lengths declared in the metadata header; the tag-length field is ignored.
pub fn open(wrapped_key: &[u8], swk: &[u8]) -> Result<Vec<u8>> {
    let header = EnvelopeHeader::parse(wrapped_key)?;
    let iv_length = header.iv_length as usize;
    let cipher_length = header.cipher_length as usize;

    if wrapped_key.len() != EnvelopeHeader::SIZE + iv_length + cipher_length {
        return Err(EnvelopeError::TruncatedEnvelope);
    }

    let nonce_bytes = &wrapped_key[EnvelopeHeader::SIZE..EnvelopeHeader::SIZE + iv_length];
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)?;

    let unbound_key = UnboundKey::new(&AES_256_GCM, swk)?;
    let opening_key = LessSafeKey::new(unbound_key);

    let mut in_out = wrapped_key[EnvelopeHeader::SIZE + iv_length..].to_vec();
    let plaintext_length = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)?
        .len();
    in_out.truncate(plaintext_length);
    Ok(in_out)
}

/// Normalizes a secret for framing inside the envelope.
///
/// AES secrets are used as raw bytes. RSA and EC secrets are carried as the DER encoding of
/// their PKCS#8 private-key document: a PEM-framed secret is converted to the inner DER
/// document, and a secret that is already DER is validated and passed through.
fn normalize_secret(algorithm: KeyAlgorithm, secret: &[u8]) -> Result<Vec<u8>> {
    match algorithm {
        KeyAlgorithm::Aes => Ok(secret.to_vec()),
        KeyAlgorithm::Rsa | KeyAlgorithm::Ec => {
            if secret.starts_with(b"-----BEGIN") {
                let pem = std::str::from_utf8(secret)
                    .map_err(|_| EnvelopeError::MalformedPrivateKey)?;
                let document = PrivateKeyDocument::from_pem(pem.trim())?;
                Ok(document.as_ref().to_vec())
            } else {
                // Validate that the bytes really are a private-key document before passing
                // them through unchanged.
                PrivateKeyDocument::from_der(secret)?;
                Ok(secret.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::ToPrivateKey;
    use rsa::{RsaPrivateKey, RsaPublicKey};

    // A structurally valid PKCS#8 document carrying an EC (P-256) private key, assembled
    // byte by byte so the test is independent of any key-generation facility.
    fn ec_private_key_der() -> Vec<u8> {
        let mut der = vec![
            0x30, 0x3a, // PrivateKeyInfo SEQUENCE
            0x02, 0x01, 0x00, // version 0
            0x30, 0x13, // AlgorithmIdentifier SEQUENCE
            0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, // id-ecPublicKey
            0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, // prime256v1
            0x04, 0x20, // privateKey OCTET STRING (32)
        ];
        der.extend((1..=32).map(|b| b as u8));
        der
    }

    fn pem_encode(label: &str, der: &[u8]) -> String {
        let body = base64::encode(der);
        let mut pem = format!("-----BEGIN {}-----\n", label);
        for chunk in body.as_bytes().chunks(64) {
            pem.push_str(std::str::from_utf8(chunk).unwrap());
            pem.push('\n');
        }
        pem.push_str(&format!("-----END {}-----\n", label));
        pem
    }

    fn recipient_pair() -> (RsaPrivateKey, RsaPublicKey) {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    fn recover_swk(private: &RsaPrivateKey, wrapped_swk: &[u8]) -> Vec<u8> {
        private
            .decrypt(PaddingScheme::new_oaep::<sha2::Sha256>(), wrapped_swk)
            .unwrap()
    }

    #[test]
    fn test_aes_secret_round_trip() {
        let (private, public) = recipient_pair();
        let secret: Vec<u8> = (0..32).collect();

        let envelope = wrap(KeyAlgorithm::Aes, &secret, &public).unwrap();
        let swk = recover_swk(&private, &envelope.wrapped_swk);
        let recovered = open(&envelope.wrapped_key, &swk).unwrap();

        assert_eq!(recovered, secret);
    }

    #[test]
    fn test_header_byte_layout() {
        let (_, public) = recipient_pair();
        let secret = [0x42u8; 24];

        let envelope = wrap(KeyAlgorithm::Aes, &secret, &public).unwrap();
        let wrapped = &envelope.wrapped_key;

        // Three little-endian u32 values: nonce length, literal 16, ciphertext length
        // (payload plus 16-byte tag).
        assert_eq!(&wrapped[0..4], &12u32.to_le_bytes());
        assert_eq!(&wrapped[4..8], &16u32.to_le_bytes());
        assert_eq!(&wrapped[8..12], &(24u32 + 16).to_le_bytes());
        assert_eq!(wrapped.len(), 12 + 12 + 24 + 16);

        let header = EnvelopeHeader::parse(wrapped).unwrap();
        assert_eq!(header.iv_length, 12);
        assert_eq!(header.tag_length, TAG_LENGTH_FIELD);
        assert_eq!(header.cipher_length, 40);
    }

    #[test]
    fn test_rsa_secret_is_reframed_to_der() {
        let (private, public) = recipient_pair();

        // The "stored" secret is a PEM-framed RSA private key; the envelope must carry the
        // inner DER document.
        let secret_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let secret_pem = secret_key.to_pkcs8_pem().unwrap();
        let expected_der = secret_key.to_pkcs8_der().unwrap().as_ref().to_vec();

        let envelope = wrap(KeyAlgorithm::Rsa, secret_pem.as_bytes(), &public).unwrap();
        let swk = recover_swk(&private, &envelope.wrapped_swk);
        let recovered = open(&envelope.wrapped_key, &swk).unwrap();

        assert_eq!(recovered, expected_der);
    }

    #[test]
    fn test_ec_secret_is_reframed_to_der() {
        let (private, public) = recipient_pair();

        let der = ec_private_key_der();
        let pem = pem_encode("PRIVATE KEY", &der);

        let envelope = wrap(KeyAlgorithm::Ec, pem.as_bytes(), &public).unwrap();
        let swk = recover_swk(&private, &envelope.wrapped_swk);
        let recovered = open(&envelope.wrapped_key, &swk).unwrap();

        assert_eq!(recovered, der);
    }

    #[test]
    fn test_der_secret_passes_through_unchanged() {
        let (private, public) = recipient_pair();

        let der = ec_private_key_der();
        let envelope = wrap(KeyAlgorithm::Ec, &der, &public).unwrap();
        let swk = recover_swk(&private, &envelope.wrapped_swk);
        let recovered = open(&envelope.wrapped_key, &swk).unwrap();

        assert_eq!(recovered, der);
    }

    #[test]
    fn test_wrap_never_reuses_swk_or_nonce() {
        let (private, public) = recipient_pair();
        let secret = [0x07u8; 32];

        let first = wrap(KeyAlgorithm::Aes, &secret, &public).unwrap();
        let second = wrap(KeyAlgorithm::Aes, &secret, &public).unwrap();

        let first_nonce = &first.wrapped_key[12..24];
        let second_nonce = &second.wrapped_key[12..24];
        assert_ne!(first_nonce, second_nonce);

        let first_swk = recover_swk(&private, &first.wrapped_swk);
        let second_swk = recover_swk(&private, &second.wrapped_swk);
        assert_ne!(first_swk, second_swk);
    }

    #[test]
    fn test_direct_wrap_round_trip() {
        let (private, public) = recipient_pair();
        let secret = [0x5au8; 32];

        let wrapped = wrap_direct(&secret, &public).unwrap();
        let recovered = private
            .decrypt(PaddingScheme::new_oaep::<sha2::Sha384>(), &wrapped)
            .unwrap();

        assert_eq!(recovered, secret);
    }

    #[test]
    fn test_open_rejects_inconsistent_length() {
        let (private, public) = recipient_pair();
        let secret = [0x01u8; 16];

        let envelope = wrap(KeyAlgorithm::Aes, &secret, &public).unwrap();
        let swk = recover_swk(&private, &envelope.wrapped_swk);

        let mut truncated = envelope.wrapped_key.clone();
        truncated.pop();
        assert!(matches!(
            open(&truncated, &swk),
            Err(EnvelopeError::TruncatedEnvelope)
        ));
    }

    #[test]
    fn test_open_rejects_tampered_ciphertext() {
        let (private, public) = recipient_pair();
        let secret = [0x01u8; 16];

        let envelope = wrap(KeyAlgorithm::Aes, &secret, &public).unwrap();
        let swk = recover_swk(&private, &envelope.wrapped_swk);

        let mut tampered = envelope.wrapped_key.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert!(matches!(
            open(&tampered, &swk),
            Err(EnvelopeError::CryptoError(_))
        ));
    }
}
