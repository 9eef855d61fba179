// Handshake key derivation and session-token sealing
//
// Pure functions of their inputs; everything here is reproducible offline
// given the same password, salt, rounds and nonces.
use aes_gcm::aead::AeadInPlace;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::generic_array::typenum::U16;
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, KeyInit};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::application::ports::AuthError;

type HmacSha256 = Hmac<Sha256>;

// The device hands out a 16-byte IV, not the usual 12-byte GCM nonce.
type TokenCipher = AesGcm<Aes256, U16>;

pub const USER_TYPE: &str = "user";

/// 12 random bytes from the OS generator, base64 encoded.
pub fn client_nonce() -> String {
    let mut nonce = [0u8; 12];
    OsRng.fill_bytes(&mut nonce);
    BASE64.encode(nonce)
}

/// The literal challenge string both sides sign. The server nonce appears
/// twice; the device's signature check depends on the exact layout.
pub fn auth_message(client_nonce: &str, server_nonce: &str, salt_b64: &str, rounds: u32) -> String {
    format!(
        "n={USER_TYPE},r={client_nonce},r={server_nonce},s={salt_b64},i={rounds},c=biws,r={server_nonce}"
    )
}

fn hmac_sha256(key: &[u8], chunks: &[&[u8]]) -> Result<[u8; 32], AuthError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| AuthError::Crypto("hmac key"))?;
    for chunk in chunks {
        mac.update(chunk);
    }
    Ok(mac.finalize().into_bytes().into())
}

fn salted_password(password: &str, salt: &[u8], rounds: u32) -> [u8; 32] {
    let mut salted = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut salted);
    salted
}

/// Key material derived from the password and the server's salt/rounds.
pub struct HandshakeKeys {
    client_key: [u8; 32],
    server_key: [u8; 32],
    stored_key: [u8; 32],
}

impl HandshakeKeys {
    pub fn derive(password: &str, salt: &[u8], rounds: u32) -> Result<Self, AuthError> {
        let salted = salted_password(password, salt, rounds);
        let client_key = hmac_sha256(&salted, &[b"Client Key"])?;
        let server_key = hmac_sha256(&salted, &[b"Server Key"])?;
        let stored_key: [u8; 32] = Sha256::digest(client_key).into();
        Ok(Self {
            client_key,
            server_key,
            stored_key,
        })
    }

    pub fn client_signature(&self, auth_message: &str) -> Result<[u8; 32], AuthError> {
        hmac_sha256(&self.stored_key, &[auth_message.as_bytes()])
    }

    pub fn server_signature(&self, auth_message: &str) -> Result<[u8; 32], AuthError> {
        hmac_sha256(&self.server_key, &[auth_message.as_bytes()])
    }

    /// base64(clientSignature XOR clientKey). This device pairs the client
    /// signature with the client key; keep the operands exactly so.
    pub fn client_proof(&self, auth_message: &str) -> Result<String, AuthError> {
        let signature = self.client_signature(auth_message)?;
        let mut proof = [0u8; 32];
        for (i, byte) in proof.iter_mut().enumerate() {
            *byte = signature[i] ^ self.client_key[i];
        }
        Ok(BASE64.encode(proof))
    }

    /// Byte-for-byte check of the signature returned by auth/finish.
    pub fn verify_server_signature(
        &self,
        auth_message: &str,
        signature: &[u8],
    ) -> Result<(), AuthError> {
        if self.server_signature(auth_message)?.as_slice() == signature {
            Ok(())
        } else {
            Err(AuthError::SignatureMismatch)
        }
    }

    /// HMAC keyed with the stored key over three chunks: the literal
    /// "Session Key", the auth message, then the client key.
    pub fn protocol_key(&self, auth_message: &str) -> Result<[u8; 32], AuthError> {
        hmac_sha256(
            &self.stored_key,
            &[b"Session Key", auth_message.as_bytes(), &self.client_key],
        )
    }
}

/// Session token encrypted for transport, all parts base64 encoded.
pub struct SealedToken {
    pub iv: String,
    pub tag: String,
    pub payload: String,
}

/// AES-256-GCM under the protocol key with a fresh random 16-byte IV;
/// ciphertext and the 128-bit tag travel separately.
pub fn seal_token(protocol_key: &[u8; 32], token: &str) -> Result<SealedToken, AuthError> {
    let mut iv = [0u8; 16];
    OsRng.fill_bytes(&mut iv);
    seal_token_with_iv(protocol_key, token, &iv)
}

fn seal_token_with_iv(
    protocol_key: &[u8; 32],
    token: &str,
    iv: &[u8; 16],
) -> Result<SealedToken, AuthError> {
    let cipher = TokenCipher::new(GenericArray::from_slice(protocol_key));
    let mut buffer = token.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(iv), b"", &mut buffer)
        .map_err(|_| AuthError::Crypto("aes-gcm seal"))?;
    Ok(SealedToken {
        iv: BASE64.encode(iv),
        tag: BASE64.encode(tag),
        payload: BASE64.encode(buffer),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pbkdf2_published_vectors() {
        assert_eq!(
            salted_password("password", b"salt", 1).to_vec(),
            hex::decode("120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b")
                .unwrap()
        );
        assert_eq!(
            salted_password("password", b"salt", 4096).to_vec(),
            hex::decode("c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a")
                .unwrap()
        );
    }

    #[test]
    fn test_hmac_published_vector() {
        // RFC 4231 test case 2
        let mac = hmac_sha256(b"Jefe", &[b"what do ya want for nothing?"]).unwrap();
        assert_eq!(
            mac.to_vec(),
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .unwrap()
        );
    }

    #[test]
    fn test_hmac_chunking_matches_concatenation() {
        let chunked = hmac_sha256(b"key", &[b"Session Key", b"message", b"client"]).unwrap();
        let joined = hmac_sha256(b"key", &[b"Session Keymessageclient"]).unwrap();
        assert_eq!(chunked, joined);
    }

    #[test]
    fn test_auth_message_layout() {
        let message = auth_message("CN", "SN", "U0FMVA==", 12000);
        assert_eq!(message, "n=user,r=CN,r=SN,s=U0FMVA==,i=12000,c=biws,r=SN");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let message = auth_message("cnonce", "snonce", "c2FsdA==", 4096);
        let first = HandshakeKeys::derive("password", b"salt", 4096).unwrap();
        let second = HandshakeKeys::derive("password", b"salt", 4096).unwrap();

        assert_eq!(first.client_key, second.client_key);
        assert_eq!(first.server_key, second.server_key);
        assert_eq!(first.stored_key, second.stored_key);
        assert_eq!(
            first.client_proof(&message).unwrap(),
            second.client_proof(&message).unwrap()
        );
    }

    #[test]
    fn test_client_proof_xors_signature_with_client_key() {
        let message = auth_message("cnonce", "snonce", "c2FsdA==", 4096);
        let keys = HandshakeKeys::derive("password", b"salt", 4096).unwrap();

        let proof = BASE64.decode(keys.client_proof(&message).unwrap()).unwrap();
        let signature = keys.client_signature(&message).unwrap();
        let recovered: Vec<u8> = proof
            .iter()
            .zip(signature.iter())
            .map(|(p, s)| p ^ s)
            .collect();

        assert_eq!(recovered, keys.client_key.to_vec());
    }

    #[test]
    fn test_server_signature_verification() {
        let message = auth_message("cnonce", "snonce", "c2FsdA==", 4096);
        let keys = HandshakeKeys::derive("password", b"salt", 4096).unwrap();

        let good = keys.server_signature(&message).unwrap();
        assert!(keys.verify_server_signature(&message, &good).is_ok());

        let mut tampered = good;
        tampered[0] ^= 0x01;
        assert!(matches!(
            keys.verify_server_signature(&message, &tampered),
            Err(AuthError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_seal_and_open_round_trip() {
        let key = [7u8; 32];
        let iv = [9u8; 16];
        let sealed = seal_token_with_iv(&key, "very-secret-token", &iv).unwrap();

        let cipher = TokenCipher::new(GenericArray::from_slice(&key));
        let mut buffer = BASE64.decode(&sealed.payload).unwrap();
        let tag = BASE64.decode(&sealed.tag).unwrap();
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(&iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .unwrap();

        assert_eq!(buffer, b"very-secret-token");
    }

    #[test]
    fn test_tampered_tag_fails_open() {
        let key = [7u8; 32];
        let iv = [9u8; 16];
        let sealed = seal_token_with_iv(&key, "very-secret-token", &iv).unwrap();

        let cipher = TokenCipher::new(GenericArray::from_slice(&key));
        let mut buffer = BASE64.decode(&sealed.payload).unwrap();
        let mut tag = BASE64.decode(&sealed.tag).unwrap();
        tag[0] ^= 0x80;

        assert!(
            cipher
                .decrypt_in_place_detached(
                    GenericArray::from_slice(&iv),
                    b"",
                    &mut buffer,
                    GenericArray::from_slice(&tag),
                )
                .is_err()
        );
    }

    #[test]
    fn test_client_nonce_is_twelve_bytes() {
        let nonce = client_nonce();
        assert_eq!(BASE64.decode(&nonce).unwrap().len(), 12);
    }

    #[test]
    fn test_seal_uses_fresh_ivs() {
        let key = [3u8; 32];
        let first = seal_token(&key, "token").unwrap();
        let second = seal_token(&key, "token").unwrap();
        assert_ne!(first.iv, second.iv);
    }
}
