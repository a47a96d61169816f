//! Authenticated encryption primitive.
//!
//! The rest of the crate encrypts and decrypts exclusively through
//! [`authenticated_encrypt`] and [`authenticated_decrypt`], selecting the
//! algorithm by its canonical name.
//!
//! Supported algorithms:
//! - **`aes-256-cbc-hmac-sha256`**: 64-byte key, AES-256-CBC with PKCS#7
//!   padding, then HMAC-SHA256 over IV and ciphertext (encrypt-then-MAC).
//! - **`aes-256-gcm`**: 32-byte key, 96-bit nonce, 128-bit tag.
//!
//! # Layout of returned bytes
//! ```text
//! aes-256-cbc-hmac-sha256: [ iv (16) ][ ciphertext ][ hmac (32) ]
//! aes-256-gcm:             [ nonce (12) ][ ciphertext + tag (16) ]
//! ```

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::aead::{self, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::hmac;

use crate::error::{PolicyVaultError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Canonical name of the envelope data-key algorithm.
pub const AES_256_CBC_HMAC_SHA256: &str = "aes-256-cbc-hmac-sha256";

/// Canonical name of the encapsulation content-key algorithm.
pub const AES_256_GCM_NAME: &str = "aes-256-gcm";

/// IV length for both algorithms as supplied by callers (128 bits).
pub const IV_LEN: usize = 16;

/// GCM nonce length (96 bits). Taken from the leading bytes of the IV.
pub const NONCE_LEN: usize = 12;

const CBC_HMAC_KEY_LEN: usize = 64;
const AES_KEY_LEN: usize = 32;
const MAC_LEN: usize = 32;
const BLOCK_LEN: usize = 16;

/// An authenticated encryption algorithm known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Aes256CbcHmacSha256,
    Aes256Gcm,
}

impl Algorithm {
    /// Resolve a canonical algorithm name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            AES_256_CBC_HMAC_SHA256 => Ok(Self::Aes256CbcHmacSha256),
            AES_256_GCM_NAME => Ok(Self::Aes256Gcm),
            other => Err(PolicyVaultError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Required key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            Self::Aes256CbcHmacSha256 => CBC_HMAC_KEY_LEN,
            Self::Aes256Gcm => AES_KEY_LEN,
        }
    }
}

/// Encrypt `plaintext` under `key` with the algorithm named `algorithm`.
///
/// `iv` must be at least [`IV_LEN`] bytes for CBC and [`NONCE_LEN`] for GCM.
/// The IV is bundled into the output and recovered during decryption.
pub fn authenticated_encrypt(
    algorithm: &str,
    plaintext: &[u8],
    key: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>> {
    let alg = Algorithm::from_name(algorithm)?;
    if key.len() != alg.key_len() {
        return Err(PolicyVaultError::InvalidKey);
    }
    match alg {
        Algorithm::Aes256CbcHmacSha256 => cbc_hmac_encrypt(key, plaintext, iv),
        Algorithm::Aes256Gcm => gcm_encrypt(key, plaintext, iv),
    }
}

/// Decrypt and authenticate `ciphertext` produced by
/// [`authenticated_encrypt`].
///
/// Wrong key, tampered bytes, and truncated input all fail with
/// [`PolicyVaultError::AuthenticationFailure`]. No partial plaintext is
/// ever returned.
pub fn authenticated_decrypt(algorithm: &str, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let alg = Algorithm::from_name(algorithm)?;
    if key.len() != alg.key_len() {
        return Err(PolicyVaultError::InvalidKey);
    }
    match alg {
        Algorithm::Aes256CbcHmacSha256 => cbc_hmac_decrypt(key, ciphertext),
        Algorithm::Aes256Gcm => gcm_decrypt(key, ciphertext),
    }
}

fn cbc_hmac_encrypt(key: &[u8], plaintext: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    let iv = iv.get(..IV_LEN).ok_or(PolicyVaultError::InvalidKey)?;
    let (enc_key, mac_key) = key.split_at(AES_KEY_LEN);

    let cipher = Aes256CbcEnc::new_from_slices(enc_key, iv)
        .map_err(|_| PolicyVaultError::InvalidKey)?;
    let body = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut output = Vec::with_capacity(IV_LEN + body.len() + MAC_LEN);
    output.extend_from_slice(iv);
    output.extend_from_slice(&body);

    let mac_key = hmac::Key::new(hmac::HMAC_SHA256, mac_key);
    let tag = hmac::sign(&mac_key, &output);
    output.extend_from_slice(tag.as_ref());
    Ok(output)
}

fn cbc_hmac_decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < IV_LEN + BLOCK_LEN + MAC_LEN {
        return Err(PolicyVaultError::AuthenticationFailure);
    }
    let (enc_key, mac_key) = key.split_at(AES_KEY_LEN);
    let (authenticated, tag) = ciphertext.split_at(ciphertext.len() - MAC_LEN);

    // MAC first: nothing is decrypted unless the whole input authenticates.
    let mac_key = hmac::Key::new(hmac::HMAC_SHA256, mac_key);
    hmac::verify(&mac_key, authenticated, tag)
        .map_err(|_| PolicyVaultError::AuthenticationFailure)?;

    let (iv, body) = authenticated.split_at(IV_LEN);
    if body.len() % BLOCK_LEN != 0 {
        return Err(PolicyVaultError::AuthenticationFailure);
    }
    let cipher = Aes256CbcDec::new_from_slices(enc_key, iv)
        .map_err(|_| PolicyVaultError::InvalidKey)?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .map_err(|_| PolicyVaultError::AuthenticationFailure)
}

fn gcm_encrypt(key: &[u8], plaintext: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    let nonce_bytes: [u8; NONCE_LEN] = iv
        .get(..NONCE_LEN)
        .and_then(|n| n.try_into().ok())
        .ok_or(PolicyVaultError::InvalidKey)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| PolicyVaultError::InvalidKey)?;
    let key = LessSafeKey::new(unbound);

    // Encrypts `body` in place and appends the GCM tag.
    let mut body = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut body)
        .map_err(|_| PolicyVaultError::AuthenticationFailure)?;

    let mut output = Vec::with_capacity(NONCE_LEN + body.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&body);
    Ok(output)
}

fn gcm_decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(PolicyVaultError::AuthenticationFailure);
    }
    let nonce_bytes: [u8; NONCE_LEN] = ciphertext[..NONCE_LEN]
        .try_into()
        .map_err(|_| PolicyVaultError::AuthenticationFailure)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| PolicyVaultError::InvalidKey)?;
    let key = LessSafeKey::new(unbound);

    let mut payload = ciphertext[NONCE_LEN..].to_vec();
    let plaintext = key
        .open_in_place(nonce, aead::Aad::empty(), &mut payload)
        .map_err(|_| PolicyVaultError::AuthenticationFailure)?;
    Ok(plaintext.to_vec())
}
