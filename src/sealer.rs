//! Passcode sealing of JSON payloads using PBKDF2-HMAC-SHA256 + AES-256-GCM
//!
//! This module implements the payload sealer:
//! - PBKDF2-HMAC-SHA256 derives a 256-bit key from the passcode and a
//!   random salt
//! - AES-256-GCM encrypts the JSON-serialized payload under a random nonce
//!
//! The derived key never leaves this module. Only the salt, nonce and
//! ciphertext (tag included) end up in the [`SealedPayload`].

use crate::error::{ErrorCategory, ErrorKind, Result, ShareLinkError};
use crate::format::{FormatVersion, KEY_LEN, SealedPayload};
use crate::random::{OsRandom, RandomSource};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Derive a 32-byte key from a passcode and salt using the current format's
/// PBKDF2 parameters.
pub fn derive_key(passcode: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    derive_key_for(FormatVersion::CURRENT, passcode, salt)
}

fn derive_key_for(
    version: FormatVersion,
    passcode: &str,
    salt: &[u8],
) -> Zeroizing<[u8; KEY_LEN]> {
    let rounds = version.params().pbkdf2_rounds;
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passcode.as_bytes(), salt, rounds, &mut key[..]);
    key
}

fn cipher_for(key: &[u8; KEY_LEN]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|_| {
        ShareLinkError::with_kind(
            ErrorCategory::Environment,
            ErrorKind::EnvironmentUnavailable,
            "cipher rejected a 256-bit key",
        )
    })
}

/// Seals payloads using an injected random source.
///
/// Each call draws a fresh salt and nonce; no state is carried between calls
/// other than the random source itself.
pub struct Sealer<R = OsRandom> {
    random: R,
}

impl Sealer<OsRandom> {
    pub fn new() -> Self {
        Self { random: OsRandom }
    }
}

impl Default for Sealer<OsRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource> Sealer<R> {
    pub fn with_random(random: R) -> Self {
        Self { random }
    }

    /// Seal `payload` behind `passcode` with a fresh salt and nonce.
    pub fn encrypt<T: Serialize + ?Sized>(
        &mut self,
        passcode: &str,
        payload: &T,
    ) -> Result<SealedPayload> {
        check_passcode(passcode)?;

        let version = FormatVersion::CURRENT;
        let params = version.params();

        let mut salt = vec![0u8; params.salt_len];
        self.random.fill(&mut salt)?;

        let mut iv = vec![0u8; params.iv_len];
        self.random.fill(&mut iv)?;

        let plaintext = serialize_payload(payload)?;
        seal_bytes(version, passcode, &plaintext, salt, iv)
    }

    /// Open a sealed record. Identical to [`decrypt`].
    pub fn decrypt<T: DeserializeOwned>(
        &self,
        passcode: &str,
        sealed: &SealedPayload,
    ) -> Result<T> {
        decrypt(passcode, sealed)
    }
}

/// Seal `payload` behind `passcode` using the operating system's random source.
pub fn encrypt<T: Serialize + ?Sized>(passcode: &str, payload: &T) -> Result<SealedPayload> {
    Sealer::new().encrypt(passcode, payload)
}

/// Seal `payload` with the provided salt and nonce.
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/nonce.
pub fn encrypt_deterministic<T: Serialize + ?Sized>(
    passcode: &str,
    payload: &T,
    salt: &[u8; 16],
    iv: &[u8; 12],
) -> Result<SealedPayload> {
    check_passcode(passcode)?;
    let plaintext = serialize_payload(payload)?;
    seal_bytes(
        FormatVersion::V1,
        passcode,
        &plaintext,
        salt.to_vec(),
        iv.to_vec(),
    )
}

/// Open a sealed record and parse its plaintext as `T`.
///
/// Fails with [`ErrorKind::AuthenticationFailed`] for a wrong passcode, any
/// tampering, or a record from a version this build does not know; the
/// three are indistinguishable. Fails with [`ErrorKind::MalformedPayload`]
/// if the record authenticates but does not hold a `T`.
pub fn decrypt<T: DeserializeOwned>(passcode: &str, sealed: &SealedPayload) -> Result<T> {
    let plaintext = decrypt_bytes(passcode, sealed)?;
    serde_json::from_slice(&plaintext).map_err(|e| {
        warn!(
            version = sealed.version,
            plaintext_len = plaintext.len(),
            "sealed payload authenticated but does not parse: {}",
            e
        );
        ShareLinkError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::MalformedPayload,
            "link contents could not be read",
            e,
        )
    })
}

/// Open a sealed record, returning the raw plaintext bytes.
pub fn decrypt_bytes(passcode: &str, sealed: &SealedPayload) -> Result<Zeroizing<Vec<u8>>> {
    let Some(version) = sealed.format_version() else {
        debug!(version = sealed.version, "refusing to open unknown format version");
        return Err(ShareLinkError::authentication_failed());
    };

    let params = version.params();
    if sealed.salt.len() != params.salt_len || sealed.iv.len() != params.iv_len {
        debug!(
            salt_len = sealed.salt.len(),
            iv_len = sealed.iv.len(),
            "sealed payload has wrong salt or nonce length"
        );
        return Err(ShareLinkError::authentication_failed());
    }

    let key = derive_key_for(version, passcode, &sealed.salt);
    let cipher = cipher_for(&key)?;
    let nonce = Nonce::from_slice(&sealed.iv);
    let plaintext = cipher
        .decrypt(nonce, sealed.ciphertext.as_slice())
        .map_err(|_| ShareLinkError::authentication_failed())?;

    debug!(version = sealed.version, "opened sealed payload");
    Ok(Zeroizing::new(plaintext))
}

fn check_passcode(passcode: &str) -> Result<()> {
    if passcode.is_empty() {
        return Err(ShareLinkError::with_kind(
            ErrorCategory::User,
            ErrorKind::EmptyPasscode,
            "passcode must not be empty",
        ));
    }
    Ok(())
}

fn serialize_payload<T: Serialize + ?Sized>(payload: &T) -> Result<Zeroizing<Vec<u8>>> {
    serde_json::to_vec(payload).map(Zeroizing::new).map_err(|e| {
        ShareLinkError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::UnsupportedPayload,
            format!("payload cannot be represented as JSON: {}", e),
            e,
        )
    })
}

fn seal_bytes(
    version: FormatVersion,
    passcode: &str,
    plaintext: &[u8],
    salt: Vec<u8>,
    iv: Vec<u8>,
) -> Result<SealedPayload> {
    let key = derive_key_for(version, passcode, &salt);
    let cipher = cipher_for(&key)?;
    let nonce = Nonce::from_slice(&iv);
    let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| {
        ShareLinkError::with_kind(
            ErrorCategory::Environment,
            ErrorKind::EnvironmentUnavailable,
            "encryption failed",
        )
    })?;

    debug!(
        version = version.number(),
        ciphertext_len = ciphertext.len(),
        "sealed payload"
    );

    Ok(SealedPayload {
        version: version.number(),
        salt,
        iv,
        ciphertext,
    })
}
