//! Sealed record and the per-version parameters used to produce it
//!
//! Every sealed record names the format version it was written with. The
//! version selects the key derivation and cipher parameters on open, so a
//! future format can change them without breaking links already in
//! circulation.

/// Length of the derived key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Length of the AES-GCM authentication tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// Parameters a format version fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatParams {
    /// PBKDF2-HMAC-SHA256 iteration count.
    pub pbkdf2_rounds: u32,
    /// Length of the random salt in bytes.
    pub salt_len: usize,
    /// Length of the random AES-GCM nonce in bytes.
    pub iv_len: usize,
}

const V1_PARAMS: FormatParams = FormatParams {
    pbkdf2_rounds: 100_000,
    salt_len: 16,
    iv_len: 12,
};

/// Format versions this build can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormatVersion {
    /// PBKDF2-HMAC-SHA256 (100,000 rounds, 16-byte salt) + AES-256-GCM
    /// (12-byte nonce).
    V1,
}

impl FormatVersion {
    /// The version every new record is sealed with.
    pub const CURRENT: FormatVersion = FormatVersion::V1;

    /// Maps a wire version number to a known version.
    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            1 => Some(FormatVersion::V1),
            _ => None,
        }
    }

    /// The number written to the `version` field.
    pub fn number(self) -> u32 {
        match self {
            FormatVersion::V1 => 1,
        }
    }

    pub fn params(self) -> &'static FormatParams {
        match self {
            FormatVersion::V1 => &V1_PARAMS,
        }
    }
}

/// A passcode-sealed payload, exactly as carried in a share link.
///
/// `version` is kept as the raw number from the wire so that records from
/// unknown future versions can still be represented; they simply fail to
/// open.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub version: u32,
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
    /// AES-GCM output, authentication tag included.
    pub ciphertext: Vec<u8>,
}

impl SealedPayload {
    /// The known format version of this record, if any.
    pub fn format_version(&self) -> Option<FormatVersion> {
        FormatVersion::from_number(self.version)
    }
}

impl std::fmt::Debug for SealedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedPayload")
            .field("version", &self.version)
            .field("salt_len", &self.salt.len())
            .field("iv_len", &self.iv.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}
