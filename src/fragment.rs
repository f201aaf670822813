//! URL fragment encoding of sealed records
//!
//! A sealed record travels as four form-encoded pairs:
//!
//! ```text
//! version=1&salt=<b64url>&iv=<b64url>&data=<b64url>
//! ```
//!
//! The encoded form is:
//! - Free of whitespace (including newlines)
//! - Safe to embed in a URL fragment without further escaping
//! - Order independent when decoded; fields are looked up by name

use crate::format::SealedPayload;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use tracing::debug;
use url::form_urlencoded;

const VERSION_KEY: &str = "version";
const SALT_KEY: &str = "salt";
const IV_KEY: &str = "iv";
const DATA_KEY: &str = "data";

/// Decodes base64url whether or not the sender stripped the padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode a sealed record as a URL fragment (without the leading `#`).
pub fn sealed_to_fragment(sealed: &SealedPayload) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(VERSION_KEY, &sealed.version.to_string())
        .append_pair(SALT_KEY, &URL_SAFE_NO_PAD.encode(&sealed.salt))
        .append_pair(IV_KEY, &URL_SAFE_NO_PAD.encode(&sealed.iv))
        .append_pair(DATA_KEY, &URL_SAFE_NO_PAD.encode(&sealed.ciphertext))
        .finish()
}

/// Decode a URL fragment into a sealed record.
///
/// A single leading `#` is ignored. Returns `None` when any of the four
/// fields is missing, empty or undecodable, so that a damaged link reads as
/// "no link" rather than as an error. When a key repeats, the first
/// occurrence wins.
pub fn fragment_to_sealed(fragment: &str) -> Option<SealedPayload> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);

    let mut version = None;
    let mut salt = None;
    let mut iv = None;
    let mut data = None;

    for (key, value) in form_urlencoded::parse(fragment.as_bytes()) {
        let slot = match key.as_ref() {
            VERSION_KEY => &mut version,
            SALT_KEY => &mut salt,
            IV_KEY => &mut iv,
            DATA_KEY => &mut data,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    let sealed = SealedPayload {
        version: parse_version(version.as_deref()?)?,
        salt: decode_field(SALT_KEY, salt.as_deref()?)?,
        iv: decode_field(IV_KEY, iv.as_deref()?)?,
        ciphertext: decode_field(DATA_KEY, data.as_deref()?)?,
    };
    Some(sealed)
}

fn parse_version(raw: &str) -> Option<u32> {
    match raw.parse::<u32>() {
        Ok(version) if version > 0 => Some(version),
        _ => {
            debug!(version = raw, "fragment has an invalid version field");
            None
        }
    }
}

fn decode_field(name: &str, raw: &str) -> Option<Vec<u8>> {
    if raw.is_empty() {
        debug!(field = name, "fragment field is empty");
        return None;
    }
    match URL_SAFE_LENIENT.decode(raw) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(e) => {
            debug!(field = name, "fragment field is not base64url: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SealedPayload {
        SealedPayload {
            version: 1,
            salt: (0u8..16).collect(),
            iv: vec![0xFF; 12],
            ciphertext: (0..=255).collect(),
        }
    }

    #[test]
    fn test_fragment_round_trip() {
        let sealed = sample();
        let fragment = sealed_to_fragment(&sealed);
        assert_eq!(fragment_to_sealed(&fragment), Some(sealed));
    }

    #[test]
    fn test_exact_encoding() {
        let sealed = SealedPayload {
            version: 1,
            salt: vec![0x42; 16],
            iv: vec![0x24; 12],
            ciphertext: vec![0xFB, 0xFF, 0xFE],
        };
        assert_eq!(
            sealed_to_fragment(&sealed),
            "version=1&salt=QkJCQkJCQkJCQkJCQkJCQg&iv=JCQkJCQkJCQkJCQk&data=-__-"
        );
    }

    #[test]
    fn test_leading_hash_is_stripped() {
        let sealed = sample();
        let fragment = format!("#{}", sealed_to_fragment(&sealed));
        assert_eq!(fragment_to_sealed(&fragment), Some(sealed));
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let fragment = "data=-__-&iv=JCQkJCQkJCQkJCQk&version=1&salt=QkJCQkJCQkJCQkJCQkJCQg";
        let sealed = fragment_to_sealed(fragment).unwrap();
        assert_eq!(sealed.version, 1);
        assert_eq!(sealed.salt, vec![0x42; 16]);
        assert_eq!(sealed.iv, vec![0x24; 12]);
        assert_eq!(sealed.ciphertext, vec![0xFB, 0xFF, 0xFE]);
    }

    #[test]
    fn test_padded_base64_accepted() {
        let fragment = "version=1&salt=QkJCQkJCQkJCQkJCQkJCQg%3D%3D&iv=JCQkJCQkJCQkJCQk&data=-__-";
        let sealed = fragment_to_sealed(fragment).unwrap();
        assert_eq!(sealed.salt, vec![0x42; 16]);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let fragment = format!("{}&utm_source=mail", sealed_to_fragment(&sample()));
        assert_eq!(fragment_to_sealed(&fragment), Some(sample()));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let fragment = format!("{}&version=7", sealed_to_fragment(&sample()));
        assert_eq!(fragment_to_sealed(&fragment).unwrap().version, 1);
    }

    #[test]
    fn test_empty_and_bare_hash() {
        assert_eq!(fragment_to_sealed(""), None);
        assert_eq!(fragment_to_sealed("#"), None);
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(fragment_to_sealed("version=1&salt=abc"), None);
        assert_eq!(fragment_to_sealed("salt=QkJC&iv=JCQk&data=-__-"), None);
        assert_eq!(fragment_to_sealed("version=1&salt=QkJC&iv=JCQk"), None);
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(fragment_to_sealed("version=1&salt=&iv=JCQk&data=-__-"), None);
        assert_eq!(fragment_to_sealed("version=&salt=QkJC&iv=JCQk&data=-__-"), None);
        assert_eq!(fragment_to_sealed("version=1&salt=QkJC&iv=JCQk&data="), None);
    }

    #[test]
    fn test_bad_version() {
        assert_eq!(fragment_to_sealed("version=0&salt=QkJC&iv=JCQk&data=-__-"), None);
        assert_eq!(fragment_to_sealed("version=-1&salt=QkJC&iv=JCQk&data=-__-"), None);
        assert_eq!(fragment_to_sealed("version=one&salt=QkJC&iv=JCQk&data=-__-"), None);
    }

    #[test]
    fn test_future_version_still_parses() {
        // Whether a version can be opened is decided on decrypt, not here.
        let sealed = fragment_to_sealed("version=9&salt=QkJC&iv=JCQk&data=-__-").unwrap();
        assert_eq!(sealed.version, 9);
    }

    #[test]
    fn test_bad_base64() {
        assert_eq!(fragment_to_sealed("version=1&salt=bad$$&iv=JCQk&data=-__-"), None);
        assert_eq!(fragment_to_sealed("version=1&salt=QkJC&iv=JCQk&data=+/+/"), None);
    }

    #[test]
    fn test_url_safe() {
        let sealed = SealedPayload {
            version: 1,
            salt: vec![0xFF; 16],
            iv: vec![0xFB; 12],
            ciphertext: vec![0xFE; 100],
        };
        let fragment = sealed_to_fragment(&sealed);

        assert!(!fragment.contains('+'));
        assert!(!fragment.contains('/'));
        assert!(!fragment.contains("=="));
        assert!(!fragment.contains('%'));
        assert!(!fragment.contains(' '));
        assert!(!fragment.contains('#'));
    }
}
