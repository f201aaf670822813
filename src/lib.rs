//! sharelink - passcode-sealed JSON payloads for shareable view links
//!
//! A payload is serialized to JSON, sealed with AES-256-GCM under a key
//! derived from a passcode (PBKDF2-HMAC-SHA256), and encoded into a URL
//! fragment. Anyone holding the link and the passcode can open it; nothing is
//! stored server side.
//!
//! ```no_run
//! use serde_json::{Value, json};
//! use sharelink::{decrypt, encrypt, fragment_to_sealed, sealed_to_fragment};
//!
//! let sealed = encrypt("correct horse", &json!({"projectId": "abc123", "records": []}))?;
//! let fragment = sealed_to_fragment(&sealed);
//!
//! let received = fragment_to_sealed(&fragment).expect("complete fragment");
//! let payload: Value = decrypt("correct horse", &received)?;
//! # Ok::<(), sharelink::ShareLinkError>(())
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod file_ops;
pub mod format;
pub mod fragment;
pub mod passcode;
pub mod random;
pub mod sealer;
pub mod share;

pub use error::{ErrorCategory, ErrorKind, Result, ShareLinkError};
pub use format::{FormatVersion, SealedPayload};
pub use fragment::{fragment_to_sealed, sealed_to_fragment};
pub use random::{OsRandom, RandomSource};
pub use sealer::{Sealer, decrypt, derive_key, encrypt};
pub use share::{ClipboardSink, LocationProvider, ShareLink};
