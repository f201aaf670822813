//! Secure random source used for salts and nonces

use crate::error::{ErrorCategory, ErrorKind, Result, ShareLinkError};
use rand::RngCore;
use rand::rngs::OsRng;

/// Source of cryptographically secure random bytes.
///
/// Injected into [`crate::sealer::Sealer`] so that sealing can be exercised
/// without touching the operating system's generator.
pub trait RandomSource {
    /// Fill `buf` entirely with random bytes, or fail.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).fill(buf)
    }
}

/// The operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(buf).map_err(|e| {
            ShareLinkError::with_kind_and_source(
                ErrorCategory::Environment,
                ErrorKind::EnvironmentUnavailable,
                format!("secure random source unavailable: {}", e),
                e,
            )
        })
    }
}
