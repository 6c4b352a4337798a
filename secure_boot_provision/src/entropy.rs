// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! PRNG health checks and seeding.
//!
//! Keypair generation must never run against a predictable PRNG. libcrypto
//! seeds itself from the OS on any hosted platform; this module verifies that
//! it did, pulls OS entropy when it did not, and always stirs in a
//! per-install supplement so that the generator state is not derived from the
//! clock alone.

use thiserror::Error;

/// Failure to bring the PRNG to a healthy state.
///
/// Callers must treat this as fatal: a signing credential produced from a
/// predictable generator defeats the whole scheme.
#[derive(Debug, Error)]
pub enum EntropyError {
    /// The OS entropy source failed.
    #[error("reading platform entropy source")]
    Platform(#[source] getrandom::Error),
    /// libcrypto still reports an unseeded PRNG after reseeding.
    #[error("random generator reports unhealthy state after reseeding")]
    Unhealthy,
}

/// Bytes of OS entropy mixed in when libcrypto reports an unseeded PRNG.
const RESEED_BYTES: usize = 64;

/// Fallback seed supplement for when the executable path is unavailable.
/// Static across installs, so it only ever supplements an already-seeded
/// PRNG.
const STATIC_SEED: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

/// Brings the PRNG to a usable state, or fails.
///
/// Call once at startup, before [`crate::credentials::Credentials::generate`].
pub fn init_entropy() -> Result<(), EntropyError> {
    if !openssl_rand::status() {
        tracing::warn!("random generator not seeded by platform, reseeding from OS");
        let mut buf = [0u8; RESEED_BYTES];
        getrandom::getrandom(&mut buf).map_err(EntropyError::Platform)?;
        openssl_rand::seed(&buf);
    }

    // The executable path differs between installs without being secret;
    // mixing it in diversifies the generator state across machines.
    match std::env::current_exe() {
        Ok(path) if !path.as_os_str().is_empty() => {
            openssl_rand::seed(path.as_os_str().as_encoded_bytes());
        }
        _ => {
            tracing::info!("executable path unavailable, using static seed supplement");
            openssl_rand::seed(STATIC_SEED.as_bytes());
        }
    }

    if openssl_rand::status() {
        Ok(())
    } else {
        Err(EntropyError::Unhealthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prng_reports_healthy() {
        init_entropy().unwrap();
        assert!(openssl_rand::status());
    }
}
