// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Crate wrapping the libcrypto PRNG seeding and health-check APIs.
//!
//! The upstream openssl crate exposes `rand_bytes`, but not `RAND_status` or
//! `RAND_seed`. These are included here instead of in a fork of the openssl
//! crate to avoid unnecessary forking. This crate can be removed once these
//! capabilities are added to the upstream openssl crate.

// UNSAFETY: Calls into openssl.
#![expect(unsafe_code)]

mod sys;

/// Returns whether the PRNG has been seeded with enough data.
pub fn status() -> bool {
    openssl_sys::init();
    // SAFETY: RAND_status takes no arguments and has no preconditions.
    (unsafe { sys::RAND_status() }) == 1
}

/// Mixes `buf` into the PRNG state, treating it as if it carried `buf.len()`
/// bytes of entropy.
///
/// Only pass data that is genuinely unpredictable, or use it to supplement an
/// already-seeded PRNG.
pub fn seed(buf: &[u8]) {
    openssl_sys::init();
    // SAFETY: buf is valid for reads of buf.len() bytes for the duration of
    // the call, and RAND_seed only reads from it.
    unsafe {
        sys::RAND_seed(
            buf.as_ptr().cast::<libc::c_void>(),
            buf.len() as libc::c_int,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_after_mixing() {
        seed(b"not actually entropy, but additive");
        // Any hosted libcrypto will have seeded itself from the OS by now.
        assert!(status());
    }
}
