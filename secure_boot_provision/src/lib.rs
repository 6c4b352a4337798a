// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Generation and packaging of UEFI Secure Boot trust material.
//!
//! This crate turns certificates and signature lists into the payloads that
//! the UEFI variable services accept for PK, KEK, db, dbx, and the MOK-class
//! variables: classifying raw inputs ([`classify`]), wrapping them into
//! `EFI_SIGNATURE_LIST`s ([`signature_list`]), prepending the
//! `EFI_VARIABLE_AUTHENTICATION_2` descriptor ([`payload`]), and producing
//! the detached PKCS#7 signature over the buffer defined in UEFI spec 8.2.2
//! ([`signer`]). Signing credentials are generated ([`credentials`]) and
//! persisted ([`store`]) alongside.
//!
//! A provisioning run starts by calling [`entropy::init_entropy`] once, then
//! captures a single [`ProvisioningContext`] and threads it through every
//! build and sign call.

#![forbid(unsafe_code)]

pub mod classify;
pub mod credentials;
pub mod entropy;
pub mod payload;
pub mod signature_list;
pub mod signer;
pub mod store;

use time::OffsetDateTime;
use uefi_authvar_specs::time::EFI_TIME;
use uefi_authvar_specs::time::EfiDaylight;
use uefi_authvar_specs::time::EfiTimezone;

/// Wall-clock state captured once per provisioning run.
///
/// Firmware compares a payload's timestamp against the one stored with the
/// variable and rejects non-monotonic updates, so all payloads built within
/// one run must carry the same timestamp or risk being applied only
/// partially. Capture the context once, then pass it to every build call.
#[derive(Debug, Clone)]
pub struct ProvisioningContext {
    timestamp: EFI_TIME,
}

impl ProvisioningContext {
    /// Captures the current UTC time, truncated to whole seconds.
    ///
    /// The sub-second, timezone, and daylight fields of an authenticated
    /// variable timestamp must be zero (UEFI spec 8.2.2), so they are zeroed
    /// here rather than at each use site.
    pub fn new() -> Self {
        let now = OffsetDateTime::now_utc();
        let timestamp = EFI_TIME {
            year: now.year() as u16,
            month: now.month().into(),
            day: now.day(),
            hour: now.hour(),
            minute: now.minute(),
            second: now.second(),
            pad1: 0,
            nanosecond: 0,
            timezone: EfiTimezone(0),
            daylight: EfiDaylight::new(),
            pad2: 0,
        };
        tracing::debug!(%timestamp, "captured provisioning timestamp");
        Self::with_timestamp(timestamp)
    }

    /// Uses a fixed timestamp instead of the current time.
    pub fn with_timestamp(timestamp: EFI_TIME) -> Self {
        Self { timestamp }
    }

    /// The timestamp stamped into every payload built within this context.
    pub fn timestamp(&self) -> EFI_TIME {
        self.timestamp
    }
}

impl Default for ProvisioningContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_timestamp_is_normalized() {
        let ctx = ProvisioningContext::new();
        let timestamp = ctx.timestamp();
        assert!(timestamp.is_normalized_utc());
        assert!(timestamp.year >= 2024);
    }

    #[test]
    fn fixed_timestamp_passthrough() {
        let timestamp = EFI_TIME {
            year: 2025,
            month: 8,
            day: 25,
            ..EFI_TIME::ZEROED
        };
        assert_eq!(ProvisioningContext::with_timestamp(timestamp).timestamp(), timestamp);
    }
}
