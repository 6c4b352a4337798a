// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Types and constants lifted from the UEFI spec, scoped to authenticated
//! variables: the time structure, variable attributes, signing descriptors,
//! signature lists, and the well-known Secure Boot variable identities
//! (including shim's MOK variables).

#![no_std]
#![forbid(unsafe_code)]

// TODO: find a nice way to create const `Ucs2LeSlice` instances, and use proper
// `const`ants instead of runtime methods...
macro_rules! defn_nvram_var {
    ($varname:ident = ($guid:expr, $name:literal)) => {
        #[allow(non_snake_case)]
        pub fn $varname() -> (Guid, &'static ucs2::Ucs2LeSlice) {
            use ucs2::Ucs2LeSlice;
            use zerocopy::IntoBytes;

            (
                $guid,
                Ucs2LeSlice::from_slice_with_nul(wchar::wchz!(u16, $name).as_bytes()).unwrap(),
            )
        }
    };
}

pub mod nvram;
pub mod signing;
pub mod time;
