// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Raw bindings to the libcrypto RAND entry points this crate needs.

use libc::c_int;
use libc::c_void;

unsafe extern "C" {
    pub fn RAND_status() -> c_int;
    pub fn RAND_seed(buf: *const c_void, num: c_int);
}
