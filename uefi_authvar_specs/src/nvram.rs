// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! UEFI Nvram Variable Services

use crate::signing::EFI_CERT_TYPE_PKCS7_GUID;
use crate::signing::WIN_CERTIFICATE;
use crate::signing::WIN_CERTIFICATE_UEFI_GUID;
use crate::signing::WIN_CERT_TYPE_EFI_GUID;
use crate::time::EFI_TIME;
use bitfield_struct::bitfield;
use static_assertions::const_assert_eq;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// UEFI spec 8.2 - Variable Services
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct EfiVariableAttributes {
    pub non_volatile: bool,
    pub bootservice_access: bool,
    pub runtime_access: bool,
    pub hardware_error_record: bool,
    pub authenticated_write_access: bool,
    pub time_based_authenticated_write_access: bool,
    pub append_write: bool,
    pub enhanced_authenticated_access: bool,

    #[bits(24)]
    _reserved: u32,
}

impl EfiVariableAttributes {
    /// NV + BS + RT: the usual persistent-variable set.
    pub const DEFAULT_ATTRIBUTES: EfiVariableAttributes = EfiVariableAttributes::new()
        .with_non_volatile(true)
        .with_bootservice_access(true)
        .with_runtime_access(true);

    /// NV + BS: persistent, but invisible once boot services end. shim's
    /// MOK variables are written with this set.
    pub const DEFAULT_ATTRIBUTES_BOOT_SERVICE_ONLY: EfiVariableAttributes =
        EfiVariableAttributes::new()
            .with_non_volatile(true)
            .with_bootservice_access(true);

    /// [`DEFAULT_ATTRIBUTES`](Self::DEFAULT_ATTRIBUTES) plus time-based
    /// authentication, as required for the Secure Boot policy databases.
    pub const DEFAULT_ATTRIBUTES_TIME_BASED_AUTH: EfiVariableAttributes =
        Self::DEFAULT_ATTRIBUTES.with_time_based_authenticated_write_access(true);
}

/// UEFI spec 8.2
#[derive(Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct EFI_VARIABLE_AUTHENTICATION_2 {
    /// Components Pad1, Nanosecond, TimeZone, Daylight and Pad2 shall be set to
    /// 0. This means that the time shall always be expressed in GMT.
    pub timestamp: EFI_TIME,
    /// Provides the authorization for the variable access. Only a CertType of
    /// EFI_CERT_TYPE_PKCS7_GUID is accepted.
    pub auth_info: WIN_CERTIFICATE_UEFI_GUID,
}

// The descriptor is immediately followed by the PKCS#7 DER in signed
// payloads, so any padding here would corrupt the wire offsets.
const_assert_eq!(size_of::<EFI_VARIABLE_AUTHENTICATION_2>(), 40);

impl EFI_VARIABLE_AUTHENTICATION_2 {
    /// A descriptor that carries `timestamp` but no signature yet.
    ///
    /// `length` covers only the `WIN_CERTIFICATE_UEFI_GUID` header; splicing
    /// in a PKCS#7 signature later must extend it by the DER length.
    pub const fn unsigned(timestamp: EFI_TIME) -> Self {
        EFI_VARIABLE_AUTHENTICATION_2 {
            timestamp,
            auth_info: WIN_CERTIFICATE_UEFI_GUID {
                header: WIN_CERTIFICATE {
                    length: size_of::<WIN_CERTIFICATE_UEFI_GUID>() as u32,
                    revision: 0x0200,
                    certificate_type: WIN_CERT_TYPE_EFI_GUID,
                },
                cert_type: EFI_CERT_TYPE_PKCS7_GUID,
            },
        }
    }
}

/// UEFI spec 32.4.1
pub mod signature_list {
    use guid::Guid;
    use zerocopy::FromBytes;
    use zerocopy::Immutable;
    use zerocopy::IntoBytes;
    use zerocopy::KnownLayout;

    #[derive(Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
    #[repr(C)]
    pub struct EFI_SIGNATURE_LIST {
        /// Type of the signature. GUID signature types are defined in "Related
        /// Definitions" below.
        pub signature_type: Guid,
        /// Total size of the signature list, including this header.
        pub signature_list_size: u32,
        /// Size of the signature header which precedes the array of signatures.
        ///
        /// > NOTE: a careful reading of the UEFI spec uncovers that this field
        /// > is _always_ zero. Why? Excellent question.
        pub signature_header_size: u32,
        /// Size of each signature. Must be at least the size of EFI_SIGNATURE_DATA.
        pub signature_size: u32,
        // Header before the array of signatures. The format of this header is
        // specified by the SignatureType.
        //
        // > NOTE: because SignatureHeaderSize is always zero, this array is
        // > always zero sized...
        //
        // UINT8 SignatureHeader[SignatureHeaderSize];
        //
        // An array of signatures. Each signature is SignatureSize bytes in
        // length. The format of the signature is defined by the SignatureType.
        //
        // EFI_SIGNATURE_DATA Signatures[…][SignatureSize];
    }

    #[derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        IntoBytes,
        FromBytes,
        Immutable,
        KnownLayout,
    )]
    #[repr(C)]
    pub struct EFI_SIGNATURE_DATA {
        /// An identifier which identifies the agent which added the signature to
        /// the list.
        pub signature_owner: Guid,
        // UINT8 SignatureData[…];
    }

    pub const EFI_CERT_SHA256_GUID: Guid =
        Guid::from_static_str("c1c41626-504c-4092-aca9-41f936934328");

    pub const EFI_CERT_X509_GUID: Guid =
        Guid::from_static_str("a5c059a1-94e4-4aa7-87b5-ab155c2bf072");
}

/// Identities of the variables that hold Secure Boot trust material.
///
/// Due to the Rust compiler not having built-in support for defining
/// wide-string literals, these "constants" are actually methods that can only
/// be called at runtime.
pub mod vars {
    use guid::Guid;

    /// UEFI spec 3.3 - Globally Defined Variables
    pub const EFI_GLOBAL_VARIABLE: Guid =
        Guid::from_static_str("8BE4DF61-93CA-11D2-AA0D-00E098032B8C");

    /// UEFI spec 32.6.1 - UEFI Image Variable GUID & Variable Name
    pub const IMAGE_SECURITY_DATABASE_GUID: Guid =
        Guid::from_static_str("d719b2cb-3d3a-4596-a3bc-dad00e67656f");

    /// Vendor GUID of shim's MokList/MokListX variables.
    pub const SHIM_LOCK_GUID: Guid = Guid::from_static_str("605dab50-e046-4300-abb6-3dd810dd8b23");

    defn_nvram_var!(PK = (EFI_GLOBAL_VARIABLE, "PK"));
    defn_nvram_var!(KEK = (EFI_GLOBAL_VARIABLE, "KEK"));

    defn_nvram_var!(DB = (IMAGE_SECURITY_DATABASE_GUID, "db"));
    defn_nvram_var!(DBX = (IMAGE_SECURITY_DATABASE_GUID, "dbx"));

    defn_nvram_var!(MOK_LIST = (SHIM_LOCK_GUID, "MokList"));
    defn_nvram_var!(MOK_LIST_X = (SHIM_LOCK_GUID, "MokListX"));
}
