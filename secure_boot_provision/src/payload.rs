// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Build authenticated-variable payloads from classified trust material.
//!
//! Every Secure Boot variable write is an `EFI_VARIABLE_AUTHENTICATION_2`
//! descriptor followed by signature lists. Certificates are wrapped into a
//! fresh single-entry X509 list, bare lists are prepended with an unsigned
//! descriptor, and pre-signed payloads pass through untouched.

use crate::ProvisioningContext;
use crate::classify::TrustObject;
use crate::signature_list::ParseError;
use crate::signature_list::extend_with_x509_list;
use guid::Guid;
use openssl::error::ErrorStack;
use thiserror::Error;
use ucs2::Ucs2LeSlice;
use uefi_authvar_specs::nvram::EFI_VARIABLE_AUTHENTICATION_2;
use uefi_authvar_specs::nvram::EfiVariableAttributes;
use uefi_authvar_specs::nvram::signature_list::EFI_SIGNATURE_LIST;
use uefi_authvar_specs::nvram::vars;
use uefi_authvar_specs::signing::WIN_CERTIFICATE_UEFI_GUID;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

/// The authenticated variables that hold Secure Boot trust material.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetVariable {
    Pk,
    Kek,
    Db,
    Dbx,
    MokList,
    MokListX,
}

impl TargetVariable {
    /// The vendor GUID and UCS-2 name this variable is written under.
    pub fn vendor_and_name(&self) -> (Guid, &'static Ucs2LeSlice) {
        match self {
            TargetVariable::Pk => vars::PK(),
            TargetVariable::Kek => vars::KEK(),
            TargetVariable::Db => vars::DB(),
            TargetVariable::Dbx => vars::DBX(),
            TargetVariable::MokList => vars::MOK_LIST(),
            TargetVariable::MokListX => vars::MOK_LIST_X(),
        }
    }

    /// The attribute set the variable is written with. MOK-class variables
    /// are boot-services only; the UEFI-defined databases take the
    /// time-based-auth set.
    pub fn attributes(&self) -> EfiVariableAttributes {
        match self {
            TargetVariable::MokList | TargetVariable::MokListX => {
                EfiVariableAttributes::DEFAULT_ATTRIBUTES_BOOT_SERVICE_ONLY
            }
            _ => EfiVariableAttributes::DEFAULT_ATTRIBUTES_TIME_BASED_AUTH,
        }
    }
}

/// Errors while building a variable payload.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("encoding certificate to DER")]
    EncodeCertificate(#[source] ErrorStack),
    #[error("signature list declares {declared} bytes but input is {actual}")]
    ListSizeMismatch { declared: u32, actual: usize },
    #[error("payload of {0} bytes is smaller than its descriptor")]
    DescriptorTooShort(usize),
    #[error("malformed signature list")]
    List(#[from] ParseError),
}

/// A complete variable payload: `EFI_VARIABLE_AUTHENTICATION_2` descriptor,
/// then any PKCS#7 signature, then the signature list data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthVarPayload {
    data: Vec<u8>,
}

impl AuthVarPayload {
    /// Wraps an existing payload buffer, checking only that the descriptor
    /// is present.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, BuildError> {
        if data.len() < size_of::<EFI_VARIABLE_AUTHENTICATION_2>() {
            return Err(BuildError::DescriptorTooShort(data.len()));
        }
        Ok(Self { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// The payload's leading descriptor.
    pub fn descriptor(&self) -> EFI_VARIABLE_AUTHENTICATION_2 {
        EFI_VARIABLE_AUTHENTICATION_2::read_from_prefix(&self.data)
            .expect("length checked at construction")
            .0
    }

    /// Everything past the fixed-size descriptor: the PKCS#7 signature (if
    /// any) followed by the signature lists.
    pub fn after_descriptor(&self) -> &[u8] {
        &self.data[size_of::<EFI_VARIABLE_AUTHENTICATION_2>()..]
    }

    /// Whether a signature has been spliced in. An unsigned descriptor's
    /// `length` covers only the `WIN_CERTIFICATE_UEFI_GUID` header.
    pub fn is_signed(&self) -> bool {
        self.descriptor().auth_info.header.length as usize != size_of::<WIN_CERTIFICATE_UEFI_GUID>()
    }
}

/// A payload bound to the variable it updates.
#[derive(Debug, Clone)]
pub struct VariableUpdate {
    pub target: TargetVariable,
    pub attributes: EfiVariableAttributes,
    pub payload: AuthVarPayload,
}

/// Turns classified trust material into an update for `target`.
///
/// Certificate and bare-list inputs come back unsigned, carrying the
/// session timestamp; pre-signed payloads keep the timestamp and signature
/// they arrived with.
pub fn build_variable_update(
    ctx: &ProvisioningContext,
    target: TargetVariable,
    object: TrustObject,
) -> Result<VariableUpdate, BuildError> {
    debug_assert!(ctx.timestamp().is_normalized_utc());

    let payload = match object {
        TrustObject::Certificate(cert) => {
            let der = cert.to_der().map_err(BuildError::EncodeCertificate)?;
            let owner = owner_guid(&der);
            let mut data = EFI_VARIABLE_AUTHENTICATION_2::unsigned(ctx.timestamp())
                .as_bytes()
                .to_vec();
            extend_with_x509_list(owner, &der, &mut data);
            AuthVarPayload { data }
        }
        TrustObject::SignatureList(list) => {
            let (header, _) = EFI_SIGNATURE_LIST::read_from_prefix(&list)
                .map_err(|_| ParseError::InvalidHeader)?;
            if header.signature_list_size as usize != list.len() {
                return Err(BuildError::ListSizeMismatch {
                    declared: header.signature_list_size,
                    actual: list.len(),
                });
            }
            let mut data = EFI_VARIABLE_AUTHENTICATION_2::unsigned(ctx.timestamp())
                .as_bytes()
                .to_vec();
            data.extend(&list);
            AuthVarPayload { data }
        }
        TrustObject::SignedSignatureList(data) => AuthVarPayload::from_bytes(data)?,
    };

    tracing::debug!(?target, len = payload.as_bytes().len(), "built variable update");
    Ok(VariableUpdate {
        target,
        attributes: target.attributes(),
        payload,
    })
}

/// Derives the signature owner GUID for a certificate: the SHA-1 of the DER
/// encoding, read as a big-endian GUID (integer fields byte-swapped,
/// trailing bytes verbatim).
pub fn owner_guid(cert_der: &[u8]) -> Guid {
    let digest = openssl::sha::sha1(cert_der);
    Guid {
        data1: u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]),
        data2: u16::from_be_bytes([digest[4], digest[5]]),
        data3: u16::from_be_bytes([digest[6], digest[7]]),
        data4: [
            digest[8], digest[9], digest[10], digest[11], digest[12], digest[13], digest[14],
            digest[15],
        ],
    }
}
