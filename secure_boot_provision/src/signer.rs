// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Sign authenticated-variable payloads.
//!
//! Per UEFI spec 8.2.2, the digest is computed over the variable name
//! (minus the null terminator), the vendor GUID, the attributes, the
//! descriptor timestamp, and the new variable data, serialized back to
//! back with no padding. The detached PKCS#7 signature is then spliced in
//! between the descriptor and the variable data, and the descriptor's
//! `length` grows to cover it.

use crate::credentials::Credentials;
use crate::payload::AuthVarPayload;
use guid::Guid;
use openssl::error::ErrorStack;
use openssl::pkcs7::Pkcs7;
use openssl::pkcs7::Pkcs7Flags;
use openssl::stack::Stack;
use openssl::x509::X509;
use thiserror::Error;
use ucs2::Ucs2LeSlice;
use uefi_authvar_specs::nvram::EfiVariableAttributes;
use uefi_authvar_specs::signing::EFI_CERT_TYPE_PKCS7_GUID;
use uefi_authvar_specs::signing::WIN_CERTIFICATE_UEFI_GUID;
use uefi_authvar_specs::time::EFI_TIME;
use zerocopy::IntoBytes;

/// Errors while signing a payload.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("payload is already signed")]
    AlreadySigned,
    #[error("descriptor certificate type is not PKCS#7")]
    NotPkcs7,
    #[error("producing detached PKCS#7 signature")]
    Pkcs7(#[source] ErrorStack),
}

/// Signs an unsigned payload for the variable identified by `name` and
/// `vendor`, written with `attributes`.
///
/// The variable identity is part of the signed buffer, so a payload signed
/// for one variable cannot be replayed against another.
pub fn sign_variable(
    name: &Ucs2LeSlice,
    vendor: Guid,
    attributes: EfiVariableAttributes,
    payload: &AuthVarPayload,
    credentials: &Credentials,
) -> Result<AuthVarPayload, SignError> {
    let mut descriptor = payload.descriptor();
    if descriptor.auth_info.cert_type != EFI_CERT_TYPE_PKCS7_GUID {
        return Err(SignError::NotPkcs7);
    }
    if descriptor.auth_info.header.length as usize != size_of::<WIN_CERTIFICATE_UEFI_GUID>() {
        return Err(SignError::AlreadySigned);
    }

    let var_data = payload.after_descriptor();
    let sign_buf = signable_bytes(name, vendor, attributes, descriptor.timestamp, var_data);
    let signature = pkcs7_detached(&sign_buf, credentials).map_err(SignError::Pkcs7)?;

    descriptor.auth_info.header.length += signature.len() as u32;

    let mut data = Vec::with_capacity(payload.as_bytes().len() + signature.len());
    data.extend(descriptor.as_bytes());
    data.extend(&signature);
    data.extend(var_data);

    tracing::debug!(
        name = %name,
        signature_len = signature.len(),
        "signed variable payload"
    );
    Ok(AuthVarPayload::from_bytes(data).expect("descriptor emitted above"))
}

/// Serializes the buffer the signature is computed over.
fn signable_bytes(
    name: &Ucs2LeSlice,
    vendor: Guid,
    attributes: EfiVariableAttributes,
    timestamp: EFI_TIME,
    var_data: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend(name.as_bytes_without_nul());
    buf.extend(vendor.as_bytes());
    buf.extend(u32::from(attributes).to_le_bytes());
    buf.extend(timestamp.as_bytes());
    buf.extend(var_data);
    buf
}

// BINARY skips MIME canonicalization, DETACHED leaves the signed data out
// of the DER, and NOATTR signs the data digest directly rather than a set
// of authenticated attributes.
fn pkcs7_detached(data: &[u8], credentials: &Credentials) -> Result<Vec<u8>, ErrorStack> {
    let certs = Stack::<X509>::new()?;
    let pkcs7 = Pkcs7::sign(
        credentials.cert(),
        credentials.key(),
        &certs,
        data,
        Pkcs7Flags::BINARY | Pkcs7Flags::DETACHED | Pkcs7Flags::NOATTR,
    )?;
    pkcs7.to_der()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProvisioningContext;
    use crate::classify::TrustObject;
    use crate::classify::classify;
    use crate::payload::TargetVariable;
    use crate::payload::VariableUpdate;
    use crate::payload::build_variable_update;
    use openssl::x509::X509PurposeId;
    use openssl::x509::store::X509StoreBuilder;
    use openssl::x509::verify::X509VerifyFlags;
    use uefi_authvar_specs::nvram::vars;

    fn test_ctx() -> ProvisioningContext {
        ProvisioningContext::with_timestamp(EFI_TIME {
            year: 2025,
            month: 6,
            day: 1,
            hour: 14,
            minute: 30,
            second: 45,
            ..EFI_TIME::ZEROED
        })
    }

    fn signed_db_update() -> (Credentials, VariableUpdate, AuthVarPayload) {
        crate::entropy::init_entropy().unwrap();
        let ctx = test_ctx();
        let creds = Credentials::generate("SignerTest", &ctx).unwrap();
        let update = build_variable_update(
            &ctx,
            TargetVariable::Db,
            TrustObject::Certificate(creds.cert().to_owned()),
        )
        .unwrap();
        let (vendor, name) = update.target.vendor_and_name();
        let signed =
            sign_variable(name, vendor, update.attributes, &update.payload, &creds).unwrap();
        (creds, update, signed)
    }

    fn signature_len(signed: &AuthVarPayload) -> usize {
        signed.descriptor().auth_info.header.length as usize
            - size_of::<WIN_CERTIFICATE_UEFI_GUID>()
    }

    #[test]
    fn sign_splices_descriptor() {
        let (_creds, update, signed) = signed_db_update();

        assert!(!update.payload.is_signed());
        assert!(signed.is_signed());

        let sig_len = signature_len(&signed);
        assert!(sig_len > 0);
        assert_eq!(
            signed.as_bytes().len(),
            update.payload.as_bytes().len() + sig_len
        );

        // The signature lands between the descriptor and the untouched
        // variable data, and is itself a DER SEQUENCE.
        let after = signed.after_descriptor();
        assert_eq!(&after[..2], [0x30, 0x82]);
        assert_eq!(&after[sig_len..], update.payload.after_descriptor());
    }

    #[test]
    fn signing_twice_fails() {
        let (creds, update, signed) = signed_db_update();
        let (vendor, name) = update.target.vendor_and_name();
        assert!(matches!(
            sign_variable(name, vendor, update.attributes, &signed, &creds),
            Err(SignError::AlreadySigned)
        ));
    }

    #[test]
    fn signed_payload_reclassifies_and_passes_through() {
        let (_creds, _update, signed) = signed_db_update();
        let object = classify(signed.as_bytes()).unwrap();
        assert!(matches!(object, TrustObject::SignedSignatureList(_)));

        // Rebuilding from the reclassified object must not alter a byte.
        let rebuilt = build_variable_update(&test_ctx(), TargetVariable::Db, object).unwrap();
        assert_eq!(rebuilt.payload.as_bytes(), signed.as_bytes());
    }

    #[test]
    fn signature_verifies_over_descriptor_buffer() {
        let (creds, update, signed) = signed_db_update();

        let sig_len = signature_len(&signed);
        let pkcs7 = Pkcs7::from_der(&signed.after_descriptor()[..sig_len]).unwrap();

        let (vendor, name) = update.target.vendor_and_name();
        let verify_buf = signable_bytes(
            name,
            vendor,
            update.attributes,
            signed.descriptor().timestamp,
            update.payload.after_descriptor(),
        );

        let mut store = X509StoreBuilder::new().unwrap();
        store.add_cert(creds.cert().to_owned()).unwrap();
        store
            .set_flags(X509VerifyFlags::PARTIAL_CHAIN | X509VerifyFlags::NO_CHECK_TIME)
            .unwrap();
        store.set_purpose(X509PurposeId::ANY).unwrap();
        let store = store.build();

        pkcs7
            .verify(
                &Stack::new().unwrap(),
                &store,
                Some(&verify_buf),
                None,
                Pkcs7Flags::BINARY,
            )
            .unwrap();
    }

    #[test]
    fn signable_buffer_layout() {
        let (vendor, name) = vars::DB();
        let attributes = EfiVariableAttributes::DEFAULT_ATTRIBUTES_TIME_BASED_AUTH;
        let buf = signable_bytes(name, vendor, attributes, EFI_TIME::ZEROED, &[0xab; 10]);

        // UCS-2 name without terminator, GUID, LE attributes, timestamp, data.
        assert_eq!(buf.len(), 4 + 16 + 4 + 16 + 10);
        assert_eq!(&buf[..4], [b'd', 0, b'b', 0]);
        assert_eq!(&buf[4..20], vendor.as_bytes());
        assert_eq!(&buf[20..24], [0x27, 0, 0, 0]);
        assert_eq!(&buf[40..], [0xab; 10]);
    }
}
