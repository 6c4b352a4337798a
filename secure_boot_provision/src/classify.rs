// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Detect the format of a trust-material input.
//!
//! Inputs arrive as files of unknown provenance: certificates in DER or PEM
//! form, PKCS#12 bundles, bare `EFI_SIGNATURE_LIST` chains, or complete
//! pre-signed authenticated-variable payloads. Formats are tried in a fixed
//! order, most structured first, so that a signed payload is never mistaken
//! for the signature lists it contains.

use crate::signature_list::ParseError;
use crate::signature_list::validate_signature_lists;
use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12;
use openssl::x509::X509;
use thiserror::Error;
use uefi_authvar_specs::nvram::EFI_VARIABLE_AUTHENTICATION_2;
use uefi_authvar_specs::nvram::signature_list::EFI_SIGNATURE_LIST;
use uefi_authvar_specs::signing::EFI_CERT_TYPE_PKCS7_GUID;
use uefi_authvar_specs::signing::WIN_CERT_TYPE_EFI_GUID;
use zerocopy::FromBytes;

/// A successfully classified trust input.
#[derive(Debug)]
pub enum TrustObject {
    /// A single X.509 certificate, parsed from DER, PEM, or a PKCS#12 bundle.
    Certificate(X509),
    /// A complete authenticated-variable payload: descriptor, PKCS#7
    /// signature, and the signature lists it covers.
    SignedSignatureList(Vec<u8>),
    /// A bare chain of `EFI_SIGNATURE_LIST` structures with no descriptor.
    SignatureList(Vec<u8>),
}

/// Errors from [`classify`].
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("input is smaller than a signature list header")]
    TooSmall,
    #[error("signed payload's signature is not DER encoded")]
    SignedPayloadNotDer,
    #[error("signed payload has no room for signature lists after the signature")]
    SignedPayloadNoLists,
    #[error("signed payload carries malformed signature lists")]
    SignedPayloadLists(#[source] ParseError),
    #[error(
        "unrecognized input format (der: {der}, pem: {pem}, pkcs12: {pkcs12}, \
         declared list size {declared_list_size} vs len {len})"
    )]
    Unrecognized {
        der: ErrorStack,
        pem: ErrorStack,
        pkcs12: Pkcs12Error,
        declared_list_size: u32,
        len: usize,
    },
}

/// Why the PKCS#12 classification attempt failed.
#[derive(Debug, Error)]
pub enum Pkcs12Error {
    #[error(transparent)]
    Parse(ErrorStack),
    #[error("bundle parsed but contains no certificate")]
    NoCertificate,
}

/// Determines what kind of trust material `data` holds.
pub fn classify(data: &[u8]) -> Result<TrustObject, FormatError> {
    tracing::trace!(len = data.len(), "classifying trust input");

    if data.len() < size_of::<EFI_SIGNATURE_LIST>() {
        return Err(FormatError::TooSmall);
    }

    if let Some(obj) = try_signed_payload(data)? {
        return Ok(obj);
    }

    let der = match X509::from_der(data) {
        Ok(cert) => {
            tracing::debug!("input classified as DER certificate");
            return Ok(TrustObject::Certificate(cert));
        }
        Err(e) => e,
    };

    let pem = match X509::from_pem(data) {
        Ok(cert) => {
            tracing::debug!("input classified as PEM certificate");
            return Ok(TrustObject::Certificate(cert));
        }
        Err(e) => e,
    };

    // PKCS#12 bundles are only accepted with an empty password, matching the
    // bundles this tool writes itself. A bundle that parses without a
    // certificate counts as a failed attempt.
    let pkcs12 = match Pkcs12::from_der(data).and_then(|p| p.parse2("")) {
        Ok(parsed) => match parsed.cert {
            Some(cert) => {
                tracing::debug!("input classified as PKCS#12 bundle");
                return Ok(TrustObject::Certificate(cert));
            }
            None => Pkcs12Error::NoCertificate,
        },
        Err(e) => Pkcs12Error::Parse(e),
    };

    let (header, _) = EFI_SIGNATURE_LIST::read_from_prefix(data).expect("length checked above");
    if header.signature_list_size as usize == data.len() {
        tracing::debug!("input classified as bare signature list");
        return Ok(TrustObject::SignatureList(data.to_vec()));
    }

    Err(FormatError::Unrecognized {
        der,
        pem,
        pkcs12,
        declared_list_size: header.signature_list_size,
        len: data.len(),
    })
}

/// Checks whether `data` is a pre-signed authenticated-variable payload.
///
/// Returns `Ok(None)` if the buffer does not even resemble one. Once the
/// descriptor fields check out the buffer is committed to being a signed
/// payload, and any inconsistency after that is an error rather than a
/// fallthrough to the other formats.
fn try_signed_payload(data: &[u8]) -> Result<Option<TrustObject>, FormatError> {
    let Ok((header, cert_data)) = EFI_VARIABLE_AUTHENTICATION_2::read_from_prefix(data) else {
        return Ok(None);
    };
    if cert_data.len() < 4 {
        return Ok(None);
    }

    let header_ok = header.auth_info.header.revision == 0x0200
        && header.auth_info.header.certificate_type == WIN_CERT_TYPE_EFI_GUID
        && header.auth_info.cert_type == EFI_CERT_TYPE_PKCS7_GUID
        && (header.auth_info.header.length as usize) < data.len();
    if !header_ok {
        return Ok(None);
    }

    // The PKCS#7 signature of any real payload is a DER SEQUENCE with a
    // two-byte length.
    if cert_data[0] != 0x30 || cert_data[1] != 0x82 {
        return Err(FormatError::SignedPayloadNotDer);
    }
    let signature_len = 4 + u16::from_be_bytes([cert_data[2], cert_data[3]]) as usize;

    let lists_offset = size_of::<EFI_VARIABLE_AUTHENTICATION_2>() + signature_len;
    match data.len().checked_sub(lists_offset) {
        Some(rest) if rest >= size_of::<EFI_SIGNATURE_LIST>() => {}
        _ => return Err(FormatError::SignedPayloadNoLists),
    }
    validate_signature_lists(&data[lists_offset..]).map_err(FormatError::SignedPayloadLists)?;

    tracing::debug!(signature_len, "input classified as signed signature list");
    Ok(Some(TrustObject::SignedSignatureList(data.to_vec())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProvisioningContext;
    use crate::credentials::Credentials;
    use crate::signature_list::extend_with_x509_list;
    use guid::Guid;
    use uefi_authvar_specs::time::EFI_TIME;
    use zerocopy::IntoBytes;

    const OWNER: Guid = Guid::from_static_str("7cd33b6f-0bf4-4e6f-aafb-0a8b74efa1cb");

    fn test_cert() -> Credentials {
        crate::entropy::init_entropy().unwrap();
        let ctx = ProvisioningContext::with_timestamp(EFI_TIME {
            year: 2025,
            month: 6,
            day: 1,
            ..EFI_TIME::ZEROED
        });
        Credentials::generate("ClassifyTest", &ctx).unwrap()
    }

    /// Descriptor plus a fake 8-byte "signature" that passes the DER
    /// sniff, with no signature lists after it.
    fn fake_signed_descriptor() -> Vec<u8> {
        let signature = [0x30, 0x82, 0x00, 0x04, 0xaa, 0xbb, 0xcc, 0xdd];
        let mut header = EFI_VARIABLE_AUTHENTICATION_2::unsigned(EFI_TIME::ZEROED);
        header.auth_info.header.length += signature.len() as u32;

        let mut buf = header.as_bytes().to_vec();
        buf.extend(signature);
        buf
    }

    /// A minimal signed payload: fake descriptor, then a real signature list.
    fn fake_signed_payload() -> Vec<u8> {
        let mut buf = fake_signed_descriptor();
        extend_with_x509_list(OWNER, b"not really a cert", &mut buf);
        buf
    }

    #[test]
    fn der_certificate() {
        let der = test_cert().cert().to_der().unwrap();
        assert!(matches!(
            classify(&der).unwrap(),
            TrustObject::Certificate(_)
        ));
    }

    #[test]
    fn pem_certificate() {
        let pem = test_cert().cert().to_pem().unwrap();
        assert!(matches!(
            classify(&pem).unwrap(),
            TrustObject::Certificate(_)
        ));
    }

    #[test]
    fn pkcs12_bundle() {
        let creds = test_cert();
        let bundle = Pkcs12::builder()
            .pkey(creds.key())
            .cert(creds.cert())
            .build2("")
            .unwrap()
            .to_der()
            .unwrap();
        assert!(matches!(
            classify(&bundle).unwrap(),
            TrustObject::Certificate(_)
        ));
    }

    #[test]
    fn pkcs12_without_certificate_falls_through() {
        let creds = test_cert();
        let bundle = Pkcs12::builder()
            .pkey(creds.key())
            .build2("")
            .unwrap()
            .to_der()
            .unwrap();
        assert!(matches!(
            classify(&bundle).unwrap_err(),
            FormatError::Unrecognized {
                pkcs12: Pkcs12Error::NoCertificate,
                ..
            }
        ));
    }

    #[test]
    fn bare_signature_list() {
        let mut buf = Vec::new();
        extend_with_x509_list(OWNER, &test_cert().cert().to_der().unwrap(), &mut buf);
        assert!(matches!(
            classify(&buf).unwrap(),
            TrustObject::SignatureList(_)
        ));
    }

    #[test]
    fn signed_payload_recognized() {
        let buf = fake_signed_payload();
        assert!(matches!(
            classify(&buf).unwrap(),
            TrustObject::SignedSignatureList(_)
        ));
    }

    #[test]
    fn signed_payload_with_two_lists() {
        // The region after the signature may hold several back-to-back
        // lists, the last ending exactly at the buffer end.
        let mut buf = fake_signed_payload();
        extend_with_x509_list(OWNER, b"also not a cert", &mut buf);
        assert!(matches!(
            classify(&buf).unwrap(),
            TrustObject::SignedSignatureList(_)
        ));
    }

    #[test]
    fn signed_payload_with_bad_lists_is_an_error() {
        let mut buf = fake_signed_payload();
        buf.pop();
        assert!(matches!(
            classify(&buf).unwrap_err(),
            FormatError::SignedPayloadLists(ParseError::TruncatedData)
        ));
    }

    #[test]
    fn signed_payload_without_lists_is_an_error() {
        assert!(matches!(
            classify(&fake_signed_descriptor()).unwrap_err(),
            FormatError::SignedPayloadNoLists
        ));
    }

    #[test]
    fn signed_payload_non_der_signature_is_an_error() {
        let mut buf = fake_signed_payload();
        buf[size_of::<EFI_VARIABLE_AUTHENTICATION_2>()] = 0x31;
        assert!(matches!(
            classify(&buf).unwrap_err(),
            FormatError::SignedPayloadNotDer
        ));
    }

    #[test]
    fn back_to_back_bare_lists_are_unrecognized() {
        // A bare list is only accepted when a single list spans the whole
        // buffer.
        let mut buf = Vec::new();
        extend_with_x509_list(OWNER, b"not really a cert", &mut buf);
        extend_with_x509_list(OWNER, b"not really a cert", &mut buf);
        assert!(matches!(
            classify(&buf).unwrap_err(),
            FormatError::Unrecognized { .. }
        ));
    }

    #[test]
    fn garbage_is_unrecognized() {
        assert!(matches!(
            classify(&[0xa5; 64]).unwrap_err(),
            FormatError::Unrecognized { .. }
        ));
    }

    #[test]
    fn short_input_rejected() {
        assert!(matches!(
            classify(&[0; 27]).unwrap_err(),
            FormatError::TooSmall
        ));
    }
}
