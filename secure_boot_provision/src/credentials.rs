// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Self-signed code-signing credential generation.

use crate::ProvisioningContext;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::pkey::PKeyRef;
use openssl::pkey::Private;
use openssl::rsa::Rsa;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::extension::KeyUsage;
use openssl::x509::extension::SubjectKeyIdentifier;
use openssl::x509::X509;
use openssl::x509::X509NameBuilder;
use openssl::x509::X509Ref;
use thiserror::Error;
use time::OffsetDateTime;
use uefi_authvar_specs::time::EFI_TIME;

/// Years of validity for generated certificates.
pub const CERT_VALIDITY_YEARS: i32 = 30;

/// RSA modulus size for generated keys.
///
/// Secure Boot implementations are only required to support RSA-2048.
pub const RSA_KEY_BITS: u32 = 2048;

/// Errors during credential generation.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// RSA keypair generation failed.
    #[error("generating RSA keypair")]
    GenerateKey(#[source] ErrorStack),
    /// Assembling or signing the certificate failed.
    #[error("building self-signed certificate")]
    BuildCertificate(#[source] ErrorStack),
    /// The session timestamp is not a valid calendar date.
    #[error("session timestamp out of range")]
    Time(#[from] time::Error),
}

/// A signing credential: private key plus matching self-signed certificate.
///
/// The two halves are only handed out together; dropping the struct releases
/// both.
pub struct Credentials {
    key: PKey<Private>,
    cert: X509,
}

impl Credentials {
    /// Generates a fresh RSA keypair and self-signed certificate.
    ///
    /// The certificate is an X.509 v3 CA certificate restricted to
    /// code-signing use: critical basicConstraints CA:TRUE, critical
    /// keyUsage digitalSignature+keyEncipherment, subject == issuer ==
    /// `CN=<subject>`. Validity runs from midnight UTC of the session date
    /// for [`CERT_VALIDITY_YEARS`] years; the serial number is the session
    /// time in Unix seconds.
    pub fn generate(subject: &str, ctx: &ProvisioningContext) -> Result<Self, CredentialError> {
        let rsa = Rsa::generate(RSA_KEY_BITS).map_err(CredentialError::GenerateKey)?;
        let key = PKey::from_rsa(rsa).map_err(CredentialError::GenerateKey)?;

        let datetime = session_datetime(ctx.timestamp())?;
        let serial = datetime.unix_timestamp();
        let (not_before, not_after) = validity_range(datetime, CERT_VALIDITY_YEARS)?;

        let cert = build_certificate(&key, subject, serial, not_before, not_after)
            .map_err(CredentialError::BuildCertificate)?;

        // Self-verification failure is reported but not fatal.
        if !matches!(cert.verify(&key), Ok(true)) {
            tracing::warn!(subject, "generated certificate failed self-verification");
        }

        tracing::info!(subject, serial, "generated signing credential");
        Ok(Self { key, cert })
    }

    /// Rebuilds a credential from parts, e.g. a parsed PKCS#12 bundle.
    pub fn from_parts(key: PKey<Private>, cert: X509) -> Self {
        Self { key, cert }
    }

    /// The private key.
    pub fn key(&self) -> &PKeyRef<Private> {
        &self.key
    }

    /// The certificate.
    pub fn cert(&self) -> &X509Ref {
        &self.cert
    }

    /// Lowercase-hex SHA-256 digest of the DER-encoded certificate.
    pub fn sha256_fingerprint(&self) -> Result<String, ErrorStack> {
        let digest = self.cert.digest(MessageDigest::sha256())?;
        Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
    }
}

/// Interprets the session timestamp as a UTC datetime.
fn session_datetime(now: EFI_TIME) -> Result<OffsetDateTime, time::Error> {
    Ok(OffsetDateTime::from_unix_timestamp(0)?
        .replace_year(now.year as i32)?
        .replace_month(now.month.try_into()?)?
        .replace_day(now.day)?
        .replace_hour(now.hour)?
        .replace_minute(now.minute)?
        .replace_second(now.second)?)
}

/// Computes the [notBefore, notAfter] Unix timestamps: midnight UTC of the
/// session date through `years` years of whole days later, inclusive of the
/// final second.
fn validity_range(datetime: OffsetDateTime, years: i32) -> Result<(i64, i64), time::Error> {
    let start = datetime.replace_hour(0)?.replace_minute(0)?.replace_second(0)?;
    let days = 365 * years as i64 + leap_days(start.year(), start.month().into(), years) as i64;
    let not_before = start.unix_timestamp();
    Ok((not_before, not_before + days * 86400 - 1))
}

/// Number of February 29ths covered by a `years`-long window opening in
/// `month` of `start_year`: every leap year strictly inside the window
/// counts, the first year only when the window opens before March, and the
/// last year only when it opens after February.
fn leap_days(start_year: i32, month: u8, years: i32) -> u32 {
    let mut leap_days = 0;
    for i in 0..years {
        if !time::util::is_leap_year(start_year + i) {
            continue;
        }
        if (i != 0 && i != years - 1) || (i == 0 && month < 3) || (i == years - 1 && month > 2) {
            leap_days += 1;
        }
    }
    leap_days
}

fn build_certificate(
    key: &PKeyRef<Private>,
    subject: &str,
    serial: i64,
    not_before: i64,
    not_after: i64,
) -> Result<X509, ErrorStack> {
    let name = {
        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_text("CN", subject)?;
        name.build()
    };

    let serial = BigNum::from_slice(&serial.to_be_bytes())?.to_asn1_integer()?;

    let mut builder = X509::builder()?;
    // Version value 2 encodes X.509 v3.
    builder.set_version(2)?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(key)?;
    let not_before = Asn1Time::from_unix(not_before)?;
    builder.set_not_before(&not_before)?;
    let not_after = Asn1Time::from_unix(not_after)?;
    builder.set_not_after(&not_after)?;

    builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()?,
    )?;
    let skid = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
    builder.append_extension(skid)?;

    builder.sign(key, MessageDigest::sha256())?;
    Ok(builder.build())
}
