// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Parse and emit `EFI_SIGNATURE_LIST` chains.
//!
//! A Secure Boot database variable holds zero or more signature lists laid
//! out back to back. Each list declares its own total size, a per-entry size,
//! and a signature type GUID; entries are an owner GUID followed by
//! type-specific data (a whole DER certificate for X509 lists, a digest for
//! SHA-256 lists).

use guid::Guid;
use thiserror::Error;
use uefi_authvar_specs::nvram::signature_list::EFI_CERT_X509_GUID;
use uefi_authvar_specs::nvram::signature_list::EFI_SIGNATURE_DATA;
use uefi_authvar_specs::nvram::signature_list::EFI_SIGNATURE_LIST;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

/// Errors encountered while parsing a signature list buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("could not read signature list header")]
    InvalidHeader,
    #[error("signature_list_size {0} is smaller than the list header")]
    InvalidListSize(u32),
    #[error("buffer contains less data than specified in EFI_SIGNATURE_LIST header")]
    TruncatedData,
    #[error("signature_size {0} is smaller than an entry header")]
    InvalidSignatureSize(u32),
    #[error("unexpected end of buffer while reading EFI_SIGNATURE_DATA")]
    TruncatedSignatureData,
}

/// Appends a single-certificate X509 signature list to `res`.
///
/// Certificate lists carry exactly one entry in practice: entries within a
/// list share one declared size, and two DER certificates almost never have
/// identical lengths.
pub fn extend_with_x509_list(owner: Guid, cert_der: &[u8], res: &mut Vec<u8>) {
    let signature_size = size_of::<EFI_SIGNATURE_DATA>() + cert_der.len();
    let header = EFI_SIGNATURE_LIST {
        signature_type: EFI_CERT_X509_GUID,
        signature_list_size: (size_of::<EFI_SIGNATURE_LIST>() + signature_size) as u32,
        signature_header_size: 0, // always zero
        signature_size: signature_size as u32,
    };
    res.extend(header.as_bytes());
    res.extend(
        EFI_SIGNATURE_DATA {
            signature_owner: owner,
        }
        .as_bytes(),
    );
    res.extend(cert_der);
}

/// A parsed view of one signature list: the header, plus the raw entry
/// region it declared.
#[derive(Debug, PartialEq, Eq)]
pub struct SignatureList<'a> {
    pub header: EFI_SIGNATURE_LIST,
    pub data: &'a [u8],
}

impl<'a> SignatureList<'a> {
    /// Iterates over the list's `EFI_SIGNATURE_DATA` entries.
    pub fn entries(&self) -> Result<ParseSignatureData<'a>, ParseError> {
        let signature_size = self.header.signature_size as usize;
        if signature_size < size_of::<EFI_SIGNATURE_DATA>() {
            return Err(ParseError::InvalidSignatureSize(self.header.signature_size));
        }
        Ok(ParseSignatureData {
            buf: self.data,
            signature_size,
        })
    }
}

/// One `EFI_SIGNATURE_DATA` entry: the owner GUID, and the type-specific
/// signature bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct SignatureData<'a> {
    pub owner: Guid,
    pub data: &'a [u8],
}

/// Iterator over the signature lists laid out back to back in a buffer.
pub struct ParseSignatureLists<'a> {
    buf: &'a [u8],
}

impl<'a> ParseSignatureLists<'a> {
    /// Creates a parser over `buf`.
    pub fn new(buf: &'a [u8]) -> ParseSignatureLists<'a> {
        ParseSignatureLists { buf }
    }

    fn next_inner(&mut self) -> Result<Option<SignatureList<'a>>, ParseError> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let (header, buf) =
            EFI_SIGNATURE_LIST::read_from_prefix(self.buf).map_err(|_| ParseError::InvalidHeader)?;

        // A list must at least cover its own header, or the walk could never
        // advance.
        let Some(expected_data_len) =
            (header.signature_list_size as usize).checked_sub(size_of::<EFI_SIGNATURE_LIST>())
        else {
            return Err(ParseError::InvalidListSize(header.signature_list_size));
        };
        if buf.len() < expected_data_len {
            return Err(ParseError::TruncatedData);
        }
        let (data, buf) = buf.split_at(expected_data_len);

        self.buf = buf;
        Ok(Some(SignatureList { header, data }))
    }
}

impl<'a> Iterator for ParseSignatureLists<'a> {
    type Item = Result<SignatureList<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_inner().transpose()
    }
}

/// Iterator over the entries of a single signature list.
pub struct ParseSignatureData<'a> {
    buf: &'a [u8],
    signature_size: usize,
}

impl<'a> ParseSignatureData<'a> {
    fn next_inner(&mut self) -> Result<Option<SignatureData<'a>>, ParseError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        if self.buf.len() < self.signature_size {
            return Err(ParseError::TruncatedSignatureData);
        }
        let (entry, buf) = self.buf.split_at(self.signature_size);
        let (header, data) =
            EFI_SIGNATURE_DATA::read_from_prefix(entry).expect("entry size validated in entries()");

        self.buf = buf;
        Ok(Some(SignatureData {
            owner: header.signature_owner,
            data,
        }))
    }
}

impl<'a> Iterator for ParseSignatureData<'a> {
    type Item = Result<SignatureData<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_inner().transpose()
    }
}

/// Walks `buf` as a chain of signature lists, checking that the declared
/// list sizes tile the buffer exactly.
///
/// Entry-level consistency is left to consumers that actually read entries;
/// firmware performs its own validation when the variable is written.
pub fn validate_signature_lists(buf: &[u8]) -> Result<(), ParseError> {
    for list in ParseSignatureLists::new(buf) {
        list?;
    }
    Ok(())
}
