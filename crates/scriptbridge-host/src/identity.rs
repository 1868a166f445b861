//! Caller identity extraction.
//!
//! The transaction submitter arrives as an opaque creator blob: an X.509
//! certificate in PEM form embedded somewhere inside a binary envelope.
//! The PEM boundary markers locate the certificate; the parsed form then
//! yields a stable identifier (SHA-256 of the DER bytes), the subject
//! common name, and an issuer fingerprint (SHA-256 of the raw issuer DER).
//!
//! One special case is inherited from the business-logic contract:
//! identities whose common name contains "admin" (case-insensitive)
//! report no name at all, which downstream logic reads as unrestricted
//! authority.

use std::sync::Arc;

use scriptbridge_common::error::ServiceError;
use scriptbridge_common::ledger::LedgerStub;
use scriptbridge_core::Args;
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;

use crate::registry::{ServiceObject, ServiceReply};

const PEM_BEGIN: &[u8] = b"-----BEGIN CERTIFICATE-----";
const PEM_END: &[u8] = b"-----END CERTIFICATE-----";

pub struct IdentityService {
    stub: Arc<dyn LedgerStub>,
}

impl IdentityService {
    pub fn new(stub: Arc<dyn LedgerStub>) -> Self {
        Self { stub }
    }

    fn with_certificate<T>(
        &self,
        f: impl FnOnce(&[u8], &X509Certificate<'_>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let creator = self.stub.creator()?;
        let block = extract_pem_block(&creator).ok_or_else(|| {
            ServiceError::failed("No certificate found in creator identity")
        })?;
        let (_, pem) = parse_x509_pem(block).map_err(|err| {
            ServiceError::failed(format!("Failed to decode creator certificate: {err}"))
        })?;
        let (_, certificate) = X509Certificate::from_der(&pem.contents).map_err(|err| {
            ServiceError::failed(format!("Failed to parse creator certificate: {err}"))
        })?;
        f(&pem.contents, &certificate)
    }

    fn get_identifier(&self) -> Result<ServiceReply, ServiceError> {
        self.with_certificate(|der, _| Ok(ServiceReply::text(hex_digest(der))))
    }

    /// The subject common name, or no value at all for administrators.
    fn get_name(&self) -> Result<ServiceReply, ServiceError> {
        self.with_certificate(|_, certificate| {
            let common_name = certificate
                .subject()
                .iter_common_name()
                .next()
                .ok_or_else(|| {
                    ServiceError::failed("No common name in creator certificate")
                })?
                .as_str()
                .map_err(|err| {
                    ServiceError::failed(format!(
                        "Failed to read common name from creator certificate: {err}"
                    ))
                })?;

            if common_name.to_lowercase().contains("admin") {
                Ok(ServiceReply::Unit)
            } else {
                Ok(ServiceReply::text(common_name))
            }
        })
    }

    fn get_issuer(&self) -> Result<ServiceReply, ServiceError> {
        self.with_certificate(|_, certificate| {
            Ok(ServiceReply::text(hex_digest(
                certificate.tbs_certificate.issuer.as_raw(),
            )))
        })
    }
}

impl ServiceObject for IdentityService {
    fn invoke(&self, method: &str, _args: Args<'_>) -> Result<ServiceReply, ServiceError> {
        match method {
            "get_identifier" => self.get_identifier(),
            "get_name" => self.get_name(),
            "get_issuer" => self.get_issuer(),
            other => Err(ServiceError::violation(format!(
                "unknown identity service method '{other}'"
            ))),
        }
    }
}

impl std::fmt::Debug for IdentityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityService").finish_non_exhaustive()
    }
}

/// Locates the PEM certificate block inside the creator envelope.
fn extract_pem_block(creator: &[u8]) -> Option<&[u8]> {
    let start = find_subsequence(creator, PEM_BEGIN)?;
    let end = find_subsequence(&creator[start..], PEM_END)? + start + PEM_END.len();
    Some(&creator[start..end])
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
