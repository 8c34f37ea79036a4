//! OCSP (Online Certificate Status Protocol) Support - RFC 6960
//!
//! Request building, response parsing and the HTTP transport for asking a
//! responder about one certificate.
//!
//! ## ASN.1 Structures (RFC 6960):
//!
//! ```asn1
//! OCSPRequest ::= SEQUENCE {
//!     tbsRequest      TBSRequest,
//!     optionalSignature   [0] EXPLICIT Signature OPTIONAL
//! }
//!
//! TBSRequest ::= SEQUENCE {
//!     version             [0] EXPLICIT Version DEFAULT v1,
//!     requestorName       [1] EXPLICIT GeneralName OPTIONAL,
//!     requestList         SEQUENCE OF Request,
//!     requestExtensions   [2] EXPLICIT Extensions OPTIONAL
//! }
//!
//! CertID ::= SEQUENCE {
//!     hashAlgorithm       AlgorithmIdentifier,
//!     issuerNameHash      OCTET STRING,
//!     issuerKeyHash       OCTET STRING,
//!     serialNumber        INTEGER
//! }
//!
//! OCSPResponse ::= SEQUENCE {
//!     responseStatus      OCSPResponseStatus,
//!     responseBytes       [0] EXPLICIT ResponseBytes OPTIONAL
//! }
//!
//! ResponseData ::= SEQUENCE {
//!     version             [0] EXPLICIT Version DEFAULT v1,
//!     responderID         ResponderID,
//!     producedAt          GeneralizedTime,
//!     responses           SEQUENCE OF SingleResponse,
//!     responseExtensions  [1] EXPLICIT Extensions OPTIONAL
//! }
//!
//! SingleResponse ::= SEQUENCE {
//!     certID              CertID,
//!     certStatus          CertStatus,
//!     thisUpdate          GeneralizedTime,
//!     nextUpdate          [0] EXPLICIT GeneralizedTime OPTIONAL,
//!     singleExtensions    [1] EXPLICIT Extensions OPTIONAL
//! }
//!
//! CertStatus ::= CHOICE {
//!     good                [0] IMPLICIT NULL,
//!     revoked             [1] IMPLICIT RevokedInfo,
//!     unknown             [2] IMPLICIT UnknownInfo
//! }
//! ```
//!
//! Requests are unsigned and carry a single CertID hashed with SHA-1, which
//! is what deployed responders universally accept. Response signatures are
//! not verified; the responder is reached over the configured URL only.

use crate::certificate::Certificate;
use crate::revocation::error::RevocationError;
use der_parser::ber::BerObjectContent;
use der_parser::der::DerObject;
use sha1::{Digest, Sha1};
use std::time::Duration;
use tracing::debug;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::oid_registry::asn1_rs::{oid, Class};
use x509_parser::prelude::*;

/// OCSP response status (RFC 6960 Section 2.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcspResponseStatus {
    /// Response has valid confirmations
    Successful = 0,
    /// Illegal confirmation request
    MalformedRequest = 1,
    /// Internal error in issuer
    InternalError = 2,
    /// Try again later
    TryLater = 3,
    /// Must sign the request
    SigRequired = 5,
    /// Request unauthorized
    Unauthorized = 6,
}

impl OcspResponseStatus {
    pub fn from_code(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Successful),
            1 => Some(Self::MalformedRequest),
            2 => Some(Self::InternalError),
            3 => Some(Self::TryLater),
            5 => Some(Self::SigRequired),
            6 => Some(Self::Unauthorized),
            _ => None,
        }
    }
}

/// Certificate status of one SingleResponse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStatus {
    /// Certificate is not revoked
    Good,
    /// Certificate has been revoked
    Revoked,
    /// Responder does not know the certificate
    Unknown,
}

/// OCSP request builder
///
/// Builds a minimal unsigned OCSP request for a single certificate.
pub struct OcspRequestBuilder {
    /// Certificate serial number to check
    serial_number: Vec<u8>,
    /// Issuer name hash (SHA-1)
    issuer_name_hash: Vec<u8>,
    /// Issuer public key hash (SHA-1)
    issuer_key_hash: Vec<u8>,
}

impl OcspRequestBuilder {
    /// Bind `cert`'s serial number to `issuer`'s identity
    ///
    /// The issuer name hash covers the DER of the issuer's subject; the key
    /// hash covers the issuer public key BIT STRING contents (no tag, length
    /// or unused-bits byte).
    pub fn new(cert: &Certificate, issuer: &Certificate) -> Result<Self, RevocationError> {
        let issuer_parsed = issuer.parsed()?;

        let issuer_name_hash = sha1_digest(issuer_parsed.subject().as_raw());
        let issuer_key_hash = sha1_digest(&issuer_parsed.public_key().subject_public_key.data);

        Ok(Self {
            serial_number: cert.serial().to_vec(),
            issuer_name_hash,
            issuer_key_hash,
        })
    }

    /// Build the OCSP request as DER-encoded bytes
    pub fn build(&self) -> Vec<u8> {
        // Inside out: CertID -> Request -> requestList -> TBSRequest -> OCSPRequest
        let cert_id = self.build_cert_id();
        let request = der_sequence(&cert_id);
        let request_list = der_sequence(&request);
        let tbs_request = der_sequence(&request_list);
        der_sequence(&tbs_request)
    }

    fn build_cert_id(&self) -> Vec<u8> {
        let mut cert_id = Vec::new();

        // hashAlgorithm: SEQUENCE { OID 1.3.14.3.2.26 (SHA-1), NULL }
        let mut hash_algo_content = Vec::new();
        hash_algo_content.extend_from_slice(&der_oid(&[1, 3, 14, 3, 2, 26]));
        hash_algo_content.extend_from_slice(&der_null());
        cert_id.extend_from_slice(&der_sequence(&hash_algo_content));

        cert_id.extend_from_slice(&der_octet_string(&self.issuer_name_hash));
        cert_id.extend_from_slice(&der_octet_string(&self.issuer_key_hash));
        cert_id.extend_from_slice(&der_integer(&self.serial_number));

        cert_id
    }
}

fn sha1_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

// ============================================================================
// DER Encoding Helpers
// ============================================================================

fn der_sequence(contents: &[u8]) -> Vec<u8> {
    der_tlv(0x30, contents)
}

fn der_octet_string(contents: &[u8]) -> Vec<u8> {
    der_tlv(0x04, contents)
}

/// Encode an INTEGER from big-endian magnitude bytes
///
/// Serial numbers taken from certificates are already minimal two's
/// complement; a leading 0x00 is added only when the high bit is set.
fn der_integer(value: &[u8]) -> Vec<u8> {
    let mut int_value = value.to_vec();
    if int_value.is_empty() {
        int_value.push(0x00);
    } else if int_value[0] & 0x80 != 0 {
        int_value.insert(0, 0x00);
    }
    der_tlv(0x02, &int_value)
}

fn der_oid(components: &[u64]) -> Vec<u8> {
    if components.len() < 2 {
        return der_tlv(0x06, &[]);
    }

    // First two components are encoded as 40*v1 + v2
    let mut encoded = encode_base128(40 * components[0] + components[1]);
    for &component in &components[2..] {
        encoded.extend_from_slice(&encode_base128(component));
    }

    der_tlv(0x06, &encoded)
}

fn der_null() -> Vec<u8> {
    vec![0x05, 0x00]
}

fn der_tlv(tag: u8, contents: &[u8]) -> Vec<u8> {
    let mut result = vec![tag];
    result.extend_from_slice(&der_length(contents.len()));
    result.extend_from_slice(contents);
    result
}

fn der_length(length: usize) -> Vec<u8> {
    if length < 128 {
        vec![length as u8]
    } else {
        let mut length_bytes = Vec::new();
        let mut len = length;
        while len > 0 {
            length_bytes.insert(0, (len & 0xFF) as u8);
            len >>= 8;
        }
        let mut result = vec![0x80 | length_bytes.len() as u8];
        result.extend_from_slice(&length_bytes);
        result
    }
}

/// Base-128 with continuation bits, for OID arcs
fn encode_base128(mut value: u64) -> Vec<u8> {
    let mut result = vec![(value & 0x7F) as u8];
    value >>= 7;

    while value > 0 {
        result.insert(0, ((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }

    result
}

/// Parsed OCSP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspResponse {
    pub status: OcspResponseStatus,
    /// certStatus of every SingleResponse, in response order
    pub cert_statuses: Vec<CertificateStatus>,
}

impl OcspResponse {
    /// Parse an OCSP response from DER-encoded bytes
    pub fn parse(der_bytes: &[u8]) -> Result<Self, RevocationError> {
        let (_, outer) = der_parser::parse_der(der_bytes).map_err(|e| {
            RevocationError::ParseError(format!("Failed to parse OCSP response: {:?}", e))
        })?;
        let outer = as_sequence(&outer, "OCSPResponse")?;

        let status_code = match outer.first().map(|o| &o.content) {
            Some(BerObjectContent::Enum(code)) => *code,
            _ => {
                return Err(RevocationError::ParseError(
                    "OCSP responseStatus is not ENUMERATED".to_string(),
                ))
            }
        };
        let status = OcspResponseStatus::from_code(status_code).ok_or_else(|| {
            RevocationError::ParseError(format!("Unknown OCSP response status: {}", status_code))
        })?;

        if status != OcspResponseStatus::Successful {
            return Ok(Self {
                status,
                cert_statuses: Vec::new(),
            });
        }

        // responseBytes [0] EXPLICIT ResponseBytes
        let tagged = outer
            .get(1)
            .filter(|o| is_context_tag(o, 0))
            .ok_or_else(|| {
                RevocationError::ParseError("OCSP response missing responseBytes".to_string())
            })?;
        let explicit_content = tagged.as_slice().map_err(|_| {
            RevocationError::ParseError("responseBytes has no content".to_string())
        })?;

        let (_, response_bytes) = der_parser::parse_der(explicit_content).map_err(|e| {
            RevocationError::ParseError(format!("Failed to parse ResponseBytes: {:?}", e))
        })?;
        let response_bytes = as_sequence(&response_bytes, "ResponseBytes")?;
        if response_bytes.len() < 2 {
            return Err(RevocationError::ParseError(
                "ResponseBytes SEQUENCE too short".to_string(),
            ));
        }

        let response_type = response_bytes[0]
            .as_oid()
            .map_err(|_| RevocationError::ParseError("Invalid responseType OID".to_string()))?;
        if *response_type != oid!(1.3.6.1.5.5.7.48.1.1) {
            return Err(RevocationError::ParseError(format!(
                "Unsupported OCSP response type: {}",
                response_type
            )));
        }

        let basic_bytes = response_bytes[1]
            .as_slice()
            .map_err(|_| RevocationError::ParseError("Invalid response OCTET STRING".to_string()))?;
        let (_, basic) = der_parser::parse_der(basic_bytes).map_err(|e| {
            RevocationError::ParseError(format!("Failed to parse BasicOCSPResponse: {:?}", e))
        })?;
        let basic = as_sequence(&basic, "BasicOCSPResponse")?;
        let tbs_response_data = basic
            .first()
            .ok_or_else(|| RevocationError::ParseError("BasicOCSPResponse is empty".to_string()))
            .and_then(|tbs| as_sequence(tbs, "ResponseData"))?;

        // Skip optional version [0], responderID and producedAt
        let mut idx = 0;
        if tbs_response_data.first().is_some_and(|v| is_context_tag(v, 0)) {
            idx += 1;
        }
        idx += 2;

        let responses = tbs_response_data
            .get(idx)
            .ok_or_else(|| RevocationError::ParseError("ResponseData missing responses".to_string()))
            .and_then(|r| as_sequence(r, "responses"))?;

        let cert_statuses = responses
            .iter()
            .map(|single| {
                let single = as_sequence(single, "SingleResponse")?;
                let cert_status = single.get(1).ok_or_else(|| {
                    RevocationError::ParseError("SingleResponse missing certStatus".to_string())
                })?;
                parse_cert_status(cert_status)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            status,
            cert_statuses,
        })
    }

    /// Reduce the response to "confirmed good" or not
    ///
    /// - `successful`: positive if any SingleResponse reports good
    /// - `malformedRequest`: negative
    /// - any other status: error, the responder could not answer
    pub fn is_positive(&self) -> Result<bool, RevocationError> {
        match self.status {
            OcspResponseStatus::Successful => Ok(self
                .cert_statuses
                .iter()
                .any(|s| *s == CertificateStatus::Good)),
            OcspResponseStatus::MalformedRequest => Ok(false),
            other => Err(RevocationError::OcspStatus(other)),
        }
    }

    pub fn has_revoked_entry(&self) -> bool {
        self.cert_statuses.contains(&CertificateStatus::Revoked)
    }
}

fn as_sequence<'a, 'b>(
    obj: &'b DerObject<'a>,
    what: &str,
) -> Result<&'b Vec<DerObject<'a>>, RevocationError> {
    obj.as_sequence()
        .map_err(|_| RevocationError::ParseError(format!("{} is not a SEQUENCE", what)))
}

fn is_context_tag(obj: &DerObject<'_>, tag: u32) -> bool {
    obj.header.class() == Class::ContextSpecific && obj.header.tag().0 == tag
}

fn parse_cert_status(der: &DerObject<'_>) -> Result<CertificateStatus, RevocationError> {
    if der.header.class() != Class::ContextSpecific {
        return Err(RevocationError::ParseError(format!(
            "certStatus has unexpected tag {:?}",
            der.header.tag()
        )));
    }

    match der.header.tag().0 {
        0 => Ok(CertificateStatus::Good),
        1 => Ok(CertificateStatus::Revoked),
        2 => Ok(CertificateStatus::Unknown),
        n => Err(RevocationError::ParseError(format!(
            "Unknown CertStatus tag: [{}]",
            n
        ))),
    }
}

/// Locate the OCSP responder URL in a certificate's AIA extension
pub fn extract_ocsp_url(cert: &X509Certificate<'_>) -> Option<String> {
    let ocsp_method = oid!(1.3.6.1.5.5.7.48.1);

    cert.extensions()
        .iter()
        .filter_map(|ext| match ext.parsed_extension() {
            ParsedExtension::AuthorityInfoAccess(aia) => Some(aia),
            _ => None,
        })
        .flat_map(|aia| aia.accessdescs.iter())
        .filter(|desc| desc.access_method == ocsp_method)
        .find_map(|desc| match &desc.access_location {
            GeneralName::URI(uri) => Some(uri.to_string()),
            _ => None,
        })
}

/// OCSP client for querying responders
#[derive(Debug, Clone)]
pub struct OcspClient {
    http_client: reqwest::Client,
    max_response_size: usize,
}

impl OcspClient {
    pub fn new(timeout: Duration, max_response_size: usize) -> Result<Self, RevocationError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                RevocationError::HttpError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            max_response_size,
        })
    }

    /// POST a DER request and return the raw DER response
    pub async fn query(&self, url: &str, request: Vec<u8>) -> Result<Vec<u8>, RevocationError> {
        debug!(url = %url, size = request.len(), "Sending OCSP request");

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/ocsp-request")
            .header("Accept", "application/ocsp-response")
            .body(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RevocationError::HttpError(format!(
                "OCSP responder returned HTTP {}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_response_size {
                return Err(RevocationError::ResponseTooLarge(
                    length as usize,
                    self.max_response_size,
                ));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() > self.max_response_size {
            return Err(RevocationError::ResponseTooLarge(
                bytes.len(),
                self.max_response_size,
            ));
        }

        Ok(bytes.to_vec())
    }

    /// Build, send and parse one request for `cert` issued by `issuer`
    pub async fn check(
        &self,
        url: &str,
        cert: &Certificate,
        issuer: &Certificate,
    ) -> Result<OcspResponse, RevocationError> {
        let request = OcspRequestBuilder::new(cert, issuer)?.build();
        let response = self.query(url, request).await?;
        OcspResponse::parse(&response)
    }
}
