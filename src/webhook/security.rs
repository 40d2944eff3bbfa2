//! Signature verification for incoming webhook deliveries.
//!
//! When a signing secret is configured, the call-center signs each delivery
//! with HMAC-SHA256 over the raw body and sends it in the `X-Signature-256`
//! header as `sha256=<hex>`.
//!
//! The signature is computed on the raw body bytes, never on re-serialized
//! JSON, and compared in constant time.

use crate::consts;
use derive_more::{Display, Error};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Display, Error, PartialEq)]
pub enum SignatureError {
    #[display("missing signature header")]
    MissingHeader,
    #[display("signature header must look like 'sha256=<hex>'")]
    BadFormat,
    #[display("signature does not match payload")]
    Mismatch,
}

/// Checks `signature_header` against the HMAC of `payload` under `secret`.
pub fn verify_signature(
    signature_header: Option<&str>,
    payload: &[u8],
    secret: &str,
) -> Result<(), SignatureError> {
    let signature_hex = signature_header
        .ok_or(SignatureError::MissingHeader)?
        .trim()
        .strip_prefix(consts::SIGNATURE_PREFIX)
        .ok_or(SignatureError::BadFormat)?;

    let expected_signature = hex::decode(signature_hex).map_err(|_| SignatureError::BadFormat)?;

    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::Mismatch)?;
    mac.update(payload);
    let computed_signature = mac.finalize().into_bytes();

    if bool::from(computed_signature.ct_eq(&expected_signature[..])) {
        return Ok(());
    }

    Err(SignatureError::Mismatch)
}

/// Header value a sender would attach for `payload`.
#[cfg(test)]
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);

    format!(
        "{}{}",
        consts::SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = br#"{"call_id":"X","talking_time":0}"#;

    #[test]
    fn test_valid_signature() {
        let header = sign(PAYLOAD, "test_secret");
        assert_eq!(
            verify_signature(Some(&header), PAYLOAD, "test_secret"),
            Ok(())
        );
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign(PAYLOAD, "wrong_secret");
        assert_eq!(
            verify_signature(Some(&header), PAYLOAD, "test_secret"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_tampered_payload() {
        let header = sign(PAYLOAD, "test_secret");
        assert_eq!(
            verify_signature(Some(&header), br#"{"call_id":"Y"}"#, "test_secret"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_truncated_signature() {
        let header = sign(PAYLOAD, "test_secret");
        assert_eq!(
            verify_signature(Some(&header[..header.len() - 2]), PAYLOAD, "test_secret"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_bad_header_format() {
        assert_eq!(
            verify_signature(None, PAYLOAD, "test_secret"),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify_signature(Some("abc123"), PAYLOAD, "test_secret"),
            Err(SignatureError::BadFormat)
        );
        assert_eq!(
            verify_signature(Some("sha256=zzzz"), PAYLOAD, "test_secret"),
            Err(SignatureError::BadFormat)
        );
    }
}
