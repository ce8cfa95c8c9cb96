//! Standard Webhooks signature verification (HMAC-SHA256).
//!
//! The provider signs `"{webhook-id}.{webhook-timestamp}.{body}"` with a
//! base64 secret and sends `webhook-signature: v1,<base64> [v1,<base64> ...]`.

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefixes the provider puts in front of the base64 key material.
const SECRET_PREFIXES: [&str; 2] = ["whsec_", "polar_whs_"];

#[derive(Debug, Error)]
pub enum SignatureError {
  #[error("webhook secret is not valid base64: {0}")]
  InvalidSecret(#[from] base64::DecodeError),

  #[error("webhook secret cannot key an HMAC")]
  InvalidKey,

  #[error("webhook-timestamp is not a unix timestamp")]
  InvalidTimestamp,

  #[error("webhook-timestamp is {skew_secs}s away from now")]
  OutsideTolerance { skew_secs: i64 },

  #[error("no v1 signature matched")]
  NoMatch,
}

/// Strip a known prefix and base64-decode the remaining key.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, SignatureError> {
  let key = SECRET_PREFIXES
    .iter()
    .find_map(|prefix| secret.strip_prefix(prefix))
    .unwrap_or(secret);
  Ok(B64.decode(key.trim())?)
}

/// The bytes that get signed: `id.timestamp.body`.
pub fn signed_payload(id: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
  let mut payload = Vec::with_capacity(id.len() + timestamp.len() + body.len() + 2);
  payload.extend_from_slice(id.as_bytes());
  payload.push(b'.');
  payload.extend_from_slice(timestamp.as_bytes());
  payload.push(b'.');
  payload.extend_from_slice(body);
  payload
}

fn keyed_mac(key: &[u8], payload: &[u8]) -> Result<HmacSha256, SignatureError> {
  let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
  mac.update(payload);
  Ok(mac)
}

/// Base64 HMAC-SHA256 of `payload` under `key`.
pub fn sign(key: &[u8], payload: &[u8]) -> Result<String, SignatureError> {
  let mac = keyed_mac(key, payload)?;
  Ok(B64.encode(mac.finalize().into_bytes()))
}

/// Check the signature header against the body. Passes if any `v1` entry
/// matches; other versions and undecodable entries are skipped.
pub fn verify(
  secret:    &str,
  id:        &str,
  timestamp: &str,
  body:      &[u8],
  header:    &str,
) -> Result<(), SignatureError> {
  let key = decode_secret(secret)?;
  let mac = keyed_mac(&key, &signed_payload(id, timestamp, body))?;

  let matched = header
    .split_whitespace()
    .filter_map(|entry| entry.split_once(','))
    .filter(|(version, _)| *version == "v1")
    .filter_map(|(_, sig)| B64.decode(sig).ok())
    .any(|sig| mac.clone().verify_slice(&sig).is_ok());

  if matched { Ok(()) } else { Err(SignatureError::NoMatch) }
}

/// Reject deliveries whose timestamp is further than `tolerance_secs` from
/// `now_secs`. A tolerance of zero disables the check.
pub fn check_timestamp(
  timestamp:      &str,
  now_secs:       i64,
  tolerance_secs: u64,
) -> Result<(), SignatureError> {
  if tolerance_secs == 0 {
    return Ok(());
  }
  let sent: i64 = timestamp
    .trim()
    .parse()
    .map_err(|_| SignatureError::InvalidTimestamp)?;
  let skew_secs = now_secs.saturating_sub(sent);
  if skew_secs.unsigned_abs() > tolerance_secs {
    return Err(SignatureError::OutsideTolerance { skew_secs });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  // "Jefe" base64-encoded; RFC 4231 test case 2.
  const RFC_SECRET: &str = "whsec_SmVmZQ==";

  #[test]
  fn rfc4231_test_vector() {
    let key = decode_secret(RFC_SECRET).unwrap();
    assert_eq!(key, b"Jefe");
    let sig = sign(&key, b"what do ya want for nothing?").unwrap();
    assert_eq!(
      hex::encode(B64.decode(sig).unwrap()),
      "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
    );
  }

  #[test]
  fn both_prefixes_and_bare_keys_decode() {
    assert_eq!(decode_secret("polar_whs_SmVmZQ==").unwrap(), b"Jefe");
    assert_eq!(decode_secret("SmVmZQ==").unwrap(), b"Jefe");
    assert!(matches!(
      decode_secret("whsec_not base64!"),
      Err(SignatureError::InvalidSecret(_))
    ));
  }

  fn header_for(body: &[u8]) -> String {
    let key = decode_secret(RFC_SECRET).unwrap();
    let sig = sign(&key, &signed_payload("msg_1", "1700000000", body)).unwrap();
    format!("v1,{sig}")
  }

  #[test]
  fn signed_body_verifies() {
    let body = br#"{"type":"subscription.created"}"#;
    verify(RFC_SECRET, "msg_1", "1700000000", body, &header_for(body)).unwrap();
  }

  #[test]
  fn tampered_body_fails() {
    let body = br#"{"type":"subscription.created"}"#;
    let header = header_for(body);
    let tampered = br#"{"type":"subscription.createD"}"#;
    assert!(matches!(
      verify(RFC_SECRET, "msg_1", "1700000000", tampered, &header),
      Err(SignatureError::NoMatch)
    ));
  }

  #[test]
  fn changed_id_or_timestamp_fails() {
    let body = b"{}";
    let header = header_for(body);
    assert!(verify(RFC_SECRET, "msg_2", "1700000000", body, &header).is_err());
    assert!(verify(RFC_SECRET, "msg_1", "1700000001", body, &header).is_err());
  }

  #[test]
  fn entry_without_version_fails() {
    let body = b"{}";
    let header = header_for(body);
    let bare = header.trim_start_matches("v1,");
    assert!(verify(RFC_SECRET, "msg_1", "1700000000", body, bare).is_err());
    let wrong_version = header.replacen("v1,", "v2,", 1);
    assert!(verify(RFC_SECRET, "msg_1", "1700000000", body, &wrong_version).is_err());
  }

  #[test]
  fn any_matching_entry_is_enough() {
    let body = b"{}";
    let header = format!("v1,AAAA v1a,xyz {}", header_for(body));
    verify(RFC_SECRET, "msg_1", "1700000000", body, &header).unwrap();
  }

  #[test]
  fn timestamp_window() {
    let now = 1_700_000_000;
    check_timestamp("1700000000", now, 300).unwrap();
    check_timestamp("1699999800", now, 300).unwrap();
    assert!(matches!(
      check_timestamp("1699999000", now, 300),
      Err(SignatureError::OutsideTolerance { skew_secs: 1000 })
    ));
    assert!(matches!(
      check_timestamp("1700001000", now, 300),
      Err(SignatureError::OutsideTolerance { skew_secs: -1000 })
    ));
    assert!(matches!(
      check_timestamp("yesterday", now, 300),
      Err(SignatureError::InvalidTimestamp)
    ));
    check_timestamp("0", now, 0).unwrap();
  }
}
