//! Request signing
//!
//! Signed endpoints require two headers derived from the request body:
//! a wall-clock millisecond timestamp and an ECDSA-P256 signature over
//! `timestamp + "." + json_body`, hashed with SHA-512. The curve
//! operation produces a raw 64-byte `r||s` (IEEE P1363) signature which
//! the backend expects re-encoded as ASN.1 DER
//! `SEQUENCE { INTEGER r, INTEGER s }`, then base64.
//!
//! The web-login flow is never signed; the device-pairing flow is. The
//! key lives in a [`DeviceKeyPair`]; persisting it is the caller's
//! concern.

use base64::Engine as _;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde_json::Value;
use sha2::{Digest, Sha512};

use crate::error::{Result, ZetaError};

/// Length of a raw P1363 signature for P-256: 32 bytes `r`, 32 bytes `s`.
const P1363_LEN: usize = 64;

/// The two header values attached to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// Wall-clock milliseconds as decimal text.
    pub timestamp: String,
    /// Base64 of the DER-encoded ECDSA signature.
    pub signature: String,
}

/// An ECDSA P-256 device key pair.
///
/// Generated once during device pairing; the private half signs request
/// payloads, the public half is uploaded to the backend.
pub struct DeviceKeyPair {
    signing: SigningKey,
}

impl std::fmt::Debug for DeviceKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("DeviceKeyPair").finish_non_exhaustive()
    }
}

impl DeviceKeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::random(&mut rand_core::OsRng),
        }
    }

    /// Import a key pair from the 32-byte private scalar.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Signing`] when the bytes are not a valid
    /// P-256 scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let signing = SigningKey::from_slice(bytes)
            .map_err(|e| ZetaError::Signing(format!("invalid private key bytes: {e}")))?;
        Ok(Self { signing })
    }

    /// Export the 32-byte private scalar. Callers own persistence.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.signing.to_bytes().to_vec()
    }

    /// The public key as base64 of the uncompressed SEC1 point, the
    /// format the pairing endpoint expects.
    pub fn public_key_base64(&self) -> String {
        let point = VerifyingKey::from(&self.signing).to_encoded_point(false);
        base64::engine::general_purpose::STANDARD.encode(point.as_bytes())
    }

    /// Borrow the signing key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }
}

/// Sign `payload` with the current wall-clock timestamp.
///
/// # Errors
///
/// Returns [`ZetaError::Signing`] if the curve operation fails and
/// [`ZetaError::Serialization`] if the payload cannot be serialized.
pub fn sign_payload(key: &SigningKey, payload: &Value) -> Result<SignedPayload> {
    sign_payload_at(key, chrono::Utc::now().timestamp_millis(), payload)
}

/// Sign `payload` with an explicit millisecond timestamp.
///
/// The signed message is the UTF-8 bytes of
/// `timestamp + "." + compact_json(payload)`.
pub fn sign_payload_at(key: &SigningKey, timestamp_ms: i64, payload: &Value) -> Result<SignedPayload> {
    let timestamp = timestamp_ms.to_string();
    let message = format!("{timestamp}.{}", serde_json::to_string(payload)?);
    let digest = Sha512::digest(message.as_bytes());

    let signature: Signature = key
        .sign_prehash(digest.as_slice())
        .map_err(|e| ZetaError::Signing(format!("ecdsa signing failed: {e}")))?;

    let der = p1363_to_der(signature.to_bytes().as_slice())?;
    Ok(SignedPayload {
        timestamp,
        signature: base64::engine::general_purpose::STANDARD.encode(der),
    })
}

/// Convert a raw 64-byte `r||s` signature into ASN.1 DER
/// `SEQUENCE { INTEGER r, INTEGER s }`.
///
/// Leading zero octets of each integer are stripped to the minimal
/// non-negative representation; a single `0x00` is re-inserted whenever
/// the high bit of the most significant retained byte is set.
///
/// # Errors
///
/// Returns [`ZetaError::Signing`] when `raw` is not exactly 64 bytes.
pub fn p1363_to_der(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() != P1363_LEN {
        return Err(ZetaError::Signing(format!(
            "raw signature must be {P1363_LEN} bytes, got {}",
            raw.len()
        ))
        .into());
    }

    let r = der_integer(&raw[..32]);
    let s = der_integer(&raw[32..]);

    // Each integer is at most 35 bytes, so the short length form always
    // suffices for the sequence.
    let mut der = Vec::with_capacity(2 + r.len() + s.len());
    der.push(0x30);
    der.push((r.len() + s.len()) as u8);
    der.extend_from_slice(&r);
    der.extend_from_slice(&s);
    Ok(der)
}

/// Encode one minimal-form DER INTEGER from big-endian magnitude bytes.
fn der_integer(bytes: &[u8]) -> Vec<u8> {
    let mut start = 0;
    while start < bytes.len() - 1 && bytes[start] == 0 {
        start += 1;
    }
    let magnitude = &bytes[start..];

    let pad = magnitude[0] & 0x80 != 0;
    let len = magnitude.len() + usize::from(pad);

    let mut out = Vec::with_capacity(2 + len);
    out.push(0x02);
    out.push(len as u8);
    if pad {
        out.push(0x00);
    }
    out.extend_from_slice(magnitude);
    out
}
