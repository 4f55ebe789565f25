//! ESTABLISH_INTRO cell codec
//!
//! A service registers with its chosen introduction point by sending an
//! ESTABLISH_INTRO cell down the circuit. The cell carries the
//! introduction auth key, a handshake-auth extension binding the cell to
//! this circuit's key material, and a trailing signature over the body.
//!
//! Wire format (relay payload, big-endian):
//! ```text
//! AUTH_KEY_TYPE  u8   (2 = ed25519)
//! AUTH_KEY_LEN   u16  (32)
//! AUTH_KEY       32 bytes
//! N_EXTENSIONS   u8
//! N_EXTENSIONS times:
//!   EXT_TYPE     u8   (1 = handshake auth)
//!   EXT_LEN      u8
//!   EXT_DATA     EXT_LEN bytes
//! SIG_LEN        u16  (64)
//! SIGNATURE      64 bytes
//! ```
//!
//! The handshake-auth extension value is `MAC(circuit_key_material,
//! AUTH_KEY_TYPE | AUTH_KEY_LEN | AUTH_KEY)`; the signature covers a
//! fixed prefix string plus every cell byte preceding SIG_LEN.

use crate::error::{HsError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use subtle::ConstantTimeEq;

use super::crypto::{hs_mac, DIGEST256_LEN};
use super::wire::{WireReader, WireWriter};

/// Capacity of one relay message payload
pub const RELAY_PAYLOAD_SIZE: usize = 498;

/// AUTH_KEY_TYPE value for an ed25519 introduction auth key
pub const AUTH_KEY_TYPE_ED25519: u8 = 2;

/// Extension tag carrying the handshake auth MAC
const EXT_TYPE_HANDSHAKE_AUTH: u8 = 1;

/// Prefix string mixed into the signature input
const SIG_PREFIX: &[u8] = b"Tor establish-intro cell v1";

/// ed25519 signature length
const SIG_LEN: usize = 64;

/// Signing capability for ESTABLISH_INTRO cells
///
/// Injected explicitly so callers own the key handling and tests can
/// inject failures without a global hook.
pub trait CellSigner {
    /// The introduction auth public key the cell will declare.
    fn verifying_key(&self) -> VerifyingKey;

    /// Sign `prefix | message`.
    fn sign_prefixed(&self, prefix: &[u8], message: &[u8]) -> Result<Signature>;
}

/// Default signer over an ed25519 keypair
pub struct Ed25519CellSigner {
    keypair: SigningKey,
}

impl Ed25519CellSigner {
    pub fn new(keypair: SigningKey) -> Self {
        Self { keypair }
    }
}

impl CellSigner for Ed25519CellSigner {
    fn verifying_key(&self) -> VerifyingKey {
        self.keypair.verifying_key()
    }

    fn sign_prefixed(&self, prefix: &[u8], message: &[u8]) -> Result<Signature> {
        let mut input = Vec::with_capacity(prefix.len() + message.len());
        input.extend_from_slice(prefix);
        input.extend_from_slice(message);
        self.keypair
            .try_sign(&input)
            .map_err(|e| HsError::SigningFailed(e.to_string()))
    }
}

/// A parsed or freshly built ESTABLISH_INTRO cell
pub struct EstablishIntroCell {
    /// Declared auth key type (only ed25519 is accepted)
    auth_key_type: u8,

    /// Introduction auth public key
    auth_key: VerifyingKey,

    /// Handshake auth MAC from the cell's extension block
    handshake_auth: [u8; DIGEST256_LEN],

    /// The encoded cell body preceding SIG_LEN; the exact bytes the
    /// signature covers (after the fixed prefix)
    signed_body: Vec<u8>,

    /// Signature over the prefixed body
    signature: Signature,
}

impl EstablishIntroCell {
    /// Build a signed cell from this circuit's per-hop key material.
    ///
    /// Returns no cell if the signing primitive fails; the failure is
    /// logged at warning level and surfaced to the caller.
    pub fn build(signer: &dyn CellSigner, circuit_key_material: &[u8]) -> Result<Self> {
        let auth_key = signer.verifying_key();
        let handshake_auth =
            compute_handshake_auth(circuit_key_material, AUTH_KEY_TYPE_ED25519, &auth_key);

        let mut body = [0u8; RELAY_PAYLOAD_SIZE];
        let body_len = encode_body(
            &mut body,
            AUTH_KEY_TYPE_ED25519,
            &auth_key,
            &handshake_auth,
        )?;
        let signed_body = body[..body_len].to_vec();

        let signature = signer
            .sign_prefixed(SIG_PREFIX, &signed_body)
            .map_err(|e| {
                log::warn!("Unable to gen signature for ESTABLISH_INTRO cell.");
                e
            })?;

        Ok(Self {
            auth_key_type: AUTH_KEY_TYPE_ED25519,
            auth_key,
            handshake_auth,
            signed_body,
            signature,
        })
    }

    /// Serialize into a caller-provided relay payload buffer.
    ///
    /// Returns the number of bytes written, or `BufferTooSmall` if the
    /// buffer cannot hold the cell. The length check happens before the
    /// first write, so a failed call leaves the buffer untouched.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize> {
        let needed = self.signed_body.len() + 2 + SIG_LEN;
        if needed > buf.len() {
            return Err(HsError::BufferTooSmall {
                needed,
                capacity: buf.len(),
            });
        }

        let mut writer = WireWriter::new(buf);

        writer.write_bytes(&self.signed_body)?;
        writer.write_u16(SIG_LEN as u16)?;
        writer.write_bytes(&self.signature.to_bytes())?;

        Ok(writer.written())
    }

    /// Parse a received relay payload.
    ///
    /// Every length is validated against the remaining buffer; no input,
    /// including an empty or truncated one, reads past the payload.
    /// Unknown extension types are skipped (their length field bounds the
    /// read), but the handshake-auth extension must be present exactly
    /// once.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(buf);

        let auth_key_type = reader.read_u8()?;
        if auth_key_type != AUTH_KEY_TYPE_ED25519 {
            return Err(HsError::MalformedCell(format!(
                "unsupported auth key type {}",
                auth_key_type
            )));
        }

        let auth_key_len = reader.read_u16()? as usize;
        if auth_key_len != 32 {
            return Err(HsError::MalformedCell(format!(
                "bad auth key length {}",
                auth_key_len
            )));
        }
        let mut auth_key_bytes = [0u8; 32];
        auth_key_bytes.copy_from_slice(reader.read_bytes(32)?);
        let auth_key = VerifyingKey::from_bytes(&auth_key_bytes)
            .map_err(|_| HsError::MalformedCell("non-canonical auth key".into()))?;

        let n_extensions = reader.read_u8()?;
        let mut handshake_auth: Option<[u8; DIGEST256_LEN]> = None;
        for _ in 0..n_extensions {
            let ext_type = reader.read_u8()?;
            let ext_len = reader.read_u8()? as usize;
            let ext_data = reader.read_bytes(ext_len)?;

            if ext_type == EXT_TYPE_HANDSHAKE_AUTH {
                if ext_len != DIGEST256_LEN || handshake_auth.is_some() {
                    return Err(HsError::MalformedCell(
                        "bad handshake auth extension".into(),
                    ));
                }
                let mut mac = [0u8; DIGEST256_LEN];
                mac.copy_from_slice(ext_data);
                handshake_auth = Some(mac);
            }
        }
        let handshake_auth = handshake_auth.ok_or_else(|| {
            HsError::MalformedCell("missing handshake auth extension".into())
        })?;

        // Everything consumed so far is what the peer signed.
        let signed_body = buf[..reader.consumed()].to_vec();

        let sig_len = reader.read_u16()? as usize;
        if sig_len != SIG_LEN {
            return Err(HsError::MalformedCell(format!(
                "bad signature length {}",
                sig_len
            )));
        }
        let mut sig_bytes = [0u8; SIG_LEN];
        sig_bytes.copy_from_slice(reader.read_bytes(SIG_LEN)?);
        let signature = Signature::from_bytes(&sig_bytes);

        Ok(Self {
            auth_key_type,
            auth_key,
            handshake_auth,
            signed_body,
            signature,
        })
    }

    /// Verify a parsed cell against this circuit's key material.
    ///
    /// Recomputes the handshake auth MAC (constant-time compare), then
    /// checks the signature over the exact received bytes. The two
    /// failure modes are distinct; both are protocol violations and the
    /// receiving relay must refuse to register the introduction point.
    pub fn verify(&self, circuit_key_material: &[u8]) -> Result<()> {
        let expected =
            compute_handshake_auth(circuit_key_material, self.auth_key_type, &self.auth_key);
        let mac_valid: bool = expected.ct_eq(&self.handshake_auth).into();
        if !mac_valid {
            log::warn!("ESTABLISH_INTRO handshake auth not as expected");
            return Err(HsError::HandshakeAuthMismatch);
        }

        let mut signed = Vec::with_capacity(SIG_PREFIX.len() + self.signed_body.len());
        signed.extend_from_slice(SIG_PREFIX);
        signed.extend_from_slice(&self.signed_body);

        self.auth_key
            .verify(&signed, &self.signature)
            .map_err(|_| {
                log::warn!("Failed to verify ESTABLISH_INTRO cell signature");
                HsError::SignatureInvalid
            })
    }

    /// The declared introduction auth public key.
    pub fn auth_key(&self) -> &VerifyingKey {
        &self.auth_key
    }
}

/// Handshake auth MAC over the auth key fields, keyed by the circuit's
/// per-hop key material.
fn compute_handshake_auth(
    circuit_key_material: &[u8],
    auth_key_type: u8,
    auth_key: &VerifyingKey,
) -> [u8; DIGEST256_LEN] {
    let mut msg = Vec::with_capacity(1 + 2 + 32);
    msg.push(auth_key_type);
    msg.extend_from_slice(&(32u16).to_be_bytes());
    msg.extend_from_slice(auth_key.as_bytes());
    hs_mac(circuit_key_material, &msg)
}

/// Write the cell body preceding SIG_LEN and return its length.
fn encode_body(
    buf: &mut [u8],
    auth_key_type: u8,
    auth_key: &VerifyingKey,
    handshake_auth: &[u8; DIGEST256_LEN],
) -> Result<usize> {
    let mut writer = WireWriter::new(buf);

    writer.write_u8(auth_key_type)?;
    writer.write_u16(32)?;
    writer.write_bytes(auth_key.as_bytes())?;

    writer.write_u8(1)?; // one extension
    writer.write_u8(EXT_TYPE_HANDSHAKE_AUTH)?;
    writer.write_u8(DIGEST256_LEN as u8)?;
    writer.write_bytes(handshake_auth)?;

    Ok(writer.written())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rand::RngCore;

    fn fresh_signer() -> Ed25519CellSigner {
        Ed25519CellSigner::new(SigningKey::generate(&mut OsRng))
    }

    fn fresh_key_material() -> [u8; 20] {
        let mut km = [0u8; 20];
        OsRng.fill_bytes(&mut km);
        km
    }

    #[test]
    fn test_build_serialize_parse_verify() {
        let signer = fresh_signer();
        let key_material = fresh_key_material();

        let cell = EstablishIntroCell::build(&signer, &key_material).unwrap();

        let mut buf = [0u8; RELAY_PAYLOAD_SIZE];
        let len = cell.serialize(&mut buf).unwrap();
        assert!(len <= RELAY_PAYLOAD_SIZE);

        // Receivers see the whole zero-padded relay payload
        let parsed = EstablishIntroCell::parse(&buf).unwrap();
        parsed.verify(&key_material).unwrap();
        assert_eq!(parsed.auth_key(), cell.auth_key());
    }

    #[test]
    fn test_verify_wrong_key_material() {
        let signer = fresh_signer();
        let cell = EstablishIntroCell::build(&signer, &fresh_key_material()).unwrap();

        assert_eq!(
            cell.verify(&fresh_key_material()),
            Err(HsError::HandshakeAuthMismatch)
        );
    }

    #[test]
    fn test_verify_bad_signature() {
        let signer = fresh_signer();
        let key_material = fresh_key_material();
        let cell = EstablishIntroCell::build(&signer, &key_material).unwrap();

        let mut buf = [0u8; RELAY_PAYLOAD_SIZE];
        let len = cell.serialize(&mut buf).unwrap();

        // Corrupt one signature byte; the MAC still matches so the
        // failure must be the signature check, not the auth extension.
        buf[len - 1] ^= 0x01;
        let parsed = EstablishIntroCell::parse(&buf[..len]).unwrap();
        assert_eq!(parsed.verify(&key_material), Err(HsError::SignatureInvalid));
    }

    #[test]
    fn test_serialize_buffer_too_small() {
        let signer = fresh_signer();
        let cell = EstablishIntroCell::build(&signer, &fresh_key_material()).unwrap();

        let mut tiny = [0u8; 16];
        assert!(matches!(
            cell.serialize(&mut tiny),
            Err(HsError::BufferTooSmall { .. })
        ));
        // Nothing was written
        assert_eq!(tiny, [0u8; 16]);
    }

    #[test]
    fn test_serialize_no_partial_write() {
        let signer = fresh_signer();
        let cell = EstablishIntroCell::build(&signer, &fresh_key_material()).unwrap();

        let mut full = [0u8; RELAY_PAYLOAD_SIZE];
        let len = cell.serialize(&mut full).unwrap();

        // Room for the signed body but not the signature block: the
        // call must fail before emitting any bytes.
        let mut short = vec![0u8; len - SIG_LEN];
        assert!(matches!(
            cell.serialize(&mut short),
            Err(HsError::BufferTooSmall { .. })
        ));
        assert!(short.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_parse_robustness() {
        // Empty input
        assert!(EstablishIntroCell::parse(&[]).is_err());

        // Valid cell truncated at every prefix length
        let signer = fresh_signer();
        let cell = EstablishIntroCell::build(&signer, &fresh_key_material()).unwrap();
        let mut buf = [0u8; RELAY_PAYLOAD_SIZE];
        let len = cell.serialize(&mut buf).unwrap();
        for cut in 0..len {
            assert!(EstablishIntroCell::parse(&buf[..cut]).is_err());
        }

        // Extension length pointing past the buffer
        let mut forged = buf[..len].to_vec();
        forged[37] = 0xff; // EXT_LEN field
        assert!(EstablishIntroCell::parse(&forged).is_err());

        // Unknown auth key type
        let mut forged = buf[..len].to_vec();
        forged[0] = 0x07;
        assert!(matches!(
            EstablishIntroCell::parse(&forged),
            Err(HsError::MalformedCell(_))
        ));
    }

    #[test]
    fn test_unknown_extension_tolerated() {
        let signer = fresh_signer();
        let key_material = fresh_key_material();
        let cell = EstablishIntroCell::build(&signer, &key_material).unwrap();

        // Re-encode with an extra unknown extension ahead of the auth
        // extension. Parsing must skip it, and since the signature covers
        // the received body the altered cell must fail the signature
        // check rather than the parse.
        let mut buf = Vec::new();
        buf.push(AUTH_KEY_TYPE_ED25519);
        buf.extend_from_slice(&(32u16).to_be_bytes());
        buf.extend_from_slice(cell.auth_key().as_bytes());
        buf.push(2); // two extensions
        buf.push(0xee); // unknown type
        buf.push(3);
        buf.extend_from_slice(&[0xaa, 0xbb, 0xcc]);
        buf.push(EXT_TYPE_HANDSHAKE_AUTH);
        buf.push(DIGEST256_LEN as u8);
        buf.extend_from_slice(&cell.handshake_auth);
        buf.extend_from_slice(&(64u16).to_be_bytes());
        buf.extend_from_slice(&cell.signature.to_bytes());

        let parsed = EstablishIntroCell::parse(&buf).unwrap();
        assert_eq!(parsed.verify(&key_material), Err(HsError::SignatureInvalid));
    }
}
