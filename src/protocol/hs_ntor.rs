//! HS-ntor handshake implementation
//!
//! Implements the hidden-service flavor of the ntor key exchange, used
//! between a client and a hidden service across the introduction and
//! rendezvous points. Unlike the relay ntor handshake this variant is
//! keyed to the service identity via the subcredential and uses
//! SHA3-256 / SHAKE-256 instead of SHA-256 / HKDF.
//!
//! Two independent sub-protocols:
//! - Introduction phase: derives the keys protecting the INTRODUCE1
//!   encrypted payload, computed identically by both sides.
//! - Rendezvous phase: derives the RENDEZVOUS1 auth tag and the key seed
//!   that the rendezvous circuit's end-to-end hop crypto is expanded
//!   from.
//!
//! Security: Uses constant-time comparison for tag verification and
//! rejects degenerate (identity-element) DH outputs.

use crate::error::{HsError, Result};
use ed25519_dalek::VerifyingKey;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::crypto::{hs_mac, shake256_kdf, CIPHER256_KEY_LEN, DIGEST256_LEN};
use super::{PROTOID, T_HSENC, T_HSMAC, T_HSVERIFY};

/// Server-side string bound into the rendezvous auth tag
const SERVER_STR: &[u8] = b"Server";

/// Identity- and time-period-bound handshake context
///
/// Supplied by the identity key derivation layer; opaque here. Binding
/// it into the introduction-phase KDF prevents key reuse across services
/// or time periods.
pub type Subcredential = [u8; DIGEST256_LEN];

/// A curve25519 key-exchange keypair
///
/// One long-term pair per introduction point (the service encryption
/// key) and one single-use ephemeral pair per client request and per
/// service rendezvous response.
///
/// SECURITY: The secret half is zeroized on drop by x25519-dalek.
pub struct CurveKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl CurveKeypair {
    /// Generate a fresh keypair from the OS random source.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half, as embedded in outgoing cells.
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Compute a DH shared secret, rejecting degenerate outputs.
    ///
    /// A non-contributory result (the identity element, e.g. from a
    /// low-order peer point) would yield a key an attacker can predict,
    /// so it is an error rather than a weak key.
    fn diffie_hellman(&self, their_public: &PublicKey) -> Result<SharedSecret> {
        let shared = self.secret.diffie_hellman(their_public);
        if !shared.was_contributory() {
            return Err(HsError::KeyDerivationFailed(
                "degenerate DH output".into(),
            ));
        }
        Ok(shared)
    }
}

/// Derived keys protecting one INTRODUCE1 exchange
///
/// SECURITY: Zeroized on drop; lifetime is a single introduction
/// exchange.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct IntroCellKeys {
    /// Encryption key for the INTRODUCE1 encrypted section
    pub enc_key: [u8; CIPHER256_KEY_LEN],

    /// MAC key authenticating the INTRODUCE1 cell
    pub mac_key: [u8; DIGEST256_LEN],
}

/// Derived key material for one RENDEZVOUS1 exchange
///
/// SECURITY: Zeroized on drop; the key seed lives on inside the circuit
/// hop expanded from it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RendCellKeys {
    /// Auth tag the service places in RENDEZVOUS1 and the client checks
    pub auth_mac: [u8; DIGEST256_LEN],

    /// Seed for the rendezvous circuit's end-to-end hop keys
    pub key_seed: [u8; DIGEST256_LEN],
}

impl RendCellKeys {
    /// Verify a received RENDEZVOUS1 auth tag in constant time.
    ///
    /// A mismatch is a protocol violation; the caller must tear down the
    /// rendezvous circuit rather than retry.
    pub fn verify_auth_mac(&self, received: &[u8; DIGEST256_LEN]) -> Result<()> {
        let tag_valid: bool = self.auth_mac.ct_eq(received).into();
        if !tag_valid {
            log::warn!("RENDEZVOUS1 auth tag verification failed");
            return Err(HsError::AuthTagMismatch);
        }
        Ok(())
    }
}

/// Derive the INTRODUCE1 keys from one DH result.
///
/// ```text
/// intro_secret_hs_input = EXP | AUTH_KEY | X | B | PROTOID
/// hs_keys = KDF(intro_secret_hs_input | t_hsenc |
///               m_hsexpand | subcredential, 64)
/// ENC_KEY = hs_keys[0..32], MAC_KEY = hs_keys[32..64]
/// ```
fn introduce1_key_material(
    exp: &SharedSecret,
    service_auth_pk: &VerifyingKey,
    client_eph_pk: &PublicKey,
    service_enc_pk: &PublicKey,
    subcredential: &Subcredential,
) -> IntroCellKeys {
    let mut hs_keys = [0u8; CIPHER256_KEY_LEN + DIGEST256_LEN];
    shake256_kdf(
        &[
            exp.as_bytes(),
            service_auth_pk.as_bytes(),
            client_eph_pk.as_bytes(),
            service_enc_pk.as_bytes(),
            PROTOID,
            T_HSENC,
            super::M_HSEXPAND,
            subcredential,
        ],
        &mut hs_keys,
    );

    let mut keys = IntroCellKeys {
        enc_key: [0u8; CIPHER256_KEY_LEN],
        mac_key: [0u8; DIGEST256_LEN],
    };
    keys.enc_key.copy_from_slice(&hs_keys[0..32]);
    keys.mac_key.copy_from_slice(&hs_keys[32..64]);
    hs_keys.zeroize();
    keys
}

/// Client: derive the keys for an outgoing INTRODUCE1 cell.
///
/// `client_eph` is a freshly generated single-use keypair; its public
/// half travels in the cell so the service can run the mirror
/// computation.
pub fn client_introduce1_keys(
    service_auth_pk: &VerifyingKey,
    service_enc_pk: &PublicKey,
    client_eph: &CurveKeypair,
    subcredential: &Subcredential,
) -> Result<IntroCellKeys> {
    // EXP(B,x)
    let exp = client_eph.diffie_hellman(service_enc_pk)?;
    Ok(introduce1_key_material(
        &exp,
        service_auth_pk,
        client_eph.public(),
        service_enc_pk,
        subcredential,
    ))
}

/// Service: derive the keys for a received INTRODUCE1 cell.
pub fn service_introduce1_keys(
    service_auth_pk: &VerifyingKey,
    service_enc: &CurveKeypair,
    client_eph_pk: &PublicKey,
    subcredential: &Subcredential,
) -> Result<IntroCellKeys> {
    // EXP(X,b)
    let exp = service_enc.diffie_hellman(client_eph_pk)?;
    Ok(introduce1_key_material(
        &exp,
        service_auth_pk,
        client_eph_pk,
        service_enc.public(),
        subcredential,
    ))
}

/// Derive the RENDEZVOUS1 key material from the two DH results.
///
/// ```text
/// rend_secret_hs_input = EXP1 | EXP2 | AUTH_KEY | B | X | Y | PROTOID
/// NTOR_KEY_SEED = MAC(rend_secret_hs_input, t_hsenc)
/// verify        = MAC(rend_secret_hs_input, t_hsverify)
/// auth_input    = verify | AUTH_KEY | B | Y | X | PROTOID | "Server"
/// AUTH_MAC      = MAC(auth_input, t_hsmac)
/// ```
fn rendezvous1_key_material(
    exp1: &SharedSecret,
    exp2: &SharedSecret,
    service_auth_pk: &VerifyingKey,
    service_enc_pk: &PublicKey,
    client_eph_pk: &PublicKey,
    service_rend_pk: &PublicKey,
) -> RendCellKeys {
    let mut secret_input = Vec::with_capacity(6 * 32 + PROTOID.len());
    secret_input.extend_from_slice(exp1.as_bytes());
    secret_input.extend_from_slice(exp2.as_bytes());
    secret_input.extend_from_slice(service_auth_pk.as_bytes());
    secret_input.extend_from_slice(service_enc_pk.as_bytes());
    secret_input.extend_from_slice(client_eph_pk.as_bytes());
    secret_input.extend_from_slice(service_rend_pk.as_bytes());
    secret_input.extend_from_slice(PROTOID);

    let key_seed = hs_mac(&secret_input, T_HSENC);
    let verify = hs_mac(&secret_input, T_HSVERIFY);
    secret_input.zeroize();

    let mut auth_input = Vec::with_capacity(4 * 32 + PROTOID.len() + SERVER_STR.len());
    auth_input.extend_from_slice(&verify);
    auth_input.extend_from_slice(service_auth_pk.as_bytes());
    auth_input.extend_from_slice(service_enc_pk.as_bytes());
    auth_input.extend_from_slice(service_rend_pk.as_bytes());
    auth_input.extend_from_slice(client_eph_pk.as_bytes());
    auth_input.extend_from_slice(PROTOID);
    auth_input.extend_from_slice(SERVER_STR);

    let auth_mac = hs_mac(&auth_input, T_HSMAC);
    auth_input.zeroize();

    RendCellKeys { auth_mac, key_seed }
}

/// Service: derive the RENDEZVOUS1 auth tag and circuit key seed.
///
/// `service_rend_eph` is the fresh single-use rendezvous keypair whose
/// public half travels in the RENDEZVOUS1 cell; `client_eph_pk` was
/// retained from the decrypted INTRODUCE1 payload.
pub fn service_rendezvous1_keys(
    service_auth_pk: &VerifyingKey,
    service_enc: &CurveKeypair,
    service_rend_eph: &CurveKeypair,
    client_eph_pk: &PublicKey,
) -> Result<RendCellKeys> {
    // EXP(X,y) and EXP(X,b)
    let exp1 = service_rend_eph.diffie_hellman(client_eph_pk)?;
    let exp2 = service_enc.diffie_hellman(client_eph_pk)?;
    Ok(rendezvous1_key_material(
        &exp1,
        &exp2,
        service_auth_pk,
        service_enc.public(),
        client_eph_pk,
        service_rend_eph.public(),
    ))
}

/// Client: derive the expected RENDEZVOUS1 auth tag and circuit key
/// seed from a received service rendezvous public key.
pub fn client_rendezvous1_keys(
    service_auth_pk: &VerifyingKey,
    client_eph: &CurveKeypair,
    service_enc_pk: &PublicKey,
    service_rend_pk: &PublicKey,
) -> Result<RendCellKeys> {
    // EXP(Y,x) and EXP(B,x)
    let exp1 = client_eph.diffie_hellman(service_rend_pk)?;
    let exp2 = client_eph.diffie_hellman(service_enc_pk)?;
    Ok(rendezvous1_key_material(
        &exp1,
        &exp2,
        service_auth_pk,
        service_enc_pk,
        client_eph.public(),
        service_rend_pk,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn service_auth_pk() -> VerifyingKey {
        SigningKey::generate(&mut OsRng).verifying_key()
    }

    #[test]
    fn test_introduce1_key_symmetry() {
        let auth_pk = service_auth_pk();
        let service_enc = CurveKeypair::generate();
        let client_eph = CurveKeypair::generate();
        let subcredential = [b'Z'; DIGEST256_LEN];

        let client_keys = client_introduce1_keys(
            &auth_pk,
            service_enc.public(),
            &client_eph,
            &subcredential,
        )
        .unwrap();

        let service_keys = service_introduce1_keys(
            &auth_pk,
            &service_enc,
            client_eph.public(),
            &subcredential,
        )
        .unwrap();

        assert_eq!(client_keys.enc_key, service_keys.enc_key);
        assert_eq!(client_keys.mac_key, service_keys.mac_key);
    }

    #[test]
    fn test_introduce1_subcredential_binding() {
        let auth_pk = service_auth_pk();
        let service_enc = CurveKeypair::generate();
        let client_eph = CurveKeypair::generate();

        let keys_a =
            client_introduce1_keys(&auth_pk, service_enc.public(), &client_eph, &[b'A'; 32])
                .unwrap();
        let keys_b =
            client_introduce1_keys(&auth_pk, service_enc.public(), &client_eph, &[b'B'; 32])
                .unwrap();

        assert_ne!(keys_a.enc_key, keys_b.enc_key);
        assert_ne!(keys_a.mac_key, keys_b.mac_key);
    }

    #[test]
    fn test_rendezvous1_key_symmetry() {
        let auth_pk = service_auth_pk();
        let service_enc = CurveKeypair::generate();
        let service_rend_eph = CurveKeypair::generate();
        let client_eph = CurveKeypair::generate();

        let service_keys = service_rendezvous1_keys(
            &auth_pk,
            &service_enc,
            &service_rend_eph,
            client_eph.public(),
        )
        .unwrap();

        let client_keys = client_rendezvous1_keys(
            &auth_pk,
            &client_eph,
            service_enc.public(),
            service_rend_eph.public(),
        )
        .unwrap();

        assert_eq!(service_keys.auth_mac, client_keys.auth_mac);
        assert_eq!(service_keys.key_seed, client_keys.key_seed);

        client_keys.verify_auth_mac(&service_keys.auth_mac).unwrap();
    }

    #[test]
    fn test_auth_tag_mismatch() {
        let auth_pk = service_auth_pk();
        let service_enc = CurveKeypair::generate();
        let service_rend_eph = CurveKeypair::generate();
        let client_eph = CurveKeypair::generate();

        let keys = client_rendezvous1_keys(
            &auth_pk,
            &client_eph,
            service_enc.public(),
            service_rend_eph.public(),
        )
        .unwrap();

        let mut forged = keys.auth_mac;
        forged[0] ^= 0x01;
        assert_eq!(
            keys.verify_auth_mac(&forged),
            Err(HsError::AuthTagMismatch)
        );
    }

    #[test]
    fn test_degenerate_dh_rejected() {
        let auth_pk = service_auth_pk();
        let client_eph = CurveKeypair::generate();

        // The neutral element as a peer public key yields an
        // all-zero shared secret, which must be refused.
        let low_order = PublicKey::from([0u8; 32]);
        let result =
            client_introduce1_keys(&auth_pk, &low_order, &client_eph, &[b'Z'; 32]);
        assert!(matches!(result, Err(HsError::KeyDerivationFailed(_))));
    }
}
