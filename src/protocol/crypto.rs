//! Hidden service protocol cryptography
//!
//! Implements the symmetric side of the v3 rendezvous protocol:
//! - MAC construction over SHA3-256
//! - SHAKE-256 key derivation (the XOF flavor of the protocol's KDF)
//! - AES-256-CTR per-hop stream ciphers with running SHA3-256 digests
//!
//! Security: All derived key material is zeroized on drop to prevent
//! memory leakage.

use crate::error::Result;
use aes::Aes256;
use ctr::{
    cipher::{KeyIvInit, StreamCipher},
    Ctr128BE,
};
use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Digest, Sha3_256, Shake256,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::M_HSEXPAND;

/// AES-256-CTR cipher type used for rendezvous hop encryption
type Aes256Ctr = Ctr128BE<Aes256>;

/// Length of a SHA3-256 digest / MAC output
pub const DIGEST256_LEN: usize = 32;

/// Length of an AES-256 hop cipher key
pub const CIPHER256_KEY_LEN: usize = 32;

/// Total output of the rendezvous key expansion:
/// Df (32) | Db (32) | Kf (32) | Kb (32)
pub const HOP_KEY_EXPANSION_LEN: usize = 2 * DIGEST256_LEN + 2 * CIPHER256_KEY_LEN;

/// Compute the protocol MAC: `MAC(k, m) = H(k_len | k | m)`
///
/// `k_len` is the key length as a 64-bit big-endian integer and `H` is
/// SHA3-256. Used for the ESTABLISH_INTRO handshake auth value and for
/// the rendezvous-phase key seed and auth tag.
pub fn hs_mac(key: &[u8], message: &[u8]) -> [u8; DIGEST256_LEN] {
    let mut hasher = Sha3_256::new();
    Digest::update(&mut hasher, (key.len() as u64).to_be_bytes());
    Digest::update(&mut hasher, key);
    Digest::update(&mut hasher, message);

    let mut mac = [0u8; DIGEST256_LEN];
    mac.copy_from_slice(&hasher.finalize());
    mac
}

/// Expand concatenated secret input into `out.len()` bytes with SHAKE-256
///
/// The caller supplies the input as ordered segments so no intermediate
/// concatenation buffer of secret material is needed.
pub fn shake256_kdf(segments: &[&[u8]], out: &mut [u8]) {
    let mut xof = Shake256::default();
    for segment in segments {
        xof.update(segment);
    }
    xof.finalize_xof().read(out);
}

/// Derived key material for one rendezvous hop
///
/// Expanded from the HS-ntor key seed:
/// ```text
/// K = SHAKE-256(KEY_SEED | m_hsexpand)
///
/// Output: Df (32) | Db (32) | Kf (32) | Kb (32) = 128 bytes
///
/// Where:
/// - Df = forward digest seed (SHA3-256)
/// - Db = backward digest seed (SHA3-256)
/// - Kf = forward key (32 bytes, AES-256)
/// - Kb = backward key (32 bytes, AES-256)
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HopKeys {
    /// Forward digest seed (service-bound direction)
    pub forward_digest_seed: [u8; DIGEST256_LEN],

    /// Backward digest seed (client-bound direction)
    pub backward_digest_seed: [u8; DIGEST256_LEN],

    /// Forward encryption key
    pub forward_key: [u8; CIPHER256_KEY_LEN],

    /// Backward encryption key
    pub backward_key: [u8; CIPHER256_KEY_LEN],
}

impl HopKeys {
    /// Expand a rendezvous key seed into per-hop key material.
    pub fn expand_from_seed(key_seed: &[u8; DIGEST256_LEN]) -> Result<Self> {
        let mut okm = [0u8; HOP_KEY_EXPANSION_LEN];
        shake256_kdf(&[key_seed, M_HSEXPAND], &mut okm);

        let mut keys = HopKeys {
            forward_digest_seed: [0u8; DIGEST256_LEN],
            backward_digest_seed: [0u8; DIGEST256_LEN],
            forward_key: [0u8; CIPHER256_KEY_LEN],
            backward_key: [0u8; CIPHER256_KEY_LEN],
        };
        keys.forward_digest_seed.copy_from_slice(&okm[0..32]);
        keys.backward_digest_seed.copy_from_slice(&okm[32..64]);
        keys.forward_key.copy_from_slice(&okm[64..96]);
        keys.backward_key.copy_from_slice(&okm[96..128]);
        okm.zeroize();

        Ok(keys)
    }

    /// Swap the forward and backward halves.
    ///
    /// The service side of a rendezvous circuit is the far endpoint, so
    /// its sending direction uses the client's backward keys and vice
    /// versa.
    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.forward_digest_seed, &mut self.backward_digest_seed);
        std::mem::swap(&mut self.forward_key, &mut self.backward_key);
    }
}

/// Digest algorithm carried by a hop's running digests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA3-256, the fixed algorithm for v3 rendezvous hops
    Sha3_256,
}

/// One direction of a hop's crypto state: a stream cipher plus a running
/// digest over every relay payload moved in that direction.
pub struct RelayCryptoState {
    cipher: Aes256Ctr,
    digest: Sha3_256,
}

impl RelayCryptoState {
    /// Initialize from an expanded key and digest seed.
    ///
    /// The running digest is seeded by absorbing the digest seed; the CTR
    /// IV starts at zero.
    pub fn new(key: &[u8; CIPHER256_KEY_LEN], digest_seed: &[u8; DIGEST256_LEN]) -> Self {
        let iv = [0u8; 16];
        let cipher = Aes256Ctr::new(key.into(), (&iv).into());

        let mut digest = Sha3_256::new();
        Digest::update(&mut digest, digest_seed);

        Self { cipher, digest }
    }

    /// The algorithm backing this direction's running digest.
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        DigestAlgorithm::Sha3_256
    }

    /// Apply the stream cipher in place (CTR mode, encrypt == decrypt).
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        self.cipher.apply_keystream(data);
    }

    /// Absorb a relay payload into the running digest and return the
    /// 4-byte tag carried in the relay header.
    pub fn absorb_and_tag(&mut self, payload: &[u8]) -> [u8; 4] {
        Digest::update(&mut self.digest, payload);

        let snapshot = self.digest.clone().finalize();
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&snapshot[0..4]);
        tag
    }
}
