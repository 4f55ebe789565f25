//! v3 hidden service rendezvous protocol
//!
//! This module implements the handshake core shared by clients and
//! services, including:
//! - HS-ntor key exchange (introduction and rendezvous phases)
//! - ESTABLISH_INTRO cell construction, parsing and verification
//! - Time period calculation for identity key rotation
//! - Rendezvous circuit end-to-end crypto installation

mod crypto;
mod establish_intro;
mod hs_ntor;
mod rend_circuit;
mod time_period;
mod wire;

pub use crypto::{
    hs_mac, DigestAlgorithm, HopKeys, RelayCryptoState, CIPHER256_KEY_LEN, DIGEST256_LEN,
};
pub use establish_intro::{
    CellSigner, Ed25519CellSigner, EstablishIntroCell, AUTH_KEY_TYPE_ED25519,
    RELAY_PAYLOAD_SIZE,
};
pub use hs_ntor::{
    client_introduce1_keys, client_rendezvous1_keys, service_introduce1_keys,
    service_rendezvous1_keys, CurveKeypair, IntroCellKeys, RendCellKeys, Subcredential,
};
pub use rend_circuit::{setup_end_to_end, CircuitPurpose, RelayHop, RendezvousCircuit};
pub use time_period::{
    next_time_period_num, time_period_num, TIME_PERIOD_LENGTH_MINUTES,
    TIME_PERIOD_ROTATION_OFFSET_MINUTES,
};

/// Protocol identifier for the HS flavor of the ntor handshake
pub const PROTOID: &[u8] = b"tor-hs-ntor-curve25519-sha3-256-1";

/// MAC tweak for key extraction
pub const T_HSENC: &[u8] = b"tor-hs-ntor-curve25519-sha3-256-1:hs_key_extract";

/// MAC tweak for the verification value
pub const T_HSVERIFY: &[u8] = b"tor-hs-ntor-curve25519-sha3-256-1:hs_verify";

/// MAC tweak for the rendezvous auth tag
pub const T_HSMAC: &[u8] = b"tor-hs-ntor-curve25519-sha3-256-1:hs_mac";

/// KDF context for key expansion
pub const M_HSEXPAND: &[u8] = b"tor-hs-ntor-curve25519-sha3-256-1:hs_key_expand";
