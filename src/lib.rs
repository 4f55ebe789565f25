//! Hidden service introduction and rendezvous handshake core
//!
//! This crate implements the cryptographic core that lets a client reach
//! a hidden service without either side learning the other's network
//! location:
//!
//! - The HS-ntor key exchange, deriving the INTRODUCE1 encryption/MAC
//!   keys and, later, the RENDEZVOUS1 auth tag and circuit key seed
//! - The ESTABLISH_INTRO cell a service sends to register with an
//!   introduction point: build, serialize, parse, verify
//! - The shared time period number synchronizing identity key rotation
//! - Installation of rendezvous key material onto an open circuit,
//!   turning it into a joined, data-ready rendezvous circuit
//!
//! Everything here is synchronous pure computation over caller-owned
//! buffers and structures: no I/O, no internal locking, no background
//! tasks. Path selection, cell transport, descriptor handling and
//! directory operations are separate layers.

pub mod error;
pub mod protocol;

pub use error::{HsError, Result};
pub use protocol::{
    client_introduce1_keys, client_rendezvous1_keys, next_time_period_num,
    service_introduce1_keys, service_rendezvous1_keys, setup_end_to_end, time_period_num,
    CellSigner, CircuitPurpose, CurveKeypair, Ed25519CellSigner, EstablishIntroCell,
    IntroCellKeys, RendCellKeys, RendezvousCircuit, Subcredential,
};
