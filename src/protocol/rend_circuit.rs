//! Rendezvous circuit end-to-end crypto installation
//!
//! Once the HS-ntor rendezvous phase yields a key seed, both sides
//! append one virtual hop to their rendezvous circuit carrying the
//! end-to-end cipher and digest state, and the circuit becomes ready for
//! application data. Path selection and the cell transport live outside
//! this module; the circuit handle only exposes purpose and hop
//! queries.

use crate::error::{HsError, Result};

use super::crypto::{HopKeys, RelayCryptoState, DIGEST256_LEN};

/// Logical purpose of a circuit
///
/// Only the rendezvous-side purposes matter here; circuits serving other
/// roles are out of scope for this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitPurpose {
    /// Service-side circuit, connecting to the rendezvous point
    ServiceConnectingToRendezvous,
    /// Service-side circuit, rendezvous established and joined
    ServiceRendezvousJoined,
    /// Client-side circuit, connecting to the rendezvous point
    ClientConnectingToRendezvous,
    /// Client-side circuit, rendezvous established and joined
    ClientRendezvousJoined,
    /// Any purpose this core does not act on
    Other,
}

/// Crypto state for one circuit hop
pub struct RelayHop {
    /// Sending direction
    pub forward: RelayCryptoState,
    /// Receiving direction
    pub backward: RelayCryptoState,
}

impl RelayHop {
    fn from_keys(keys: &HopKeys) -> Self {
        Self {
            forward: RelayCryptoState::new(&keys.forward_key, &keys.forward_digest_seed),
            backward: RelayCryptoState::new(&keys.backward_key, &keys.backward_digest_seed),
        }
    }
}

/// A circuit as seen by the rendezvous installer
///
/// The path structure is an owned sequence of hop records; callers query
/// it but only the installer appends to it.
pub struct RendezvousCircuit {
    purpose: CircuitPurpose,
    hops: Vec<RelayHop>,
}

impl RendezvousCircuit {
    /// Create an open circuit with no rendezvous hops.
    pub fn new(purpose: CircuitPurpose) -> Self {
        Self {
            purpose,
            hops: Vec::new(),
        }
    }

    /// Current logical purpose.
    pub fn purpose(&self) -> CircuitPurpose {
        self.purpose
    }

    /// Number of installed rendezvous hops.
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// The most recently installed hop.
    pub fn last_hop(&self) -> Option<&RelayHop> {
        self.hops.last()
    }

    /// Mutable access to the most recently installed hop, for the cell
    /// layer driving the ciphers and digests.
    pub fn last_hop_mut(&mut self) -> Option<&mut RelayHop> {
        self.hops.last_mut()
    }
}

/// Install rendezvous key material onto an open circuit.
///
/// Expands `key_seed` into per-hop cipher keys and digest seeds, appends
/// exactly one hop carrying that state, and advances the circuit's
/// purpose from "connecting to rendezvous" to "rendezvous joined".
///
/// The circuit must be awaiting rendezvous completion on the given side
/// with zero installed hops; anything else is an ordering bug in the
/// caller and fails fatally (the caller must abort the circuit).
pub fn setup_end_to_end(
    circ: &mut RendezvousCircuit,
    key_seed: &[u8; DIGEST256_LEN],
    is_service_side: bool,
) -> Result<()> {
    let expected_purpose = if is_service_side {
        CircuitPurpose::ServiceConnectingToRendezvous
    } else {
        CircuitPurpose::ClientConnectingToRendezvous
    };
    if circ.purpose != expected_purpose {
        return Err(HsError::InvalidState(format!(
            "rendezvous setup on circuit with purpose {:?}",
            circ.purpose
        )));
    }
    if !circ.hops.is_empty() {
        return Err(HsError::InvalidState(format!(
            "rendezvous setup on circuit with {} hops",
            circ.hops.len()
        )));
    }

    let mut keys = HopKeys::expand_from_seed(key_seed)?;
    if is_service_side {
        // The service is the far endpoint: its sending direction is the
        // client's backward direction.
        keys.reverse();
    }

    circ.hops.push(RelayHop::from_keys(&keys));
    circ.purpose = if is_service_side {
        CircuitPurpose::ServiceRendezvousJoined
    } else {
        CircuitPurpose::ClientRendezvousJoined
    };

    log::debug!(
        "Rendezvous circuit joined ({} side)",
        if is_service_side { "service" } else { "client" }
    );
    Ok(())
}
