//! Error types for the hidden service handshake core
//!
//! This module provides the error taxonomy for the four protocol
//! components, with classification helpers so callers can tell apart:
//! - Cryptographic primitive failures (abort the operation)
//! - Malformed/truncated input (reject the message)
//! - Authentication mismatches (protocol violation, refuse the artifact)
//! - Precondition violations (internal invariant breach, abort the circuit)

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HsError>;

/// Main error type for the hidden service handshake core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HsError {
    // ===== Cryptographic primitive failures =====
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // ===== Malformed input =====
    #[error("Malformed cell: {0}")]
    MalformedCell(String),

    #[error("Cell truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Buffer too small: needed {needed} bytes, capacity {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    // ===== Authentication / verification mismatches =====
    #[error("ESTABLISH_INTRO handshake auth mismatch")]
    HandshakeAuthMismatch,

    #[error("ESTABLISH_INTRO signature invalid")]
    SignatureInvalid,

    #[error("Rendezvous auth tag mismatch")]
    AuthTagMismatch,

    // ===== State errors =====
    #[error("Invalid circuit state: {0}")]
    InvalidState(String),
}

impl HsError {
    /// Whether this error is a protocol violation.
    ///
    /// A protocol violation means a peer presented an artifact that fails
    /// a cryptographic check. The caller must refuse the artifact and may
    /// tear down the associated circuit; retrying cannot change the
    /// outcome.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            HsError::HandshakeAuthMismatch
                | HsError::SignatureInvalid
                | HsError::AuthTagMismatch
        )
    }

    /// Whether this error is fatal to the current circuit.
    ///
    /// Fatal errors indicate an internal ordering bug rather than peer
    /// behavior; the caller should abort the circuit outright.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HsError::InvalidState(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violations() {
        assert!(HsError::HandshakeAuthMismatch.is_protocol_violation());
        assert!(HsError::SignatureInvalid.is_protocol_violation());
        assert!(HsError::AuthTagMismatch.is_protocol_violation());

        assert!(!HsError::SigningFailed("test".into()).is_protocol_violation());
        assert!(!HsError::MalformedCell("test".into()).is_protocol_violation());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(HsError::InvalidState("test".into()).is_fatal());

        assert!(!HsError::SigningFailed("test".into()).is_fatal());
        assert!(!HsError::HandshakeAuthMismatch.is_fatal());
        assert!(!HsError::Truncated { needed: 4, remaining: 0 }.is_fatal());
    }
}
