//! Gate module
//!
//! Human-verification step required by sales with gatekeeper settings. A passed challenge
//! yields a gateway instruction that the mint attaches as a pre-transaction.

/// HTTP verifier client
pub mod client;
/// Gate state machine
pub mod machine;

pub use client::HttpGatewayVerifier;
pub use machine::{
	GateError, GateEvent, GateState, GatewayVerifier, VerificationGate, VerifierStatus, transition,
};
