//! Mint module
//!
//! Runs a mint request end to end: the session admits and prepares it, the orchestrator
//! submits and confirms its transactions, and every failure is classified into `MintError`.

/// Error taxonomy and program error mapping
pub mod errors;
/// Seam for the sale program's instruction encoding
pub mod instructions;
/// Setup and mint transaction sequencing
pub mod orchestrator;
/// Per-wallet request admission
pub mod session;

pub use errors::{MintError, RejectionCause};
pub use instructions::{MintAccounts, MintInstructionBuilder};
pub use orchestrator::{
	AttemptOutcome, DEFAULT_TX_TIMEOUT, MintAttempt, MintFailure, MintOrchestrator, MintReceipt,
	MintRequest, SetupState,
};
pub use session::{MINT_FEE_ESTIMATE, MintSession, optimistic_delta};
