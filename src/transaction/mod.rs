/// Split estimate for setup and mint
pub mod budget;
/// Transaction builder for assembling setup, mint and extra transactions
pub mod builder;
/// Confirmation polling
pub mod confirmation;
/// Signer collaborator
pub mod signer;

pub use budget::TransactionBudget;
pub use builder::{TransactionBuilder, TransactionError, serialize_transaction};
pub use confirmation::{ConfirmationOutcome, ConfirmationWaiter};
pub use signer::{KeypairSigner, SignerError, TransactionSigner};
