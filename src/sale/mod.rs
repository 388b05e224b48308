//! Sale state module
//!
//! Reads the sale configuration account from chain, decodes it, and derives the
//! user-facing `SaleView` from it.

/// On-chain account layout and derived addresses
pub mod account;
/// Pure derivation of the sale view
pub mod deriver;
/// Network reader for the sale and its auxiliary accounts
pub mod reader;
pub mod types;

pub use deriver::{PaymentUnits, SaleStateDeriver};
pub use reader::SaleStateReader;
pub use types::*;
