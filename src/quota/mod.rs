//! Quota module
//!
//! Tracks how many tokens an identity has minted through an external ledger service and
//! refuses further mints once the configured cap is reached.

/// HTTP ledger client and token signing
pub mod ledger;
/// Network origin lookup
pub mod origin;
/// Eligibility checks against the ledger
pub mod tracker;
pub mod types;

pub use ledger::{HttpQuotaLedger, QuotaLedger, sign_claims};
pub use origin::{HttpOriginResolver, OriginResolver, StaticOrigin};
pub use tracker::{DEFAULT_QUOTA_CAP, QuotaTracker};
pub use types::*;
