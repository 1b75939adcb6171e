//! Currency Wallet Common Types
//!
//! Shared types used across the wallet crates: identifiers, currencies and
//! money, the error taxonomy, and deadlines.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
