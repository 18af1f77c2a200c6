//! BridgeLedger Common Types
//!
//! This crate contains shared types used across the BridgeLedger workspace,
//! including identifiers, fixed-point monetary types and the conversion
//! error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
