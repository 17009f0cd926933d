//! Folio Common Types
//!
//! This crate contains shared types used across the Folio workspace,
//! including identifiers, currencies and monetary amounts, the asset model
//! and timing defaults.

pub mod identifiers;
pub mod monetary;
pub mod asset;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use asset::*;
pub use error::*;
pub use time::*;
