//! Domain layer types and invariants.

pub mod cart;
pub mod entities;
pub mod error;
