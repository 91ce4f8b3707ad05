//! Domain layer types and invariants.

pub mod entities;
pub mod highlight;
pub mod threads;
pub mod types;
