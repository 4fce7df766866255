//! Core domain types.

mod ids;

pub use ids::{DiffId, PrNumber, Sha};
