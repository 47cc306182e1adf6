//! API handlers module

pub mod health;
pub mod import;
pub mod licenses;
pub mod stats;
pub mod validate;
