//! Published and quarantine output models.

pub mod models;

pub use models::*;
