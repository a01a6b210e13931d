//! Routing decisions.
//!
//! Maps accepted documents to their downstream dataset and table from
//! schema pipeline metadata.

pub mod decision;

pub use decision::*;
