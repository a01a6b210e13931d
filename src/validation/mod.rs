//! Document validation module.
//!
//! Structural validation of decrypted documents against compiled
//! schemas: required groups, types, anchored patterns, array items.

pub mod validator;

pub use validator::*;
