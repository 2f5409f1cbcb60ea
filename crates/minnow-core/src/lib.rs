//! # minnow-core
//! Foundation types and crypto for the Minnow wallet engine.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod token;
pub mod types;
