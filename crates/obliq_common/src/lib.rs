//! Shared foundational types used across the model compiler/simulator.
//!
//! This crate provides core types including interned identifiers, content
//! hashing, and the two-tier result/error types used by every other crate.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod result;

pub use hash::ContentHash;
pub use ident::{Ident, Interner};
pub use result::{InternalError, XResult};
