//! Shared primitives, traits, and utilities for the retrokit workspace.
//!
//! `retrokit-core` provides the foundation the chemistry and report crates
//! build on:
//!
//! - **Error types**: [`RetroError`] and [`Result`] for structured error handling
//! - **Traits**: [`ContentAddressable`], [`Summarizable`]
//! - **Hashing**: [`ContentHasher`](hash::ContentHasher) and SHA-256 digests
//!   for reproducibility checks

pub mod error;
pub mod hash;
pub mod traits;

pub use error::{Result, RetroError};
pub use traits::*;
