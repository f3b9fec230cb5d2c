//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: ASCII-escaped, indented JSON writer used for the news store,
//!   the digest snapshot and its dated archive copy

pub mod json;
