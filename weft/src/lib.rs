//! # Weft — Bean Container for Rust
//!
//! An IoC container with Spring-style definitions: scopes, qualifiers,
//! profiles, configuration placeholders and advice-based interception.

pub use weft_container::*;
pub use weft_support::*;
