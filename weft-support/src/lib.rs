//! # Weft Support
//!
//! Shared utilities for the Weft DI framework.
//!
//! This crate provides:
//! - Text rendering for error messages
//! - Common utilities shared between weft crates

pub mod rendering;
