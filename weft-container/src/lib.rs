//! Core container implementation for Weft DI.

pub mod advice;
pub mod config;
pub mod container;
pub mod definition;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod profile;
mod registry;
mod resolver;
pub mod scope;
pub mod source;

pub use container::prelude;
pub use container::{Container, ContainerBuilder};
pub use error::{ContainerError, Result};
pub use key::CapabilityKey;
pub use scope::BeanScope;
