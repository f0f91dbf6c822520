//! shelf-core: shared types, errors, photo field rules and configuration.
//!
//! Every other shelf-* crate depends on this one. It carries the unified
//! [`Error`] type, the typed [`PhotoId`], the [`Locator`] that ties a
//! metadata row to its blob, and the validation rules applied to uploads
//! and listing parameters.

pub mod config;
pub mod error;
pub mod ids;
pub mod photo;

pub use error::{Error, Result};
pub use ids::PhotoId;
pub use photo::*;
