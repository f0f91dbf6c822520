//! Database query modules.

pub mod photos;
