//! Packaging and payload validation

pub mod artifact;
pub mod packager;
pub mod validate;
