//! Credentials

pub mod credentials;
