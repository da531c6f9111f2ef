//! Portable program representation used by exported artifacts.

pub mod hashing;
pub mod spec;
