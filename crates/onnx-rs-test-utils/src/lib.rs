//! Shared helpers for operator conformance and export round-trip tests.

pub mod close;
pub mod fixtures;
pub mod roundtrip;

pub use close::{assert_close, assert_close_tol, assert_tensors_close};
pub use fixtures::{arange_f32, random_tensor};
pub use roundtrip::{assert_exported_attributes_eq, save_and_load_exported};
