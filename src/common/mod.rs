//! Common utilities shared by beliefs, likelihoods and the filter runner.
//!
//! Linear algebra helpers and the batched indexing used to partition
//! groups by missingness pattern.

pub mod indexing;
pub mod linalg;
