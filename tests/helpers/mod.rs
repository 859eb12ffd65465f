//! Shared test helpers
//!
//! Model fixtures and numerical assertions used across the integration tests.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
