//! Integration test crate for Cutlist.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every library crate to verify they work together.

#[cfg(test)]
mod timeline;

#[cfg(all(test, unix))]
mod export;
