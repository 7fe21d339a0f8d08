//! # sidepool-tests
//!
//! Integration tests for the sidepool engine:
//! - Scenario tests for chain growth, uncles, reorgs, and pruning
//! - Property-based tests for the consensus invariants
//! - Deterministic generators and mock collaborators shared by both

pub mod generators;

#[cfg(test)]
mod property_tests;


pub use generators::*;
