//! Shared storage integration tests.
//!
//! Tests the ProjectStore interface against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod project_store_tests;
