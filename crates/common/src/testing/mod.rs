//! Testing utilities
//!
//! In-memory stand-ins for platform services, for use in unit and
//! integration tests across the workspace (`test-utils` feature).

pub mod mocks;

pub use mocks::MockKeychainProvider;
