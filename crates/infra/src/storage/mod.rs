//! Persistent key-value storage adapters

pub mod keychain_store;

pub use keychain_store::KeychainStore;
