//! Connectivity: which candidate endpoint to talk to

pub mod resolver;

pub use resolver::{ConnectivityResolver, EndpointStatus};
