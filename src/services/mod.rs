//! Business logic services
//!
//! Service layer components that run the registry operations on top of the
//! storage, secret and event modules, separated from transport concerns.

pub mod registry_service;

pub use registry_service::{request_names, RegistryService};
