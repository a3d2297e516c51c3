//! Repositories over the catalog tables

pub mod application;
pub mod registry;

pub use application::{ApplicationRepository, ApplicationRow, NewApplication};
pub use registry::{next_update_time, RegistryAttributes, RegistryRepository, RegistryRow};
