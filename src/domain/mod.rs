//! Domain layer
//!
//! Pure catalog entities with no storage or transport dependencies.
//!
//! - `registry`: registries, their sensitive sub-record and the CA field
//! - `requests`: request/response shapes of the registry operations

pub mod registry;
pub mod requests;

pub use registry::{CaCertificates, PemBundle, Registry, RegistrySecret, RegistryType, DYNAMIC_CA_CERTS_NAME};
pub use requests::{
    CreateRegistryRequest, DeleteRegistryRequest, GetRegistryRequest, ListRegistriesRequest,
    ListRegistriesResponse, UpdateRegistryRequest, WatchRegistriesRequest,
};
