//! # Registry Events
//!
//! Committed registry mutations fan out to watchers through the [`EventBus`].
//! A watch optionally starts with a replay of the project's registries, taken
//! under the bus sequencing lock, and then follows live events.

pub mod bus;
pub mod types;
pub mod watch;

pub use bus::{EventBus, Subscription, SubscriptionId, DEFAULT_SUBSCRIBER_BUFFER};
pub use types::{RegistryEvent, RegistryEventKind, SubscriptionFilter};
pub use watch::RegistryWatch;
