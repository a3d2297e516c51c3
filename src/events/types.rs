//! Registry change events and subscriber filters.

use serde::Serialize;
use std::fmt;

use crate::domain::Registry;

/// What happened to the registry carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryEventKind {
    Created,
    Updated,
    Deleted,
    /// Snapshot entry delivered to a new watcher before live events
    Replayed,
}

impl RegistryEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::Replayed => "REPLAYED",
        }
    }
}

impl fmt::Display for RegistryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable notification about one registry of one project.
///
/// Published events carry the sensitive fields; the bus strips them for
/// subscribers that did not ask for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEvent {
    pub kind: RegistryEventKind,
    pub project_id: String,
    pub registry: Registry,
}

impl RegistryEvent {
    pub fn new(kind: RegistryEventKind, project_id: impl Into<String>, registry: Registry) -> Self {
        Self { kind, project_id: project_id.into(), registry }
    }

    pub fn created(project_id: &str, registry: Registry) -> Self {
        Self::new(RegistryEventKind::Created, project_id, registry)
    }

    pub fn updated(project_id: &str, registry: Registry) -> Self {
        Self::new(RegistryEventKind::Updated, project_id, registry)
    }

    pub fn deleted(project_id: &str, registry: Registry) -> Self {
        Self::new(RegistryEventKind::Deleted, project_id, registry)
    }

    pub fn replayed(project_id: &str, registry: Registry) -> Self {
        Self::new(RegistryEventKind::Replayed, project_id, registry)
    }

    /// Copy of the event as a subscriber with `filter` may see it
    pub fn view_for(&self, filter: &SubscriptionFilter) -> Self {
        if filter.show_sensitive_info {
            self.clone()
        } else {
            Self { kind: self.kind, project_id: self.project_id.clone(), registry: self.registry.redacted() }
        }
    }
}

/// Which events a subscriber receives and how much of them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub project_id: String,
    pub show_sensitive_info: bool,
}

impl SubscriptionFilter {
    pub fn new(project_id: impl Into<String>, show_sensitive_info: bool) -> Self {
        Self { project_id: project_id.into(), show_sensitive_info }
    }

    pub fn matches(&self, event: &RegistryEvent) -> bool {
        self.project_id == event.project_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RegistryType;

    fn event() -> RegistryEvent {
        let mut registry = Registry::new("charts", RegistryType::Helm, "https://charts.example.com");
        registry.username = "robot".to_string();
        registry.auth_token = "token".to_string();
        RegistryEvent::created("p1", registry)
    }

    #[test]
    fn test_view_for_redacts_unless_sensitive() {
        let event = event();

        let plain = event.view_for(&SubscriptionFilter::new("p1", false));
        assert!(plain.registry.username.is_empty());
        assert!(plain.registry.auth_token.is_empty());
        assert_eq!(plain.kind, RegistryEventKind::Created);

        let full = event.view_for(&SubscriptionFilter::new("p1", true));
        assert_eq!(full.registry.auth_token, "token");
    }

    #[test]
    fn test_filter_is_project_scoped() {
        let event = event();
        assert!(SubscriptionFilter::new("p1", false).matches(&event));
        assert!(!SubscriptionFilter::new("p2", false).matches(&event));
    }
}
