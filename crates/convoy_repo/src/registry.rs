//! The table of live stores.

use crate::store::VersionedStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// One registered store with its wire identity.
pub struct StoreEntry {
    /// Owning customer.
    pub customer: String,
    /// Store name within the customer.
    pub name: String,
    /// True for the authoritative (write-accepting) instance; false for a
    /// read-only replica.
    pub master: bool,
    /// The store itself.
    pub store: Arc<dyn VersionedStore>,
}

impl StoreEntry {
    /// Creates an entry.
    pub fn new(
        customer: impl Into<String>,
        name: impl Into<String>,
        master: bool,
        store: Arc<dyn VersionedStore>,
    ) -> Self {
        Self {
            customer: customer.into(),
            name: name.into(),
            master,
            store,
        }
    }
}

impl std::fmt::Debug for StoreEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEntry")
            .field("customer", &self.customer)
            .field("name", &self.name)
            .field("master", &self.master)
            .finish_non_exhaustive()
    }
}

/// Result of resolving a `(customer, name)` filter to a single store.
#[derive(Debug)]
pub enum Selection {
    /// No entry matched.
    None,
    /// Exactly one entry matched.
    One(Arc<StoreEntry>),
    /// Several entries matched: a misconfiguration the wire layer reports
    /// as not-found.
    Ambiguous,
}

/// The table of live `(customer, name)` stores.
///
/// An explicit, injectable object — endpoints receive the registry they
/// serve, and tests wire up in-memory fakes. Nothing here is global.
#[derive(Default)]
pub struct StoreRegistry {
    entries: RwLock<Vec<Arc<StoreEntry>>>,
}

impl StoreRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. Duplicate `(customer, name)` registrations are
    /// accepted but logged; the wire layer refuses to address them.
    pub fn register(&self, entry: StoreEntry) {
        let mut entries = self.entries.write();
        if entries
            .iter()
            .any(|e| e.customer == entry.customer && e.name == entry.name)
        {
            warn!(
                customer = %entry.customer,
                name = %entry.name,
                "duplicate store registration"
            );
        }
        entries.push(Arc::new(entry));
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All entries matching the optional customer/name filters, optionally
    /// restricted to masters. Order of registration is preserved.
    pub fn select(
        &self,
        customer: Option<&str>,
        name: Option<&str>,
        master_only: bool,
    ) -> Vec<Arc<StoreEntry>> {
        self.entries
            .read()
            .iter()
            .filter(|e| customer.is_none_or(|c| e.customer == c))
            .filter(|e| name.is_none_or(|n| e.name == n))
            .filter(|e| !master_only || e.master)
            .cloned()
            .collect()
    }

    /// Resolves a filter that must address exactly one store.
    pub fn select_one(
        &self,
        customer: Option<&str>,
        name: Option<&str>,
        master_only: bool,
    ) -> Selection {
        let mut matches = self.select(customer, name, master_only);
        match matches.len() {
            0 => Selection::None,
            1 => Selection::One(matches.remove(0)),
            _ => Selection::Ambiguous,
        }
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryVersionedStore;

    fn entry(customer: &str, name: &str, master: bool) -> StoreEntry {
        StoreEntry::new(customer, name, master, Arc::new(MemoryVersionedStore::new()))
    }

    #[test]
    fn select_filters() {
        let registry = StoreRegistry::new();
        registry.register(entry("acme", "shop-config", true));
        registry.register(entry("acme", "fw-artifacts", true));
        registry.register(entry("globex", "shop-config", false));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.select(Some("acme"), None, false).len(), 2);
        assert_eq!(registry.select(None, Some("shop-config"), false).len(), 2);
        assert_eq!(registry.select(None, Some("shop-config"), true).len(), 1);
        assert_eq!(registry.select(None, None, false).len(), 3);
        assert!(registry.select(Some("initech"), None, false).is_empty());
    }

    #[test]
    fn select_one_outcomes() {
        let registry = StoreRegistry::new();
        registry.register(entry("acme", "cfg", true));
        registry.register(entry("acme", "cfg", true)); // misconfiguration
        registry.register(entry("acme", "other", true));

        assert!(matches!(
            registry.select_one(Some("acme"), Some("other"), false),
            Selection::One(_)
        ));
        assert!(matches!(
            registry.select_one(Some("acme"), Some("cfg"), false),
            Selection::Ambiguous
        ));
        assert!(matches!(
            registry.select_one(Some("acme"), Some("missing"), false),
            Selection::None
        ));
    }

    #[test]
    fn master_filter_excludes_replicas() {
        let registry = StoreRegistry::new();
        registry.register(entry("acme", "cfg", false));
        assert!(matches!(
            registry.select_one(Some("acme"), Some("cfg"), true),
            Selection::None
        ));
        assert!(matches!(
            registry.select_one(Some("acme"), Some("cfg"), false),
            Selection::One(_)
        ));
    }
}
