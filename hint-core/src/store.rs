//! Injected persistence capability for property-backed nodes.
//!
//! Linux has no system property service, so property nodes persist through
//! whatever store the embedder hands in. The in-memory implementation is the
//! default and keeps property nodes fully functional in tests and in
//! standalone daemon runs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use hint_error::Result;

/// Key/value store a property node persists its selected value through.
pub trait PropertyStore: Send + Sync {
    /// Set `key` to `value`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Read back the current value of `key`.
    fn get(&self, key: &str) -> Option<String>;
}

/// Process-local property store backed by a map.
#[derive(Default)]
pub struct InMemoryPropertyStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for handing the store to node constructors.
    pub fn shared() -> Arc<dyn PropertyStore> {
        Arc::new(Self::new())
    }
}

impl PropertyStore for InMemoryPropertyStore {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = InMemoryPropertyStore::new();
        assert_eq!(store.get("vendor.powerhal.state"), None);

        store.set("vendor.powerhal.state", "SUSTAINED").unwrap();
        assert_eq!(
            store.get("vendor.powerhal.state").as_deref(),
            Some("SUSTAINED")
        );

        store.set("vendor.powerhal.state", "").unwrap();
        assert_eq!(store.get("vendor.powerhal.state").as_deref(), Some(""));
    }
}
