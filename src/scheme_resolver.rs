//! Mapping from qualified element names to schemes.

use std::collections::HashMap;
use std::sync::Arc;

use crate::identity::QName;
use crate::scheme::Scheme;

/// Turns a namespace-qualified element name into the scheme of the tuple it opens
pub trait SchemeResolver: Send + Sync {
    /// `None` makes the reader fail with `SchemeNotFound`.
    fn resolve_scheme(&self, name: &QName) -> Option<Arc<Scheme>>;
}

/// Fixed name-to-scheme table
#[derive(Debug, Default, Clone)]
pub struct StaticSchemeResolver {
    schemes: HashMap<QName, Arc<Scheme>>,
}

impl StaticSchemeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scheme under the element name derived from its identity.
    pub fn with_scheme(mut self, scheme: Arc<Scheme>) -> Self {
        self.insert(scheme);
        self
    }

    pub fn insert(&mut self, scheme: Arc<Scheme>) {
        let name = scheme.identity().to_qname();
        self.schemes.insert(name, scheme);
    }

    pub fn insert_named(&mut self, name: QName, scheme: Arc<Scheme>) {
        self.schemes.insert(name, scheme);
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &QName> {
        self.schemes.keys()
    }
}

impl SchemeResolver for StaticSchemeResolver {
    fn resolve_scheme(&self, name: &QName) -> Option<Arc<Scheme>> {
        self.schemes.get(name).cloned()
    }
}
