//! Type identities and qualified element names.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Namespace of the XML Schema datatypes used for built-in primitives
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// URI naming a type. Two identities are equal iff their URIs are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeIdentity(Arc<str>);

impl TypeIdentity {
    pub fn new(uri: impl AsRef<str>) -> Self {
        Self(Arc::from(uri.as_ref()))
    }

    /// Identity for an element name: `namespace#local`, or just `local` without a namespace.
    pub fn from_qname(name: &QName) -> Self {
        match &name.namespace {
            Some(namespace) => Self::new(format!("{}#{}", namespace, name.local)),
            None => Self::new(&name.local),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing segment after the last `#`, `/` or `:`.
    pub fn local_name(&self) -> &str {
        let uri = self.as_str();
        uri.rfind(['#', '/', ':'])
            .map(|pos| &uri[pos + 1..])
            .unwrap_or(uri)
    }

    /// Inverse of [`TypeIdentity::from_qname`].
    pub fn to_qname(&self) -> QName {
        match self.as_str().rsplit_once('#') {
            Some((namespace, local)) => QName::new(Some(namespace), local),
            None => QName::new(None, self.as_str()),
        }
    }

    pub fn is_http(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeIdentity {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for TypeIdentity {
    fn from(uri: String) -> Self {
        Self(Arc::from(uri))
    }
}

/// Namespace-qualified element name as delivered by the markup event stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            local: local.to_string(),
        }
    }
}

/// Clark notation: `{namespace}local`
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{{{}}}{}", namespace, self.local),
            None => f.write_str(&self.local),
        }
    }
}
