//! Schemes: the ordered, named field lists describing aggregate types.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Result, TupleError};
use crate::identity::TypeIdentity;
use crate::types::TypeRef;

/// One named, typed slot in a scheme
#[derive(Clone)]
pub struct Field {
    name: String,
    declared_type: TypeRef,
    index: usize,
    nullable: bool,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type; may still be an unlinked placeholder.
    pub fn declared_type(&self) -> &TypeRef {
        &self.declared_type
    }

    /// Position within the owning scheme (0-based)
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

// Field types can form cycles through linked placeholders, so only the identity is printed.
impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("declared_type", self.declared_type.identity())
            .field("index", &self.index)
            .field("nullable", &self.nullable)
            .finish()
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.index == other.index
            && self.nullable == other.nullable
            && self.declared_type.identity() == other.declared_type.identity()
    }
}

/// Ordered set of fields for one type. Frozen once built.
#[derive(Debug)]
pub struct Scheme {
    identity: TypeIdentity,
    fields: IndexMap<String, Field>,
}

impl Scheme {
    pub fn builder(identity: impl Into<TypeIdentity>) -> SchemeBuilder {
        SchemeBuilder {
            identity: identity.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = &Field> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn find_field(&self, name: &str) -> Result<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| TupleError::FieldNotFound {
                name: name.to_string(),
                scheme: self.identity.clone(),
            })
    }

    pub fn field_at(&self, index: usize) -> Result<&Field> {
        self.fields
            .get_index(index)
            .map(|(_, field)| field)
            .ok_or_else(|| TupleError::IndexOutOfRange {
                index,
                len: self.fields.len(),
                scheme: self.identity.clone(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

impl PartialEq for Scheme {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity && self.fields == other.fields
    }
}

/// Append-only scheme construction
#[derive(Debug)]
pub struct SchemeBuilder {
    identity: TypeIdentity,
    fields: IndexMap<String, Field>,
}

impl SchemeBuilder {
    /// Append a non-nullable field
    pub fn field(self, name: &str, declared_type: TypeRef) -> Result<Self> {
        self.push(name, declared_type, false)
    }

    /// Append a field that accepts a present null
    pub fn nullable_field(self, name: &str, declared_type: TypeRef) -> Result<Self> {
        self.push(name, declared_type, true)
    }

    pub fn push(mut self, name: &str, declared_type: TypeRef, nullable: bool) -> Result<Self> {
        if self.fields.contains_key(name) {
            return Err(TupleError::DuplicateField {
                name: name.to_string(),
                scheme: self.identity,
            });
        }

        let index = self.fields.len();
        self.fields.insert(
            name.to_string(),
            Field {
                name: name.to_string(),
                declared_type,
                index,
                nullable,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> Arc<Scheme> {
        Arc::new(Scheme {
            identity: self.identity,
            fields: self.fields,
        })
    }
}
