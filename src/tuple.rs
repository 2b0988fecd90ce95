//! Tuples: runtime record instances of a scheme.

use std::sync::Arc;

use crate::error::{Result, TupleError};
use crate::scheme::{Field, Scheme};
use crate::value::Value;

/// One record instance: a scheme plus one slot per field.
///
/// A slot is either absent (`None`) or holds a [`Value`], which may itself be
/// a present [`Value::Null`].
#[derive(Debug, Clone)]
pub struct Tuple {
    scheme: Arc<Scheme>,
    values: Vec<Option<Value>>,
    frozen: bool,
}

impl Tuple {
    /// Editable tuple with every slot absent
    pub fn new(scheme: Arc<Scheme>) -> Self {
        let values = vec![None; scheme.len()];
        Self {
            scheme,
            values,
            frozen: false,
        }
    }

    /// Frozen tuple built from positional values, checked against the scheme up front.
    pub fn frozen(scheme: Arc<Scheme>, values: Vec<Option<Value>>) -> Result<Self> {
        if values.len() != scheme.len() {
            return Err(TupleError::IndexOutOfRange {
                index: values.len(),
                len: scheme.len(),
                scheme: scheme.identity().clone(),
            });
        }

        for (field, value) in scheme.fields().zip(&values) {
            if let Some(value) = value {
                check_assignable(field, value)?;
            }
        }

        Ok(Self {
            scheme,
            values,
            frozen: true,
        })
    }

    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Make this tuple immutable. Freezing twice is harmless.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn get(&self, name: &str) -> Result<Option<&Value>> {
        let index = self.scheme.find_field(name)?.index();
        Ok(self.values[index].as_ref())
    }

    pub fn get_at(&self, index: usize) -> Result<Option<&Value>> {
        self.scheme.field_at(index)?;
        Ok(self.values[index].as_ref())
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let index = self.scheme.find_field(name)?.index();
        self.set_at(index, value)
    }

    pub fn set_at(&mut self, index: usize, value: Value) -> Result<()> {
        if self.frozen {
            return Err(TupleError::ImmutableTuple {
                scheme: self.scheme.identity().clone(),
            });
        }

        let field = self.scheme.field_at(index)?;
        check_assignable(field, &value)?;
        self.values[index] = Some(value);
        Ok(())
    }

    /// Return a slot to the absent state
    pub fn unset(&mut self, name: &str) -> Result<Option<Value>> {
        if self.frozen {
            return Err(TupleError::ImmutableTuple {
                scheme: self.scheme.identity().clone(),
            });
        }
        let index = self.scheme.find_field(name)?.index();
        Ok(self.values[index].take())
    }

    pub fn is_set(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_some())
    }

    /// Fields whose slots hold a value, in declaration order
    pub fn present(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.scheme
            .fields()
            .zip(&self.values)
            .filter_map(|(field, value)| value.as_ref().map(|v| (field, v)))
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.scheme.identity() == other.scheme.identity() && self.values == other.values
    }
}

fn check_assignable(field: &Field, value: &Value) -> Result<()> {
    if value.is_null() {
        if field.is_nullable() {
            return Ok(());
        }
        return Err(TupleError::TypeMismatch {
            expected: field.declared_type().identity().clone(),
            details: format!("field '{}' is not nullable", field.name()),
        });
    }

    field
        .declared_type()
        .validate(value)
        .map_err(|e| match e {
            TupleError::TypeMismatch { expected, details } => TupleError::TypeMismatch {
                expected,
                details: format!("field '{}': {}", field.name(), details),
            },
            other => other,
        })
}

/// Allocates tuples for a scheme and finishes them once fully populated
pub trait TupleFactory: Send + Sync {
    fn create(&self, scheme: &Arc<Scheme>) -> Tuple;

    /// Called once every field has been populated.
    fn complete(&self, tuple: Tuple) -> Tuple {
        tuple
    }
}

/// Produces tuples that stay editable after construction
#[derive(Debug, Default, Clone, Copy)]
pub struct EditableTupleFactory;

impl TupleFactory for EditableTupleFactory {
    fn create(&self, scheme: &Arc<Scheme>) -> Tuple {
        Tuple::new(Arc::clone(scheme))
    }
}

/// Produces tuples that freeze as soon as construction completes
#[derive(Debug, Default, Clone, Copy)]
pub struct FrozenTupleFactory;

impl TupleFactory for FrozenTupleFactory {
    fn create(&self, scheme: &Arc<Scheme>) -> Tuple {
        Tuple::new(Arc::clone(scheme))
    }

    fn complete(&self, mut tuple: Tuple) -> Tuple {
        tuple.freeze();
        tuple
    }
}
