//! The type system: primitive, list and aggregate types, and lazily linked placeholders.
//!
//! Every type converts values to and from a generic composite form (JSON) and
//! from markup character data. Aggregate types expose a [`Scheme`].
//!
//! A [`DelegatingType`] is a stable handle whose content is populated once by
//! linking. Field declarations may point at a handle before it is linked, which
//! is what makes forward and cyclic references between definitions possible.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number};
use tokio::sync::OnceCell;

use crate::error::{Result, TupleError};
use crate::identity::{TypeIdentity, XSD_NAMESPACE};
use crate::scheme::Scheme;
use crate::tuple::TupleFactory;
use crate::value::{NativeRepresentation, Value};

/// Shared, read-only reference to a type
pub type TypeRef = Arc<dyn Type>;

/// Behavior common to every kind of type
pub trait Type: Send + Sync + fmt::Debug {
    fn identity(&self) -> &TypeIdentity;

    /// False only for placeholders whose definition has not been linked yet
    fn is_linked(&self) -> bool {
        true
    }

    /// Field list, for aggregate types
    fn scheme(&self) -> Result<Option<Arc<Scheme>>>;

    fn native_representation(&self) -> Result<NativeRepresentation>;

    fn is_aggregate(&self) -> Result<bool> {
        Ok(self.native_representation()? == NativeRepresentation::Tuple)
    }

    fn is_primitive(&self) -> Result<bool> {
        Ok(!matches!(
            self.native_representation()?,
            NativeRepresentation::Tuple | NativeRepresentation::List
        ))
    }

    /// Item type, for list types
    fn element_type(&self) -> Result<Option<TypeRef>> {
        Ok(None)
    }

    /// Check that a (non-null) value is assignable to this type
    fn validate(&self, value: &Value) -> Result<()>;

    /// Convert accumulated character data into a value
    fn parse_text(&self, text: &str) -> Result<Value>;

    /// Canonical value for an element with neither text nor children; `None` leaves the slot absent.
    fn empty_value(&self) -> Result<Option<Value>> {
        Ok(None)
    }

    fn to_composite(&self, value: &Value) -> Result<serde_json::Value>;

    /// Rebuild a value from its composite form, allocating nested tuples through `instances`.
    fn from_composite(
        &self,
        composite: &serde_json::Value,
        instances: &dyn TupleFactory,
    ) -> Result<Value>;
}

fn mismatch(expected: &TypeIdentity, details: impl Into<String>) -> TupleError {
    TupleError::TypeMismatch {
        expected: expected.clone(),
        details: details.into(),
    }
}

/// Built-in scalar kinds, named after their XML Schema datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Int,
    Long,
    Double,
    Boolean,
    DateTime,
}

impl Primitive {
    pub const ALL: [Primitive; 6] = [
        Primitive::String,
        Primitive::Int,
        Primitive::Long,
        Primitive::Double,
        Primitive::Boolean,
        Primitive::DateTime,
    ];

    pub fn local_name(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Double => "double",
            Primitive::Boolean => "boolean",
            Primitive::DateTime => "dateTime",
        }
    }

    pub fn identity(self) -> TypeIdentity {
        TypeIdentity::new(format!("{}#{}", XSD_NAMESPACE, self.local_name()))
    }

    fn representation(self) -> NativeRepresentation {
        match self {
            Primitive::String => NativeRepresentation::String,
            Primitive::Int => NativeRepresentation::Int,
            Primitive::Long => NativeRepresentation::Long,
            Primitive::Double => NativeRepresentation::Double,
            Primitive::Boolean => NativeRepresentation::Boolean,
            Primitive::DateTime => NativeRepresentation::DateTime,
        }
    }
}

static PRIMITIVES: OnceLock<Vec<TypeRef>> = OnceLock::new();

fn primitives() -> &'static [TypeRef] {
    PRIMITIVES.get_or_init(|| {
        Primitive::ALL
            .iter()
            .map(|&primitive| {
                Arc::new(PrimitiveType {
                    primitive,
                    identity: primitive.identity(),
                }) as TypeRef
            })
            .collect()
    })
}

/// A scalar type with a fixed native representation
#[derive(Debug)]
pub struct PrimitiveType {
    primitive: Primitive,
    identity: TypeIdentity,
}

impl PrimitiveType {
    /// Shared instance for a primitive kind
    pub fn get(primitive: Primitive) -> TypeRef {
        Arc::clone(&primitives()[primitive as usize])
    }

    /// Built-in type registered under `identity`, if any
    pub fn lookup(identity: &TypeIdentity) -> Option<TypeRef> {
        primitives()
            .iter()
            .find(|t| t.identity() == identity)
            .cloned()
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    fn parse_date_time(&self, text: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc())
            })
            .map_err(|e| mismatch(&self.identity, format!("cannot parse '{}': {}", text, e)))
    }
}

impl Type for PrimitiveType {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn scheme(&self) -> Result<Option<Arc<Scheme>>> {
        Ok(None)
    }

    fn native_representation(&self) -> Result<NativeRepresentation> {
        Ok(self.primitive.representation())
    }

    fn validate(&self, value: &Value) -> Result<()> {
        let ok = match (self.primitive, value) {
            (Primitive::String, Value::String(_)) => true,
            (Primitive::Int, Value::Int(_)) => true,
            (Primitive::Long, Value::Int(_) | Value::Long(_)) => true,
            (Primitive::Double, Value::Int(_) | Value::Double(_)) => true,
            (Primitive::Boolean, Value::Boolean(_)) => true,
            (Primitive::DateTime, Value::DateTime(_)) => true,
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(mismatch(&self.identity, format!("found {}", value.kind())))
        }
    }

    fn parse_text(&self, text: &str) -> Result<Value> {
        if self.primitive == Primitive::String {
            return Ok(Value::String(text.to_string()));
        }

        let trimmed = text.trim();
        let unparsable =
            |e: &dyn fmt::Display| mismatch(&self.identity, format!("cannot parse '{}': {}", trimmed, e));

        match self.primitive {
            Primitive::String => unreachable!("handled above"),
            Primitive::Int => trimmed
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|e| unparsable(&e)),
            Primitive::Long => trimmed
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|e| unparsable(&e)),
            Primitive::Double => match trimmed {
                "INF" => Ok(Value::Double(f64::INFINITY)),
                "-INF" => Ok(Value::Double(f64::NEG_INFINITY)),
                "NaN" => Ok(Value::Double(f64::NAN)),
                _ => trimmed
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|e| unparsable(&e)),
            },
            Primitive::Boolean => match trimmed {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err(unparsable(&"expected true, false, 1 or 0")),
            },
            Primitive::DateTime => self.parse_date_time(trimmed).map(Value::DateTime),
        }
    }

    fn empty_value(&self) -> Result<Option<Value>> {
        Ok(match self.primitive {
            Primitive::String => Some(Value::String(String::new())),
            _ => None,
        })
    }

    fn to_composite(&self, value: &Value) -> Result<serde_json::Value> {
        if value.is_null() {
            return Ok(serde_json::Value::Null);
        }
        self.validate(value)?;

        Ok(match value {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(_) | Value::Long(_) if self.primitive != Primitive::Double => {
                serde_json::Value::from(value.as_i64().unwrap_or_default())
            }
            Value::Int(_) | Value::Double(_) => {
                let v = value.as_f64().unwrap_or_default();
                match Number::from_f64(v) {
                    Some(number) => serde_json::Value::Number(number),
                    // JSON has no non-finite numbers; use the XSD lexical forms
                    None if v.is_nan() => serde_json::Value::from("NaN"),
                    None if v > 0.0 => serde_json::Value::from("INF"),
                    None => serde_json::Value::from("-INF"),
                }
            }
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::DateTime(dt) => {
                serde_json::Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            other => return Err(mismatch(&self.identity, format!("found {}", other.kind()))),
        })
    }

    fn from_composite(
        &self,
        composite: &serde_json::Value,
        _instances: &dyn TupleFactory,
    ) -> Result<Value> {
        if composite.is_null() {
            return Ok(Value::Null);
        }

        let converted = match self.primitive {
            Primitive::String => composite.as_str().map(Value::from),
            Primitive::Int => composite
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int),
            Primitive::Long => composite.as_i64().map(Value::Long),
            Primitive::Double => match composite.as_str() {
                Some("INF") => Some(Value::Double(f64::INFINITY)),
                Some("-INF") => Some(Value::Double(f64::NEG_INFINITY)),
                Some("NaN") => Some(Value::Double(f64::NAN)),
                _ => composite.as_f64().map(Value::Double),
            },
            Primitive::Boolean => composite.as_bool().map(Value::Boolean),
            Primitive::DateTime => match composite.as_str() {
                Some(text) => Some(Value::DateTime(self.parse_date_time(text)?)),
                None => None,
            },
        };

        converted.ok_or_else(|| mismatch(&self.identity, format!("found composite {}", composite)))
    }
}

/// Homogeneous sequence of an element type
#[derive(Debug)]
pub struct ListType {
    identity: TypeIdentity,
    element: TypeRef,
}

impl ListType {
    pub fn new(element: TypeRef) -> Self {
        let identity = TypeIdentity::new(format!("{}[]", element.identity()));
        Self { identity, element }
    }
}

impl Type for ListType {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn scheme(&self) -> Result<Option<Arc<Scheme>>> {
        Ok(None)
    }

    fn native_representation(&self) -> Result<NativeRepresentation> {
        Ok(NativeRepresentation::List)
    }

    fn element_type(&self) -> Result<Option<TypeRef>> {
        Ok(Some(Arc::clone(&self.element)))
    }

    fn validate(&self, value: &Value) -> Result<()> {
        match value {
            Value::List(items) => {
                for (position, item) in items.iter().enumerate() {
                    self.element.validate(item).map_err(|e| match e {
                        TupleError::TypeMismatch { details, .. } => mismatch(
                            &self.identity,
                            format!("item {}: {}", position, details),
                        ),
                        other => other,
                    })?;
                }
                Ok(())
            }
            other => Err(mismatch(&self.identity, format!("found {}", other.kind()))),
        }
    }

    /// Whitespace-separated items, each converted by the element type
    fn parse_text(&self, text: &str) -> Result<Value> {
        text.split_whitespace()
            .map(|item| self.element.parse_text(item))
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    }

    fn empty_value(&self) -> Result<Option<Value>> {
        Ok(Some(Value::List(Vec::new())))
    }

    fn to_composite(&self, value: &Value) -> Result<serde_json::Value> {
        match value {
            Value::Null => Ok(serde_json::Value::Null),
            Value::List(items) => items
                .iter()
                .map(|item| self.element.to_composite(item))
                .collect::<Result<Vec<_>>>()
                .map(serde_json::Value::Array),
            other => Err(mismatch(&self.identity, format!("found {}", other.kind()))),
        }
    }

    fn from_composite(
        &self,
        composite: &serde_json::Value,
        instances: &dyn TupleFactory,
    ) -> Result<Value> {
        match composite {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| self.element.from_composite(item, instances))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(mismatch(&self.identity, format!("found composite {}", other))),
        }
    }
}

/// Aggregate type backed by a scheme
#[derive(Debug)]
pub struct SchemeType {
    scheme: Arc<Scheme>,
}

impl SchemeType {
    pub fn new(scheme: Arc<Scheme>) -> Self {
        Self { scheme }
    }
}

impl Type for SchemeType {
    fn identity(&self) -> &TypeIdentity {
        self.scheme.identity()
    }

    fn scheme(&self) -> Result<Option<Arc<Scheme>>> {
        Ok(Some(Arc::clone(&self.scheme)))
    }

    fn native_representation(&self) -> Result<NativeRepresentation> {
        Ok(NativeRepresentation::Tuple)
    }

    fn validate(&self, value: &Value) -> Result<()> {
        match value {
            Value::Tuple(tuple) if tuple.scheme().identity() == self.identity() => Ok(()),
            Value::Tuple(tuple) => Err(mismatch(
                self.identity(),
                format!("found tuple of {}", tuple.scheme().identity()),
            )),
            other => Err(mismatch(self.identity(), format!("found {}", other.kind()))),
        }
    }

    fn parse_text(&self, text: &str) -> Result<Value> {
        Err(mismatch(
            self.identity(),
            format!("aggregate value cannot be read from text '{}'", text.trim()),
        ))
    }

    fn to_composite(&self, value: &Value) -> Result<serde_json::Value> {
        if value.is_null() {
            return Ok(serde_json::Value::Null);
        }
        self.validate(value)?;

        let mut object = Map::new();
        if let Value::Tuple(tuple) = value {
            for (field, field_value) in tuple.present() {
                let composite = field.declared_type().to_composite(field_value)?;
                object.insert(field.name().to_string(), composite);
            }
        }
        Ok(serde_json::Value::Object(object))
    }

    fn from_composite(
        &self,
        composite: &serde_json::Value,
        instances: &dyn TupleFactory,
    ) -> Result<Value> {
        let object = match composite {
            serde_json::Value::Null => return Ok(Value::Null),
            serde_json::Value::Object(object) => object,
            other => {
                return Err(mismatch(
                    self.identity(),
                    format!("found composite {}", other),
                ));
            }
        };

        let mut tuple = instances.create(&self.scheme);
        for (name, field_composite) in object {
            let field = self
                .scheme
                .find_field(name)
                .map_err(|_| TupleError::UnknownField {
                    field: name.clone(),
                    scheme: self.identity().clone(),
                })?;
            let value = field
                .declared_type()
                .from_composite(field_composite, instances)?;
            tuple.set_at(field.index(), value)?;
        }

        Ok(Value::from(instances.complete(tuple)))
    }
}

/// Content installed into a [`DelegatingType`] by linking
pub(crate) struct LinkedContent {
    pub(crate) delegate: TypeRef,
    pub(crate) dependencies: Vec<Arc<DelegatingType>>,
}

/// Placeholder that forwards every call to a delegate installed by linking.
///
/// Calls made before linking fail with [`TupleError::NotLinked`].
pub struct DelegatingType {
    identity: TypeIdentity,
    content: OnceCell<LinkedContent>,
}

impl DelegatingType {
    pub fn new(identity: TypeIdentity) -> Self {
        Self {
            identity,
            content: OnceCell::new(),
        }
    }

    pub fn delegate(&self) -> Result<&TypeRef> {
        self.content
            .get()
            .map(|content| &content.delegate)
            .ok_or_else(|| TupleError::NotLinked {
                identity: self.identity.clone(),
            })
    }

    /// Placeholders this type's fields refer to; empty until linked.
    pub(crate) fn dependencies(&self) -> &[Arc<DelegatingType>] {
        self.content
            .get()
            .map(|content| content.dependencies.as_slice())
            .unwrap_or_default()
    }

    /// Install the delegate exactly once.
    ///
    /// Concurrent callers wait for the single running `load`; later calls are
    /// no-ops. Returns true when this call performed the link.
    pub(crate) async fn link_with<F, Fut>(&self, load: F) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LinkedContent>>,
    {
        let mut performed = false;
        self.content
            .get_or_try_init(|| {
                performed = true;
                load()
            })
            .await?;
        Ok(performed)
    }
}

impl fmt::Debug for DelegatingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatingType")
            .field("identity", &self.identity)
            .field("linked", &self.content.initialized())
            .finish()
    }
}

impl Type for DelegatingType {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn is_linked(&self) -> bool {
        self.content.initialized()
    }

    fn scheme(&self) -> Result<Option<Arc<Scheme>>> {
        self.delegate()?.scheme()
    }

    fn native_representation(&self) -> Result<NativeRepresentation> {
        self.delegate()?.native_representation()
    }

    fn is_aggregate(&self) -> Result<bool> {
        self.delegate()?.is_aggregate()
    }

    fn is_primitive(&self) -> Result<bool> {
        self.delegate()?.is_primitive()
    }

    fn element_type(&self) -> Result<Option<TypeRef>> {
        self.delegate()?.element_type()
    }

    fn validate(&self, value: &Value) -> Result<()> {
        self.delegate()?.validate(value)
    }

    fn parse_text(&self, text: &str) -> Result<Value> {
        self.delegate()?.parse_text(text)
    }

    fn empty_value(&self) -> Result<Option<Value>> {
        self.delegate()?.empty_value()
    }

    fn to_composite(&self, value: &Value) -> Result<serde_json::Value> {
        self.delegate()?.to_composite(value)
    }

    fn from_composite(
        &self,
        composite: &serde_json::Value,
        instances: &dyn TupleFactory,
    ) -> Result<Value> {
        self.delegate()?.from_composite(composite, instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{EditableTupleFactory, Tuple};
    use chrono::TimeZone;

    fn sample(primitive: Primitive) -> Value {
        match primitive {
            Primitive::String => Value::from("Hello"),
            Primitive::Int => Value::Int(-7),
            Primitive::Long => Value::Long(9_000_000_000),
            Primitive::Double => Value::Double(2.5),
            Primitive::Boolean => Value::Boolean(true),
            Primitive::DateTime => {
                Value::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
            }
        }
    }

    #[test]
    fn test_primitive_lookup_by_identity() {
        for primitive in Primitive::ALL {
            let found = PrimitiveType::lookup(&primitive.identity()).unwrap();
            assert_eq!(found.identity(), &primitive.identity());
            assert!(found.is_primitive().unwrap());
            assert!(!found.is_aggregate().unwrap());
        }
        assert!(PrimitiveType::lookup(&TypeIdentity::new("urn:example#Widget")).is_none());
    }

    #[test]
    fn test_tuple_composite_round_trip_for_every_primitive() {
        let mut builder = Scheme::builder("urn:example#Everything");
        for primitive in Primitive::ALL {
            builder = builder
                .field(primitive.local_name(), PrimitiveType::get(primitive))
                .unwrap();
        }
        let scheme = builder.build();
        let aggregate = SchemeType::new(scheme.clone());

        let mut tuple = Tuple::new(scheme);
        for primitive in Primitive::ALL {
            tuple.set(primitive.local_name(), sample(primitive)).unwrap();
        }
        let value = Value::from(tuple);

        let composite = aggregate.to_composite(&value).unwrap();
        let restored = aggregate
            .from_composite(&composite, &EditableTupleFactory)
            .unwrap();

        let original = value.as_tuple().unwrap();
        let restored = restored.as_tuple().unwrap();
        for primitive in Primitive::ALL {
            assert_eq!(
                original.get(primitive.local_name()).unwrap(),
                restored.get(primitive.local_name()).unwrap(),
                "{} did not survive the round trip",
                primitive.local_name()
            );
        }
    }

    #[test]
    fn test_parse_text() {
        let int = PrimitiveType::get(Primitive::Int);
        assert_eq!(int.parse_text(" 42\n").unwrap(), Value::Int(42));
        assert!(matches!(
            int.parse_text("forty-two"),
            Err(TupleError::TypeMismatch { .. })
        ));

        let string = PrimitiveType::get(Primitive::String);
        assert_eq!(string.parse_text(" padded ").unwrap(), Value::from(" padded "));

        let boolean = PrimitiveType::get(Primitive::Boolean);
        assert_eq!(boolean.parse_text("1").unwrap(), Value::Boolean(true));
        assert_eq!(boolean.parse_text("false").unwrap(), Value::Boolean(false));

        let double = PrimitiveType::get(Primitive::Double);
        assert_eq!(
            double.parse_text("-INF").unwrap(),
            Value::Double(f64::NEG_INFINITY)
        );

        let date_time = PrimitiveType::get(Primitive::DateTime);
        assert_eq!(
            date_time.parse_text("2024-03-01T12:30:00Z").unwrap(),
            sample(Primitive::DateTime)
        );
        assert_eq!(
            date_time.parse_text("2024-03-01T12:30:00").unwrap(),
            sample(Primitive::DateTime)
        );
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(
            PrimitiveType::get(Primitive::String).empty_value().unwrap(),
            Some(Value::from(""))
        );
        assert_eq!(
            PrimitiveType::get(Primitive::Int).empty_value().unwrap(),
            None
        );
        let list = ListType::new(PrimitiveType::get(Primitive::Int));
        assert_eq!(list.empty_value().unwrap(), Some(Value::List(vec![])));
    }

    #[test]
    fn test_list_parse_text_and_identity() {
        let list = ListType::new(PrimitiveType::get(Primitive::Int));
        assert_eq!(
            list.identity().as_str(),
            "http://www.w3.org/2001/XMLSchema#int[]"
        );
        assert_eq!(
            list.parse_text(" 1 2\n3 ").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert!(list.validate(&Value::List(vec![Value::from("x")])).is_err());
    }

    #[test]
    fn test_non_finite_double_round_trip() {
        let double = PrimitiveType::get(Primitive::Double);

        for lexical in ["INF", "-INF", "NaN"] {
            let value = double.parse_text(lexical).unwrap();
            let composite = double.to_composite(&value).unwrap();
            assert_eq!(composite, serde_json::Value::from(lexical));

            let back = double
                .from_composite(&composite, &EditableTupleFactory)
                .unwrap();
            match (value, back) {
                (Value::Double(a), Value::Double(b)) if a.is_nan() => assert!(b.is_nan()),
                (a, b) => assert_eq!(a, b),
            }
        }
    }

    #[test]
    fn test_non_finite_double_in_aggregate_composite() {
        let scheme = Scheme::builder("urn:example#Reading")
            .field("d", PrimitiveType::get(Primitive::Double))
            .unwrap()
            .build();
        let reading = SchemeType::new(scheme.clone());

        let mut tuple = Tuple::new(scheme);
        tuple.set("d", Value::Double(f64::NEG_INFINITY)).unwrap();
        let composite = reading.to_composite(&Value::from(tuple)).unwrap();
        assert_eq!(composite["d"], "-INF");
    }

    #[tokio::test]
    async fn test_delegating_type_before_and_after_link() {
        let handle = DelegatingType::new(TypeIdentity::new("urn:example#Part"));
        assert!(!handle.is_linked());
        assert!(matches!(handle.scheme(), Err(TupleError::NotLinked { .. })));
        assert!(matches!(
            handle.validate(&Value::from("x")),
            Err(TupleError::NotLinked { .. })
        ));

        let scheme = Scheme::builder("urn:example#Part")
            .field("name", PrimitiveType::get(Primitive::String))
            .unwrap()
            .build();
        let content = LinkedContent {
            delegate: Arc::new(SchemeType::new(scheme.clone())),
            dependencies: Vec::new(),
        };

        let performed = handle.link_with(move || async move { Ok(content) }).await.unwrap();
        assert!(performed);
        assert!(handle.is_linked());
        assert!(handle.is_aggregate().unwrap());
        assert_eq!(handle.scheme().unwrap().unwrap().identity(), scheme.identity());

        // Already linked: the failing loader is never run
        let again = handle
            .link_with(|| async { Err(TupleError::ReaderFailed) })
            .await
            .unwrap();
        assert!(!again);
    }
}
