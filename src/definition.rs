//! Type definition documents.
//!
//! A definition is itself a structural document, read by the tuple reader
//! against two bootstrap schemes:
//!
//! ```xml
//! <def:type xmlns:def="urn:xml-tuples:definition" name="urn:example#Widget">
//!   <fields>
//!     <def:field name="title" type="http://www.w3.org/2001/XMLSchema#string"/>
//!     <def:field name="friend" type="urn:example#Widget" nullable="true"/>
//!   </fields>
//! </def:type>
//! ```

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use roxmltree::Document;

use crate::error::{Result, TupleError};
use crate::identity::TypeIdentity;
use crate::markup;
use crate::reader::DEFAULT_MAX_DEPTH;
use crate::scheme::Scheme;
use crate::scheme_resolver::StaticSchemeResolver;
use crate::tuple::{EditableTupleFactory, Tuple};
use crate::types::{ListType, Primitive, PrimitiveType, SchemeType};
use crate::value::Value;

pub const DEFINITION_NAMESPACE: &str = "urn:xml-tuples:definition";

static DEFINITION_SCHEMES: OnceLock<StaticSchemeResolver> = OnceLock::new();

fn bootstrap_schemes() -> Result<StaticSchemeResolver> {
    let string = PrimitiveType::get(Primitive::String);
    let boolean = PrimitiveType::get(Primitive::Boolean);

    let field = Scheme::builder(format!("{}#field", DEFINITION_NAMESPACE))
        .field("name", string.clone())?
        .field("type", string.clone())?
        .field("nullable", boolean.clone())?
        .field("list", boolean)?
        .build();

    let fields = Arc::new(ListType::new(Arc::new(SchemeType::new(field.clone()))));
    let definition = Scheme::builder(format!("{}#type", DEFINITION_NAMESPACE))
        .field("name", string)?
        .field("fields", fields)?
        .build();

    Ok(StaticSchemeResolver::new()
        .with_scheme(field)
        .with_scheme(definition))
}

/// Schemes for `def:type` and `def:field` elements
pub fn definition_schemes() -> Result<&'static StaticSchemeResolver> {
    if let Some(schemes) = DEFINITION_SCHEMES.get() {
        return Ok(schemes);
    }
    let built = bootstrap_schemes()?;
    Ok(DEFINITION_SCHEMES.get_or_init(|| built))
}

/// One declared field of a type definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub type_identity: TypeIdentity,
    pub nullable: bool,
    pub list: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, type_identity: impl Into<TypeIdentity>) -> Self {
        Self {
            name: name.into(),
            type_identity: type_identity.into(),
            nullable: false,
            list: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }
}

/// Parsed content of a definition document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: TypeIdentity,
    pub fields: Vec<FieldDefinition>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<TypeIdentity>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Parse a definition document that was loaded for `identity`.
    pub fn parse(text: &str, identity: &TypeIdentity) -> Result<Self> {
        let parsing = |details: String| TupleError::DefinitionParsing {
            identity: identity.clone(),
            details,
        };

        let document = Document::parse(text).map_err(|e| parsing(e.to_string()))?;
        let tuple = markup::read_document(
            &document,
            definition_schemes()?,
            &EditableTupleFactory,
            DEFAULT_MAX_DEPTH,
        )
        .map_err(|e| parsing(e.to_string()))?;

        let name = required_str(&tuple, "name").map_err(&parsing)?;
        let mut fields = Vec::new();
        if let Some(items) = tuple.get("fields")?.and_then(Value::as_list) {
            for item in items {
                let Some(field) = item.as_tuple() else {
                    return Err(parsing(format!("unexpected {} in fields", item.kind())));
                };
                fields.push(FieldDefinition {
                    name: required_str(field, "name").map_err(&parsing)?.to_string(),
                    type_identity: TypeIdentity::new(
                        required_str(field, "type").map_err(&parsing)?,
                    ),
                    nullable: flag(field, "nullable")?,
                    list: flag(field, "list")?,
                });
            }
        }

        Ok(Self {
            name: TypeIdentity::new(name),
            fields,
        })
    }

    /// Render as a definition document accepted by [`TypeDefinition::parse`].
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<def:type xmlns:def="{}" name="{}">"#,
            DEFINITION_NAMESPACE,
            escape(self.name.as_str())
        );
        out.push_str("  <fields>\n");
        for field in &self.fields {
            let _ = write!(
                out,
                r#"    <def:field name="{}" type="{}""#,
                escape(&field.name),
                escape(field.type_identity.as_str())
            );
            if field.nullable {
                out.push_str(r#" nullable="true""#);
            }
            if field.list {
                out.push_str(r#" list="true""#);
            }
            out.push_str("/>\n");
        }
        out.push_str("  </fields>\n</def:type>\n");
        out
    }
}

fn required_str<'t>(tuple: &'t Tuple, name: &str) -> std::result::Result<&'t str, String> {
    match tuple.get(name) {
        Ok(Some(Value::String(s))) if !s.trim().is_empty() => Ok(s.trim()),
        Ok(_) => Err(format!(
            "{} is missing '{}'",
            tuple.scheme().identity().local_name(),
            name
        )),
        Err(e) => Err(e.to_string()),
    }
}

fn flag(tuple: &Tuple, name: &str) -> Result<bool> {
    Ok(tuple.get(name)?.and_then(Value::as_bool).unwrap_or(false))
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
