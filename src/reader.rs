//! Push-event reader that rebuilds typed tuple graphs from structural markup.
//!
//! Element roles alternate with depth: the root opens a tuple, its children
//! name fields of that tuple, their children open nested tuples, and so on.
//! Each open tuple owns one [`Frame`] on the construction stack until its
//! element closes, at which point the finished tuple moves into the parent's
//! pending field (or becomes the result, for the root).

use tracing::trace;

use crate::error::{Result, TupleError};
use crate::identity::QName;
use crate::scheme::Field;
use crate::scheme_resolver::SchemeResolver;
use crate::tuple::{Tuple, TupleFactory};
use crate::value::{NativeRepresentation, Value};

/// Nesting limit used when none is configured
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    AwaitingRoot,
    InTuple,
    InField,
    Complete,
    Failed,
}

/// How an opened element is interpreted, decided from the reader state alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRole {
    TupleStart,
    FieldStart,
}

/// An attribute on an element as delivered by the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }

    /// Un-namespaced attribute
    pub fn plain(local: &str, value: impl Into<String>) -> Self {
        Self::new(QName::new(None, local), value)
    }
}

#[derive(Debug)]
struct PendingField {
    index: usize,
    element: QName,
    text: String,
    children: Vec<Value>,
}

#[derive(Debug)]
struct Frame {
    element: QName,
    tuple: Tuple,
    pending: Option<PendingField>,
}

/// Single-document, single-threaded reader. Reusable only after [`reset`](Self::reset).
pub struct StructuralTupleReader<'a> {
    schemes: &'a dyn SchemeResolver,
    factory: &'a dyn TupleFactory,
    stack: Vec<Frame>,
    result: Option<Tuple>,
    complete: bool,
    failed: bool,
    max_depth: usize,
}

impl<'a> StructuralTupleReader<'a> {
    pub fn new(schemes: &'a dyn SchemeResolver, factory: &'a dyn TupleFactory) -> Self {
        Self {
            schemes,
            factory,
            stack: Vec::new(),
            result: None,
            complete: false,
            failed: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit on simultaneously open tuples
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn state(&self) -> ReaderState {
        if self.failed {
            return ReaderState::Failed;
        }
        if self.complete {
            return ReaderState::Complete;
        }
        match self.stack.last() {
            None => ReaderState::AwaitingRoot,
            Some(frame) if frame.pending.is_some() => ReaderState::InField,
            Some(_) => ReaderState::InTuple,
        }
    }

    /// Number of tuples currently under construction
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Return to `AwaitingRoot`, dropping any partial or finished result.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.result = None;
        self.complete = false;
        self.failed = false;
    }

    pub fn open(&mut self, name: &QName, attributes: &[Attribute]) -> Result<ElementRole> {
        let role = match self.state() {
            ReaderState::Failed => return Err(TupleError::ReaderFailed),
            ReaderState::Complete => {
                let error = TupleError::UnexpectedEvent {
                    details: format!("element {} opened after the root closed", name),
                };
                return Err(self.fail(error));
            }
            ReaderState::AwaitingRoot | ReaderState::InField => ElementRole::TupleStart,
            ReaderState::InTuple => ElementRole::FieldStart,
        };

        let outcome = match role {
            ElementRole::TupleStart => self.open_tuple(name, attributes),
            ElementRole::FieldStart => self.open_field(name, attributes),
        };
        outcome.map(|_| role).map_err(|e| self.fail(e))
    }

    /// Character data; concatenated while a field is open, ignored elsewhere.
    pub fn text(&mut self, chars: &str) -> Result<()> {
        if self.failed {
            return Err(TupleError::ReaderFailed);
        }
        if let Some(pending) = self.stack.last_mut().and_then(|f| f.pending.as_mut()) {
            pending.text.push_str(chars);
        }
        Ok(())
    }

    pub fn close(&mut self, name: &QName) -> Result<()> {
        let outcome = match self.state() {
            ReaderState::Failed => return Err(TupleError::ReaderFailed),
            ReaderState::AwaitingRoot | ReaderState::Complete => Err(TupleError::UnexpectedEvent {
                details: format!("close of {} without a matching open", name),
            }),
            ReaderState::InField => self.close_field(name),
            ReaderState::InTuple => self.close_tuple(name),
        };
        outcome.map_err(|e| self.fail(e))
    }

    /// The root tuple once the document is complete
    pub fn finish(&mut self) -> Result<Tuple> {
        if self.failed {
            return Err(TupleError::ReaderFailed);
        }
        match self.result.take() {
            Some(tuple) if self.stack.is_empty() => Ok(tuple),
            _ => Err(TupleError::UnexpectedEvent {
                details: format!("document ended with {} open tuple(s)", self.stack.len()),
            }),
        }
    }

    /// Take the result without checking for completion.
    pub fn take_result(&mut self) -> Option<Tuple> {
        self.result.take()
    }

    fn fail(&mut self, error: TupleError) -> TupleError {
        self.stack.clear();
        self.result = None;
        self.failed = true;
        error
    }

    fn open_tuple(&mut self, name: &QName, attributes: &[Attribute]) -> Result<()> {
        let enclosing = self
            .stack
            .last()
            .map(|frame| frame.tuple.scheme().identity().clone());

        if self.stack.len() >= self.max_depth {
            return Err(TupleError::DepthExceeded {
                depth: self.stack.len() + 1,
                limit: self.max_depth,
            }
            .at(name, enclosing.as_ref()));
        }

        let scheme = self.schemes.resolve_scheme(name).ok_or_else(|| {
            TupleError::SchemeNotFound { name: name.clone() }.at(name, enclosing.as_ref())
        })?;

        let mut tuple = self.factory.create(&scheme);
        for attribute in attributes.iter().filter(|a| a.name.namespace.is_none()) {
            apply_attribute(&mut tuple, attribute)
                .map_err(|e| e.at(name, Some(scheme.identity())))?;
        }

        trace!("Opened tuple {} at depth {}", scheme.identity(), self.stack.len());
        self.stack.push(Frame {
            element: name.clone(),
            tuple,
            pending: None,
        });
        Ok(())
    }

    fn open_field(&mut self, name: &QName, attributes: &[Attribute]) -> Result<()> {
        let Some(frame) = self.stack.last_mut() else {
            return Err(TupleError::UnexpectedEvent {
                details: format!("field {} opened outside a tuple", name),
            });
        };

        let scheme = frame.tuple.scheme();
        // Field containers carry their value as content only
        if let Some(attribute) = attributes.iter().find(|a| a.name.namespace.is_none()) {
            return Err(TupleError::UnexpectedEvent {
                details: format!(
                    "attribute '{}' on field element {}",
                    attribute.name.local, name.local
                ),
            }
            .at(name, Some(scheme.identity())));
        }

        let index = scheme
            .find_field(&name.local)
            .map_err(|_| {
                TupleError::UnknownField {
                    field: name.local.clone(),
                    scheme: scheme.identity().clone(),
                }
                .at(name, Some(scheme.identity()))
            })?
            .index();

        frame.pending = Some(PendingField {
            index,
            element: name.clone(),
            text: String::new(),
            children: Vec::new(),
        });
        Ok(())
    }

    fn close_field(&mut self, name: &QName) -> Result<()> {
        let Some(frame) = self.stack.last_mut() else {
            return Err(TupleError::UnexpectedEvent {
                details: format!("close of field {} outside a tuple", name),
            });
        };
        let Some(pending) = frame.pending.take() else {
            return Err(TupleError::UnexpectedEvent {
                details: format!("close of {} while no field is open", name),
            });
        };
        if pending.element != *name {
            return Err(TupleError::UnexpectedEvent {
                details: format!("expected close of {}, found {}", pending.element, name),
            });
        }

        let scheme = frame.tuple.scheme().clone();
        let in_context = |e: TupleError| e.at(name, Some(scheme.identity()));

        let field = scheme.field_at(pending.index).map_err(in_context)?;
        if let Some(value) = field_value(field, pending).map_err(in_context)? {
            frame
                .tuple
                .set_at(field.index(), value)
                .map_err(in_context)?;
        }
        Ok(())
    }

    fn close_tuple(&mut self, name: &QName) -> Result<()> {
        let Some(frame) = self.stack.pop() else {
            return Err(TupleError::UnexpectedEvent {
                details: format!("close of {} with no open tuple", name),
            });
        };
        if frame.element != *name {
            return Err(TupleError::UnexpectedEvent {
                details: format!("expected close of {}, found {}", frame.element, name),
            });
        }

        let tuple = self.factory.complete(frame.tuple);
        trace!("Closed tuple {} at depth {}", tuple.scheme().identity(), self.stack.len());

        match self.stack.last_mut() {
            None => {
                self.result = Some(tuple);
                self.complete = true;
            }
            Some(parent) => match parent.pending.as_mut() {
                Some(pending) => pending.children.push(Value::from(tuple)),
                None => {
                    return Err(TupleError::UnexpectedEvent {
                        details: format!("tuple {} closed outside a field", name),
                    });
                }
            },
        }
        Ok(())
    }
}

fn apply_attribute(tuple: &mut Tuple, attribute: &Attribute) -> Result<()> {
    let scheme = tuple.scheme().clone();
    let field = scheme
        .find_field(&attribute.name.local)
        .map_err(|_| TupleError::UnknownField {
            field: attribute.name.local.clone(),
            scheme: scheme.identity().clone(),
        })?;

    if let Some(value) = text_value(field, &attribute.value)? {
        tuple.set_at(field.index(), value)?;
    }
    Ok(())
}

/// Value for a closed field container, or `None` to leave the slot absent
fn field_value(field: &Field, pending: PendingField) -> Result<Option<Value>> {
    if pending.children.is_empty() {
        return text_value(field, &pending.text);
    }

    let declared = field.declared_type();
    if !pending.text.trim().is_empty() {
        return Err(TupleError::TypeMismatch {
            expected: declared.identity().clone(),
            details: format!(
                "field '{}' mixes text with nested elements",
                field.name()
            ),
        });
    }

    if declared.native_representation()? == NativeRepresentation::List {
        return Ok(Some(Value::List(pending.children)));
    }

    let mut children = pending.children;
    if children.len() > 1 {
        return Err(TupleError::TypeMismatch {
            expected: declared.identity().clone(),
            details: format!(
                "field '{}' holds {} nested tuples but is not a list",
                field.name(),
                children.len()
            ),
        });
    }
    Ok(children.pop())
}

/// Convert character data, mapping blank content to null or the type's empty value.
fn text_value(field: &Field, text: &str) -> Result<Option<Value>> {
    let declared = field.declared_type();
    let blank = match declared.native_representation()? {
        NativeRepresentation::String => text.is_empty(),
        _ => text.trim().is_empty(),
    };

    if blank {
        if field.is_nullable() {
            return Ok(Some(Value::Null));
        }
        return declared.empty_value();
    }
    declared.parse_text(text).map(Some)
}
