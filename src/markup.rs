//! Bridges parsed markup documents to the event-driven tuple reader.
//!
//! Documents are parsed with `roxmltree`, so malformed markup is rejected
//! before any event reaches the reader.

use indexmap::IndexSet;
use roxmltree::{Document, Node};

use crate::error::Result;
use crate::identity::QName;
use crate::reader::{Attribute, StructuralTupleReader};
use crate::scheme_resolver::SchemeResolver;
use crate::tuple::{Tuple, TupleFactory};

pub fn element_name(node: Node<'_, '_>) -> QName {
    let tag = node.tag_name();
    QName::new(tag.namespace(), tag.name())
}

fn attributes(node: Node<'_, '_>) -> Vec<Attribute> {
    node.attributes()
        .map(|a| Attribute::new(QName::new(a.namespace(), a.name()), a.value()))
        .collect()
}

enum Step<'a, 'input> {
    Enter(Node<'a, 'input>),
    Leave(Node<'a, 'input>),
}

/// Replay a document as open/text/close events, in document order.
///
/// Comments and processing instructions produce no events. CDATA sections
/// arrive as ordinary text nodes.
pub fn feed_document(document: &Document<'_>, reader: &mut StructuralTupleReader<'_>) -> Result<()> {
    let mut pending = vec![Step::Enter(document.root_element())];

    while let Some(step) = pending.pop() {
        match step {
            Step::Enter(node) if node.is_element() => {
                reader.open(&element_name(node), &attributes(node))?;
                pending.push(Step::Leave(node));
                // Reversed so the stack pops children in document order
                let children: Vec<_> = node.children().collect();
                pending.extend(children.into_iter().rev().map(Step::Enter));
            }
            Step::Enter(node) if node.is_text() => {
                if let Some(text) = node.text() {
                    reader.text(text)?;
                }
            }
            Step::Enter(_) => {}
            Step::Leave(node) => reader.close(&element_name(node))?,
        }
    }
    Ok(())
}

/// Distinct names of elements in tuple position (even depth below the root), in document order.
pub fn tuple_element_names(document: &Document<'_>) -> Vec<QName> {
    let mut names = IndexSet::new();
    let mut pending = vec![(document.root_element(), 0usize)];

    while let Some((node, depth)) = pending.pop() {
        if depth % 2 == 0 {
            names.insert(element_name(node));
        }
        // Reversed so the stack pops children in document order
        let children: Vec<_> = node.children().filter(Node::is_element).collect();
        pending.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }

    names.into_iter().collect()
}

/// Read a whole parsed document into its root tuple.
pub fn read_document(
    document: &Document<'_>,
    schemes: &dyn SchemeResolver,
    factory: &dyn TupleFactory,
    max_depth: usize,
) -> Result<Tuple> {
    let mut reader = StructuralTupleReader::new(schemes, factory).with_max_depth(max_depth);
    feed_document(document, &mut reader)?;
    reader.finish()
}

/// Parse and read markup text in one step.
pub fn read_str(
    text: &str,
    schemes: &dyn SchemeResolver,
    factory: &dyn TupleFactory,
    max_depth: usize,
) -> Result<Tuple> {
    let document = Document::parse(text)?;
    read_document(&document, schemes, factory, max_depth)
}
