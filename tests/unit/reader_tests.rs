use xml_tuples::{
    Attribute, ElementRole, EditableTupleFactory, QName, ReaderState, StaticSchemeResolver,
    StructuralTupleReader, TupleError, TypeIdentity, Value,
};

use crate::common::test_helpers::*;

fn tuple_name(local: &str) -> QName {
    QName::new(Some(NS), local)
}

fn field_name(local: &str) -> QName {
    QName::new(None, local)
}

fn leaf(reader: &mut StructuralTupleReader<'_>, name: &str, text: &str) {
    assert_eq!(
        reader.open(&field_name(name), &[]).unwrap(),
        ElementRole::FieldStart
    );
    reader.text(text).unwrap();
    reader.close(&field_name(name)).unwrap();
}

async fn outer_schemes() -> StaticSchemeResolver {
    let (resolver, _source) = resolver_with(&[outer_definition()]);
    let scheme = resolver
        .resolve_scheme(&TypeIdentity::new(identity("Outer")))
        .await
        .unwrap();
    StaticSchemeResolver::new().with_scheme(scheme)
}

#[test]
fn test_widget_event_sequence() {
    let schemes = widget_schemes();
    let mut reader = StructuralTupleReader::new(&schemes, &EditableTupleFactory);
    assert_eq!(reader.state(), ReaderState::AwaitingRoot);

    let role = reader.open(&tuple_name("Widget"), &[]).unwrap();
    assert_eq!(role, ElementRole::TupleStart);
    assert_eq!(reader.state(), ReaderState::InTuple);

    reader.open(&field_name("title"), &[]).unwrap();
    assert_eq!(reader.state(), ReaderState::InField);
    reader.text("Hel").unwrap();
    reader.text("lo").unwrap();
    reader.close(&field_name("title")).unwrap();
    leaf(&mut reader, "id", " 7 ");

    reader.close(&tuple_name("Widget")).unwrap();
    assert_eq!(reader.state(), ReaderState::Complete);

    let tuple = reader.finish().unwrap();
    assert_eq!(tuple.get("title").unwrap(), Some(&Value::from("Hello")));
    assert_eq!(tuple.get("id").unwrap(), Some(&Value::Int(7)));
}

#[test]
fn test_unknown_field_discards_partial_tuple() {
    let schemes = widget_schemes();
    let mut reader = StructuralTupleReader::new(&schemes, &EditableTupleFactory);

    reader.open(&tuple_name("Widget"), &[]).unwrap();
    leaf(&mut reader, "title", "Hello");

    let error = reader.open(&field_name("colour"), &[]).unwrap_err();
    match error.root_cause() {
        TupleError::UnknownField { field, scheme } => {
            assert_eq!(field, "colour");
            assert_eq!(scheme.as_str(), identity("Widget"));
        }
        other => panic!("Expected UnknownField, got {:?}", other),
    }
    assert_eq!(error.element(), Some(&field_name("colour")));

    assert_eq!(reader.state(), ReaderState::Failed);
    assert!(reader.take_result().is_none());
    assert!(matches!(reader.finish(), Err(TupleError::ReaderFailed)));
    assert!(matches!(
        reader.close(&tuple_name("Widget")),
        Err(TupleError::ReaderFailed)
    ));

    reader.reset();
    assert_eq!(reader.state(), ReaderState::AwaitingRoot);
    assert_eq!(reader.depth(), 0);
}

#[tokio::test]
async fn test_nested_tuples_return_to_depth_zero() {
    let schemes = outer_schemes().await;
    let mut reader = StructuralTupleReader::new(&schemes, &EditableTupleFactory);

    reader.open(&tuple_name("Outer"), &[]).unwrap();
    leaf(&mut reader, "name", "first");
    reader.open(&field_name("friend"), &[]).unwrap();

    let role = reader.open(&tuple_name("Outer"), &[]).unwrap();
    assert_eq!(role, ElementRole::TupleStart);
    assert_eq!(reader.depth(), 2);
    leaf(&mut reader, "name", "second");
    reader.close(&tuple_name("Outer")).unwrap();
    assert_eq!(reader.depth(), 1);

    reader.close(&field_name("friend")).unwrap();
    reader.close(&tuple_name("Outer")).unwrap();
    assert_eq!(reader.depth(), 0);

    let tuple = reader.finish().unwrap();
    let friend = tuple.get("friend").unwrap().unwrap().as_tuple().unwrap();
    assert_eq!(friend.get("name").unwrap(), Some(&Value::from("second")));
    assert_eq!(friend.get("friend").unwrap(), None);
}

#[tokio::test]
async fn test_depth_limit_counts_open_tuples() {
    let schemes = outer_schemes().await;
    let mut reader =
        StructuralTupleReader::new(&schemes, &EditableTupleFactory).with_max_depth(1);

    reader.open(&tuple_name("Outer"), &[]).unwrap();
    reader.open(&field_name("friend"), &[]).unwrap();

    let error = reader.open(&tuple_name("Outer"), &[]).unwrap_err();
    assert!(matches!(
        error.root_cause(),
        TupleError::DepthExceeded { depth: 2, limit: 1 }
    ));
    assert_eq!(reader.state(), ReaderState::Failed);
}

#[test]
fn test_attributes_fill_fields_and_children_override() {
    let schemes = widget_schemes();
    let mut reader = StructuralTupleReader::new(&schemes, &EditableTupleFactory);

    reader
        .open(
            &tuple_name("Widget"),
            &[
                Attribute::plain("title", "from attribute"),
                Attribute::plain("id", "1"),
                Attribute::new(QName::new(Some("urn:other"), "ignored"), "x"),
            ],
        )
        .unwrap();
    leaf(&mut reader, "title", "from child");
    reader.close(&tuple_name("Widget")).unwrap();

    let tuple = reader.finish().unwrap();
    assert_eq!(tuple.get("title").unwrap(), Some(&Value::from("from child")));
    assert_eq!(tuple.get("id").unwrap(), Some(&Value::Int(1)));
}

#[test]
fn test_events_after_completion_are_rejected() {
    let schemes = widget_schemes();
    let mut reader = StructuralTupleReader::new(&schemes, &EditableTupleFactory);

    reader.open(&tuple_name("Widget"), &[]).unwrap();
    reader.close(&tuple_name("Widget")).unwrap();

    let error = reader.open(&tuple_name("Widget"), &[]).unwrap_err();
    assert!(matches!(error, TupleError::UnexpectedEvent { .. }));
    assert_eq!(reader.state(), ReaderState::Failed);
}

#[test]
fn test_leaf_parse_failure_names_the_field() {
    let schemes = widget_schemes();
    let mut reader = StructuralTupleReader::new(&schemes, &EditableTupleFactory);

    reader.open(&tuple_name("Widget"), &[]).unwrap();
    reader.open(&field_name("id"), &[]).unwrap();
    reader.text("seven").unwrap();

    let error = reader.close(&field_name("id")).unwrap_err();
    assert!(matches!(error.root_cause(), TupleError::TypeMismatch { .. }));
    assert_eq!(error.element(), Some(&field_name("id")));
}
