use std::sync::Arc;
use std::time::Duration;

use xml_tuples::{
    DEFAULT_MAX_DEPTH, EditableTupleFactory, FrozenTupleFactory, TupleError, TypeIdentity,
    TypeResolver, Value,
};

use crate::common::mocks::{MockDefinitionSource, MockFailure, MockResponse};
use crate::common::test_helpers::*;

fn mock_resolver(source: MockDefinitionSource) -> (Arc<TypeResolver>, Arc<MockDefinitionSource>) {
    let source = Arc::new(source);
    (Arc::new(TypeResolver::new(source.clone())), source)
}

#[tokio::test]
async fn test_self_referential_definition() {
    let (resolver, source) = resolver_with(&[outer_definition()]);
    let identity = TypeIdentity::new(identity("Outer"));

    let outer = resolver.resolve(&identity).await.unwrap();
    let friend = outer
        .scheme()
        .unwrap()
        .unwrap()
        .find_field("friend")
        .unwrap()
        .declared_type()
        .clone();

    assert!(Arc::ptr_eq(&friend, &outer));
    assert!(friend.is_linked());
    assert_eq!(source.load_count(), 1);
}

#[tokio::test]
async fn test_mutual_references_share_one_instance_per_identity() {
    let (resolver, source) = resolver_with(&library_definitions());

    let author = resolver
        .resolve(&TypeIdentity::new(identity("Author")))
        .await
        .unwrap();
    let book = resolver
        .resolve(&TypeIdentity::new(identity("Book")))
        .await
        .unwrap();

    let element = author
        .scheme()
        .unwrap()
        .unwrap()
        .find_field("books")
        .unwrap()
        .declared_type()
        .element_type()
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&element, &book));

    let back = book
        .scheme()
        .unwrap()
        .unwrap()
        .find_field("author")
        .unwrap()
        .declared_type()
        .clone();
    assert!(Arc::ptr_eq(&back, &author));
    assert_eq!(source.load_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_closure_loads_each_definition_once() {
    let source = MockDefinitionSource::new();
    for definition in library_definitions() {
        source.add_response(
            definition.name.as_str(),
            MockResponse::success(definition.to_markup()).with_delay(Duration::from_millis(20)),
        );
    }
    let (resolver, source) = mock_resolver(source);

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let resolver = resolver.clone();
            let local = if i % 2 == 0 { "Author" } else { "Book" };
            tokio::spawn(async move { resolver.resolve(&TypeIdentity::new(identity(local))).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        assert!(result.unwrap().is_ok());
    }

    assert_eq!(source.requests_for(&identity("Author")), 1);
    assert_eq!(source.requests_for(&identity("Book")), 1);

    let stats = resolver.stats().await;
    assert_eq!(stats.constructions, 2);
    assert_eq!(stats.links, 2);
    assert_eq!(stats.entries, 2);
}

#[tokio::test]
async fn test_index_and_name_lookup_agree() {
    let (resolver, _source) = resolver_with(&[sample_definition()]);
    let scheme = resolver
        .resolve_scheme(&TypeIdentity::new(identity("Sample")))
        .await
        .unwrap();

    assert_eq!(scheme.len(), 8);
    for (position, field) in scheme.fields().enumerate() {
        assert_eq!(field.index(), position);
        assert_eq!(scheme.find_field(field.name()).unwrap(), field);
        assert_eq!(scheme.field_at(position).unwrap(), field);
    }
    assert!(matches!(
        scheme.field_at(8),
        Err(TupleError::IndexOutOfRange { index: 8, len: 8, .. })
    ));
}

#[tokio::test]
async fn test_composite_round_trip_for_every_primitive() {
    let (resolver, _source) = resolver_with(&[sample_definition()]);
    let xml = r#"<ns:Sample xmlns:ns="urn:example" flag="true">
        <text> padded </text>
        <small>-12</small>
        <large>9007199254740993</large>
        <ratio>2.5</ratio>
        <at>2024-05-01T12:30:00Z</at>
        <scores/>
        <note/>
    </ns:Sample>"#;

    let tuple = resolver
        .read_document(xml, &EditableTupleFactory, DEFAULT_MAX_DEPTH)
        .await
        .unwrap();
    assert_eq!(tuple.get("text").unwrap(), Some(&Value::from(" padded ")));
    assert_eq!(tuple.get("small").unwrap(), Some(&Value::Int(-12)));
    assert_eq!(tuple.get("large").unwrap(), Some(&Value::Long(9_007_199_254_740_993)));
    assert_eq!(tuple.get("note").unwrap(), Some(&Value::Null));

    let sample = resolver
        .resolve(&TypeIdentity::new(identity("Sample")))
        .await
        .unwrap();
    let value = Value::from(tuple);
    let composite = sample.to_composite(&value).unwrap();

    assert_eq!(composite["flag"], true);
    assert_eq!(composite["ratio"], 2.5);
    assert_eq!(composite["at"], "2024-05-01T12:30:00Z");
    assert!(composite["note"].is_null());

    let rebuilt = sample
        .from_composite(&composite, &FrozenTupleFactory)
        .unwrap();
    assert_eq!(rebuilt, value);
    assert!(rebuilt.as_tuple().unwrap().is_frozen());
}

#[tokio::test]
async fn test_source_failure_is_returned_and_retried_later() {
    let source = MockDefinitionSource::new();
    source.add_failure(&identity("Widget"), MockFailure::Server(503));
    let (resolver, source) = mock_resolver(source);
    let widget = TypeIdentity::new(identity("Widget"));

    match resolver.resolve(&widget).await {
        Err(TupleError::HttpStatus { status, .. }) => assert_eq!(status, 503),
        other => panic!("Expected HttpStatus, got {:?}", other.map(|t| t.identity().clone())),
    }
    assert!(resolver.contains(&widget));

    source.add_definition(&widget_definition());
    let resolved = resolver.resolve(&widget).await.unwrap();
    assert!(resolved.is_linked());
    assert_eq!(source.requests_for(&identity("Widget")), 2);
}

#[tokio::test]
async fn test_unknown_root_element_is_scheme_not_found() {
    let source = MockDefinitionSource::new();
    let (resolver, source) = mock_resolver(source);

    let error = resolver
        .read_document(
            r#"<ns:Gadget xmlns:ns="urn:example"/>"#,
            &EditableTupleFactory,
            DEFAULT_MAX_DEPTH,
        )
        .await
        .unwrap_err();

    assert!(matches!(error.root_cause(), TupleError::SchemeNotFound { .. }));
    assert_eq!(error.element().unwrap().local, "Gadget");
    assert_eq!(source.request_count(), 1);
}

#[tokio::test]
async fn test_shared_resolver_across_documents() {
    let (resolver, source) = resolver_with(&[widget_definition(), outer_definition()]);

    for xml in [WIDGET_XML, OUTER_XML, WIDGET_XML, OUTER_XML] {
        resolver
            .read_document(xml, &EditableTupleFactory, DEFAULT_MAX_DEPTH)
            .await
            .unwrap();
    }

    assert_eq!(source.load_count(), 2);
    assert_eq!(resolver.stats().await.definition_loads, 2);
}
