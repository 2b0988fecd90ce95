use std::sync::Arc;

use tempfile::TempDir;

use xml_tuples::{
    CacheConfig, CachingDefinitionSource, ChainedDefinitionSource, DefinitionSource,
    DirectoryDefinitionSource, FieldDefinition, TupleError, TypeDefinition, TypeIdentity,
    TypeResolver,
};

use crate::common::mocks::MockDefinitionSource;
use crate::common::test_helpers::*;

async fn definitions_dir(definitions: &[TypeDefinition]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for definition in definitions {
        create_test_file(
            &temp_dir
                .path()
                .join(format!("{}.xml", definition.name.local_name())),
            &definition.to_markup(),
        )
        .await
        .unwrap();
    }
    temp_dir
}

#[tokio::test]
async fn test_resolve_from_directory() {
    let temp_dir = definitions_dir(&library_definitions()).await;
    let source = DirectoryDefinitionSource::new(vec![temp_dir.path().to_path_buf()]);
    let resolver = TypeResolver::new(Arc::new(source));

    let author = resolver
        .resolve_scheme(&TypeIdentity::new(identity("Author")))
        .await
        .unwrap();
    assert_eq!(author.len(), 2);
    assert!(author.find_field("books").unwrap().declared_type().element_type().unwrap().is_some());
    assert!(resolver.contains(&TypeIdentity::new(identity("Book"))));
}

#[tokio::test]
async fn test_chain_prefers_earlier_sources() {
    let temp_dir = definitions_dir(&[widget_definition()]).await;

    // Same identity, one extra field
    let overriding = MockDefinitionSource::new();
    overriding.add_definition(
        &widget_definition().with_field(FieldDefinition::new("colour", STRING).nullable()),
    );
    let overriding = Arc::new(overriding);

    let chain = ChainedDefinitionSource::new(vec![
        overriding.clone() as Arc<dyn DefinitionSource>,
        Arc::new(DirectoryDefinitionSource::new(vec![temp_dir.path().to_path_buf()])),
    ]);
    let resolver = TypeResolver::new(Arc::new(chain));

    let widget = resolver
        .resolve_scheme(&TypeIdentity::new(identity("Widget")))
        .await
        .unwrap();
    assert_eq!(widget.len(), 3);
    assert!(widget.contains("colour"));

    let outer = resolver
        .resolve(&TypeIdentity::new(identity("Outer")))
        .await;
    assert!(matches!(outer, Err(TupleError::TypeNotFound { .. })));
    assert_eq!(overriding.requests_for(&identity("Outer")), 1);
}

#[tokio::test]
async fn test_disk_cache_is_shared_between_resolvers() {
    let cache_dir = TempDir::new().unwrap();
    let config = CacheConfig {
        directory: cache_dir.path().to_path_buf(),
        ttl_hours: 1,
    };
    let inner = Arc::new(MockDefinitionSource::new());
    inner.add_definition(&outer_definition());

    for _ in 0..3 {
        let source = CachingDefinitionSource::new(inner.clone(), &config);
        let resolver = TypeResolver::new(Arc::new(source));
        let outer = resolver
            .resolve(&TypeIdentity::new(identity("Outer")))
            .await
            .unwrap();
        assert!(outer.is_linked());
    }

    assert_eq!(inner.request_count(), 1);
}

#[tokio::test]
async fn test_definition_declaring_another_name() {
    let temp_dir = TempDir::new().unwrap();
    create_test_file(
        &temp_dir.path().join("Gadget.xml"),
        &widget_definition().to_markup(),
    )
    .await
    .unwrap();

    let source = DirectoryDefinitionSource::new(vec![temp_dir.path().to_path_buf()]);
    let resolver = TypeResolver::new(Arc::new(source));

    match resolver.resolve(&TypeIdentity::new(identity("Gadget"))).await {
        Err(TupleError::DefinitionParsing { identity: failed, details }) => {
            assert_eq!(failed.as_str(), identity("Gadget"));
            assert!(details.contains("declares type urn:example#Widget"));
        }
        other => panic!("Expected DefinitionParsing, got {:?}", other.map(|t| t.identity().clone())),
    }
}

#[tokio::test]
async fn test_unsupported_primitive_is_a_missing_definition() {
    let decimal = format!("{}#decimal", xml_tuples::XSD_NAMESPACE);
    let price = TypeDefinition::new(identity("Price"))
        .with_field(FieldDefinition::new("amount", decimal.as_str()));
    let (resolver, _source) = resolver_with(&[price]);

    match resolver.resolve(&TypeIdentity::new(identity("Price"))).await {
        Err(TupleError::DefinitionNotFound { identity: missing }) => {
            assert_eq!(missing.as_str(), decimal);
        }
        other => panic!("Expected DefinitionNotFound, got {:?}", other.map(|t| t.identity().clone())),
    }
}

#[test]
fn test_definition_markup_escapes_attributes() {
    let definition = TypeDefinition::new("urn:example?a=1&b=2#Odd")
        .with_field(FieldDefinition::new("quoted", STRING));

    let markup = definition.to_markup();
    assert!(markup.contains("a=1&amp;b=2"));

    let parsed = TypeDefinition::parse(&markup, &definition.name).unwrap();
    assert_eq!(parsed, definition);
}
