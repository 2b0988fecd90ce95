use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

use xml_tuples::{
    FieldDefinition, MemoryDefinitionSource, Primitive, Scheme, StaticSchemeResolver,
    TypeDefinition, TypeResolver,
};

pub const NS: &str = "urn:example";
pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";
pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

pub fn identity(local: &str) -> String {
    format!("{}#{}", NS, local)
}

/// `Widget { title: string, id: int }`
pub fn widget_definition() -> TypeDefinition {
    TypeDefinition::new(identity("Widget"))
        .with_field(FieldDefinition::new("title", STRING))
        .with_field(FieldDefinition::new("id", INT))
}

/// `Outer { name: string, friend: Outer? }`, referring to itself
pub fn outer_definition() -> TypeDefinition {
    TypeDefinition::new(identity("Outer"))
        .with_field(FieldDefinition::new("name", STRING))
        .with_field(FieldDefinition::new("friend", identity("Outer")).nullable())
}

/// `Author { name, books: list<Book> }` and `Book { title, author: Author? }`
pub fn library_definitions() -> Vec<TypeDefinition> {
    vec![
        TypeDefinition::new(identity("Author"))
            .with_field(FieldDefinition::new("name", STRING))
            .with_field(FieldDefinition::new("books", identity("Book")).list()),
        TypeDefinition::new(identity("Book"))
            .with_field(FieldDefinition::new("title", STRING))
            .with_field(FieldDefinition::new("author", identity("Author")).nullable()),
    ]
}

/// One field of every primitive type
pub fn sample_definition() -> TypeDefinition {
    TypeDefinition::new(identity("Sample"))
        .with_field(FieldDefinition::new("text", STRING))
        .with_field(FieldDefinition::new("small", INT))
        .with_field(FieldDefinition::new("large", LONG))
        .with_field(FieldDefinition::new("ratio", DOUBLE))
        .with_field(FieldDefinition::new("flag", BOOLEAN))
        .with_field(FieldDefinition::new("at", DATE_TIME))
        .with_field(FieldDefinition::new("scores", INT).list())
        .with_field(FieldDefinition::new("note", STRING).nullable())
}

pub fn memory_source(definitions: &[TypeDefinition]) -> Arc<MemoryDefinitionSource> {
    let source = MemoryDefinitionSource::new();
    for definition in definitions {
        source.insert_definition(definition);
    }
    Arc::new(source)
}

pub fn resolver_with(
    definitions: &[TypeDefinition],
) -> (Arc<TypeResolver>, Arc<MemoryDefinitionSource>) {
    let source = memory_source(definitions);
    (Arc::new(TypeResolver::new(source.clone())), source)
}

/// Hand-built `Widget` scheme, no resolver involved
pub fn widget_scheme() -> Arc<Scheme> {
    Scheme::builder(identity("Widget"))
        .field("title", xml_tuples::PrimitiveType::get(Primitive::String))
        .unwrap()
        .field("id", xml_tuples::PrimitiveType::get(Primitive::Int))
        .unwrap()
        .build()
}

pub fn widget_schemes() -> StaticSchemeResolver {
    StaticSchemeResolver::new().with_scheme(widget_scheme())
}

/// Definitions directory plus a documents tree:
///
/// ```text
/// definitions/Widget.xml, Outer.xml, Author.xml, Book.xml
/// documents/widget.xml
/// documents/nested/outer.xml
/// documents/nested/library.xml
/// documents/broken/unknown_field.xml
/// documents/notes.txt
/// ```
pub async fn create_document_tree() -> std::io::Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    let mut definitions = vec![widget_definition(), outer_definition()];
    definitions.extend(library_definitions());
    for definition in &definitions {
        create_test_file(
            &root
                .join("definitions")
                .join(format!("{}.xml", definition.name.local_name())),
            &definition.to_markup(),
        )
        .await?;
    }

    let documents = root.join("documents");
    create_test_file(&documents.join("widget.xml"), WIDGET_XML).await?;
    create_test_file(&documents.join("nested/outer.xml"), OUTER_XML).await?;
    create_test_file(&documents.join("nested/library.xml"), LIBRARY_XML).await?;
    create_test_file(
        &documents.join("broken/unknown_field.xml"),
        UNKNOWN_FIELD_XML,
    )
    .await?;
    create_test_file(&documents.join("notes.txt"), "not a document").await?;

    Ok(temp_dir)
}

pub async fn create_test_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await
}

pub const WIDGET_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ns:Widget xmlns:ns="urn:example">
    <title>Hello</title>
    <id>7</id>
</ns:Widget>"#;

pub const OUTER_XML: &str = r#"<ns:Outer xmlns:ns="urn:example">
    <name>first</name>
    <friend>
        <ns:Outer>
            <name>second</name>
            <friend>
                <ns:Outer><name>third</name></ns:Outer>
            </friend>
        </ns:Outer>
    </friend>
</ns:Outer>"#;

pub const LIBRARY_XML: &str = r#"<ns:Author xmlns:ns="urn:example" name="Le Guin">
    <books>
        <ns:Book title="The Dispossessed"/>
        <ns:Book><title>The Lathe of Heaven</title></ns:Book>
    </books>
</ns:Author>"#;

pub const UNKNOWN_FIELD_XML: &str = r#"<ns:Widget xmlns:ns="urn:example">
    <title>Hello</title>
    <colour>red</colour>
</ns:Widget>"#;
