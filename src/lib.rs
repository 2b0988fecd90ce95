//! # xml-tuples Library
//!
//! Reads structural markup documents into typed tuples. Element names map to
//! type identities; each type's definition is loaded on demand from a chain of
//! sources (memory, local directories, HTTP with a disk cache) and shared by
//! every document through one [`TypeResolver`]. Self- and mutually-referential
//! definitions are linked through placeholder types, so cycles never recurse.

pub mod cache;
pub mod cli;
pub mod config;
pub mod definition;
pub mod error;
pub mod file_discovery;
pub mod http_client;
pub mod identity;
pub mod loader;
pub mod markup;
pub mod output;
pub mod reader;
pub mod resolver;
pub mod scheme;
pub mod scheme_resolver;
pub mod source;
pub mod tuple;
pub mod types;
pub mod value;

pub use cache::{
    CacheConfig, CacheMetadata, CacheStats, CachedDefinition, CachingDefinitionSource,
    CleanupStats, DiskCache,
};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager, EnvProvider, SystemEnvProvider};
pub use definition::{DEFINITION_NAMESPACE, FieldDefinition, TypeDefinition};
pub use error::{Result, TupleError};
pub use file_discovery::{Discovered, FileDiscovery};
pub use http_client::{HttpClientConfig, HttpDefinitionSource};
pub use identity::{QName, TypeIdentity, XSD_NAMESPACE};
pub use loader::{
    DocumentLoader, DocumentResult, DocumentStatus, LoadResults, LoaderConfig, tuple_count,
};
pub use output::Output;
pub use reader::{Attribute, DEFAULT_MAX_DEPTH, ElementRole, ReaderState, StructuralTupleReader};
pub use resolver::{ResolverStats, TypeResolver};
pub use scheme::{Field, Scheme, SchemeBuilder};
pub use scheme_resolver::{SchemeResolver, StaticSchemeResolver};
pub use source::{
    ChainedDefinitionSource, DefinitionDocument, DefinitionSource, DirectoryDefinitionSource,
    MemoryDefinitionSource,
};
pub use tuple::{EditableTupleFactory, FrozenTupleFactory, Tuple, TupleFactory};
pub use types::{DelegatingType, ListType, Primitive, PrimitiveType, SchemeType, Type, TypeRef};
pub use value::{NativeRepresentation, Value};
