//! Definition sources: where the resolver finds the document describing a type.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::definition::TypeDefinition;
use crate::error::{Result, TupleError};
use crate::identity::TypeIdentity;

/// A definition document as loaded from a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionDocument {
    pub identity: TypeIdentity,
    pub text: String,
    /// Where the text came from (path, URL, `memory`), for diagnostics
    pub origin: String,
}

/// Supplies definition documents by type identity
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    /// Fails with `DefinitionNotFound` when this source knows nothing about `identity`.
    async fn load(&self, identity: &TypeIdentity) -> Result<DefinitionDocument>;
}

/// In-memory identity → text table
#[derive(Debug, Default)]
pub struct MemoryDefinitionSource {
    definitions: RwLock<HashMap<TypeIdentity, String>>,
    load_count: AtomicUsize,
}

impl MemoryDefinitionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: impl Into<TypeIdentity>, text: impl Into<String>) {
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        definitions.insert(identity.into(), text.into());
    }

    /// Store a definition under its own name.
    pub fn insert_definition(&self, definition: &TypeDefinition) {
        self.insert(definition.name.clone(), definition.to_markup());
    }

    pub fn with_definition(self, definition: &TypeDefinition) -> Self {
        self.insert_definition(definition);
        self
    }

    /// Number of successful and failed `load` calls so far
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DefinitionSource for MemoryDefinitionSource {
    async fn load(&self, identity: &TypeIdentity) -> Result<DefinitionDocument> {
        self.load_count.fetch_add(1, Ordering::SeqCst);

        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let text = definitions
            .get(identity)
            .cloned()
            .ok_or_else(|| TupleError::DefinitionNotFound {
                identity: identity.clone(),
            })?;

        Ok(DefinitionDocument {
            identity: identity.clone(),
            text,
            origin: "memory".to_string(),
        })
    }
}

/// Looks for `<local-name>.xml` in a list of directories, first match wins
#[derive(Debug, Clone)]
pub struct DirectoryDefinitionSource {
    directories: Vec<PathBuf>,
}

impl DirectoryDefinitionSource {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self { directories }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    fn file_name(identity: &TypeIdentity) -> String {
        format!("{}.xml", identity.local_name())
    }

    async fn read_candidate(path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TupleError::Io(e)),
        }
    }
}

#[async_trait]
impl DefinitionSource for DirectoryDefinitionSource {
    async fn load(&self, identity: &TypeIdentity) -> Result<DefinitionDocument> {
        let file_name = Self::file_name(identity);

        for directory in &self.directories {
            let path = directory.join(&file_name);
            trace!("Looking for {} at {}", identity, path.display());

            if let Some(text) = Self::read_candidate(&path).await? {
                debug!("Loaded definition of {} from {}", identity, path.display());
                return Ok(DefinitionDocument {
                    identity: identity.clone(),
                    text,
                    origin: path.display().to_string(),
                });
            }
        }

        Err(TupleError::DefinitionNotFound {
            identity: identity.clone(),
        })
    }
}

/// Tries each source in order, moving on only when a source has no definition
pub struct ChainedDefinitionSource {
    sources: Vec<Arc<dyn DefinitionSource>>,
}

impl ChainedDefinitionSource {
    pub fn new(sources: Vec<Arc<dyn DefinitionSource>>) -> Self {
        Self { sources }
    }

    pub fn push(&mut self, source: Arc<dyn DefinitionSource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl DefinitionSource for ChainedDefinitionSource {
    async fn load(&self, identity: &TypeIdentity) -> Result<DefinitionDocument> {
        for source in &self.sources {
            match source.load(identity).await {
                Err(TupleError::DefinitionNotFound { .. }) => continue,
                other => return other,
            }
        }

        Err(TupleError::DefinitionNotFound {
            identity: identity.clone(),
        })
    }
}
