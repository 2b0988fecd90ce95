//! Type resolution with cycle-safe two-phase construction.
//!
//! `construct` registers a [`DelegatingType`] placeholder per identity (the
//! only critical section); `link` loads each definition at most once and then
//! walks the dependency closure. A definition's field types are obtained
//! through `construct` alone, so self- and mutually-referential definitions
//! see the existing placeholder instead of recursing.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::try_join_all;
use moka::future::Cache;
use roxmltree::Document;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::definition::TypeDefinition;
use crate::error::{Result, TupleError};
use crate::identity::{QName, TypeIdentity};
use crate::markup;
use crate::scheme::Scheme;
use crate::scheme_resolver::StaticSchemeResolver;
use crate::source::DefinitionSource;
use crate::tuple::{Tuple, TupleFactory};
use crate::types::{
    DelegatingType, LinkedContent, ListType, PrimitiveType, SchemeType, Type, TypeRef,
};

/// Counters describing resolver activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverStats {
    /// Placeholders registered
    pub constructions: usize,
    /// Placeholders populated from a definition or a registered scheme
    pub links: usize,
    /// Calls made to the definition source
    pub definition_loads: usize,
    /// Identities currently held
    pub entries: u64,
}

#[derive(Debug, Default)]
struct Counters {
    constructions: AtomicUsize,
    links: AtomicUsize,
    definition_loads: AtomicUsize,
}

/// Shared registry from type identity to its canonical type
pub struct TypeResolver {
    source: Arc<dyn DefinitionSource>,
    types: Cache<TypeIdentity, Arc<DelegatingType>>,
    counters: Counters,
}

impl TypeResolver {
    pub fn new(source: Arc<dyn DefinitionSource>) -> Self {
        Self {
            source,
            // No capacity or expiry: a type handed out must stay canonical
            types: Cache::builder().build(),
            counters: Counters::default(),
        }
    }

    pub fn source(&self) -> &Arc<dyn DefinitionSource> {
        &self.source
    }

    /// Resolve an identity to its fully linked type.
    ///
    /// Built-in primitives are returned directly. Any other identity is
    /// constructed and its whole dependency closure linked before returning.
    pub async fn resolve(&self, identity: &TypeIdentity) -> Result<TypeRef> {
        if let Some(builtin) = PrimitiveType::lookup(identity) {
            return Ok(builtin);
        }

        let handle = self.construct(identity).await;
        match self.link(&handle).await {
            Ok(()) => Ok(handle as TypeRef),
            Err(TupleError::DefinitionNotFound { identity: missing }) if missing == *identity => {
                Err(TupleError::TypeNotFound { identity: missing })
            }
            Err(e) => Err(e),
        }
    }

    /// Scheme of an aggregate type
    pub async fn resolve_scheme(&self, identity: &TypeIdentity) -> Result<Arc<Scheme>> {
        self.resolve(identity)
            .await?
            .scheme()?
            .ok_or_else(|| TupleError::SchemeNotFound {
                name: identity.to_qname(),
            })
    }

    /// Placeholder for `identity`, registered on first request.
    ///
    /// Concurrent callers for the same identity all receive the one instance.
    pub async fn construct(&self, identity: &TypeIdentity) -> Arc<DelegatingType> {
        let entry = self
            .types
            .entry_by_ref(identity)
            .or_insert_with(async { Arc::new(DelegatingType::new(identity.clone())) })
            .await;

        if entry.is_fresh() {
            self.counters.constructions.fetch_add(1, Ordering::Relaxed);
            debug!("Constructed placeholder for {}", identity);
        } else {
            trace!("Placeholder cache hit for {}", identity);
        }
        entry.into_value()
    }

    /// Link `root` and every type reachable from it.
    ///
    /// Already linked types are skipped; a type being linked by another caller
    /// is waited for rather than loaded twice.
    pub async fn link(&self, root: &Arc<DelegatingType>) -> Result<()> {
        let mut visited = HashSet::new();
        let mut pending = vec![Arc::clone(root)];

        while let Some(handle) = pending.pop() {
            if !visited.insert(handle.identity().clone()) {
                continue;
            }
            self.link_one(&handle).await?;
            pending.extend(handle.dependencies().iter().cloned());
        }
        Ok(())
    }

    async fn link_one(&self, handle: &Arc<DelegatingType>) -> Result<()> {
        let identity = handle.identity().clone();
        let performed = handle
            .link_with(|| self.load_definition(identity.clone()))
            .await?;

        if performed {
            self.counters.links.fetch_add(1, Ordering::Relaxed);
            debug!("Linked {}", identity);
        }
        Ok(())
    }

    async fn load_definition(&self, identity: TypeIdentity) -> Result<LinkedContent> {
        self.counters.definition_loads.fetch_add(1, Ordering::Relaxed);
        let document = self.source.load(&identity).await?;
        debug!("Loaded definition of {} from {}", identity, document.origin);

        let definition = TypeDefinition::parse(&document.text, &identity)?;
        if definition.name != identity {
            return Err(TupleError::DefinitionParsing {
                identity: identity.clone(),
                details: format!(
                    "{} declares type {}",
                    document.origin, definition.name
                ),
            });
        }

        let mut builder = Scheme::builder(identity.clone());
        let mut dependencies = Vec::new();
        for field in &definition.fields {
            let mut declared = match PrimitiveType::lookup(&field.type_identity) {
                Some(builtin) => builtin,
                None => {
                    let handle = self.construct(&field.type_identity).await;
                    dependencies.push(Arc::clone(&handle));
                    handle as TypeRef
                }
            };
            if field.list {
                declared = Arc::new(ListType::new(declared));
            }
            builder = builder.push(&field.name, declared, field.nullable)?;
        }

        Ok(LinkedContent {
            delegate: Arc::new(SchemeType::new(builder.build())),
            dependencies,
        })
    }

    /// Install a scheme built in code as the definition of its identity.
    ///
    /// A no-op when the identity is already linked. Placeholders the scheme's
    /// fields refer to are not linked by this call.
    pub async fn register(&self, scheme: Arc<Scheme>) -> Result<TypeRef> {
        let handle = self.construct(scheme.identity()).await;
        let performed = handle
            .link_with(|| async {
                Ok(LinkedContent {
                    delegate: Arc::new(SchemeType::new(Arc::clone(&scheme))),
                    dependencies: Vec::new(),
                })
            })
            .await?;

        if performed {
            self.counters.links.fetch_add(1, Ordering::Relaxed);
            debug!("Registered scheme {}", scheme.identity());
        }
        Ok(handle as TypeRef)
    }

    /// Resolve the schemes for a set of element names concurrently.
    ///
    /// Names whose type does not exist stay unmapped; any other failure is returned.
    pub async fn resolve_schemes(&self, names: &[QName]) -> Result<StaticSchemeResolver> {
        let lookups = names.iter().map(|name| async move {
            let identity = TypeIdentity::from_qname(name);
            match self.resolve(&identity).await {
                Ok(resolved) => resolved
                    .scheme()
                    .map(|scheme| scheme.map(|scheme| (name.clone(), scheme))),
                Err(TupleError::TypeNotFound { .. }) => {
                    trace!("No type for element {}", name);
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        });

        let mut schemes = StaticSchemeResolver::new();
        for (name, scheme) in try_join_all(lookups).await?.into_iter().flatten() {
            schemes.insert_named(name, scheme);
        }
        Ok(schemes)
    }

    /// Schemes for every tuple-position element of a markup document
    pub async fn scheme_resolver_for(&self, text: &str) -> Result<StaticSchemeResolver> {
        let names = {
            let document = Document::parse(text)?;
            markup::tuple_element_names(&document)
        };
        self.resolve_schemes(&names).await
    }

    /// Resolve every type a document uses, then read it into its root tuple.
    pub async fn read_document(
        &self,
        text: &str,
        factory: &dyn TupleFactory,
        max_depth: usize,
    ) -> Result<Tuple> {
        let schemes = self.scheme_resolver_for(text).await?;
        // The parsed tree is not kept across the resolution awaits
        let document = Document::parse(text)?;
        markup::read_document(&document, &schemes, factory, max_depth)
    }

    pub fn contains(&self, identity: &TypeIdentity) -> bool {
        self.types.contains_key(identity)
    }

    pub async fn stats(&self) -> ResolverStats {
        self.types.run_pending_tasks().await;
        ResolverStats {
            constructions: self.counters.constructions.load(Ordering::Relaxed),
            links: self.counters.links.load(Ordering::Relaxed),
            definition_loads: self.counters.definition_loads.load(Ordering::Relaxed),
            entries: self.types.entry_count(),
        }
    }
}
