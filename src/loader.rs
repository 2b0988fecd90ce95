//! Concurrent batch loading of markup documents into tuples.
//!
//! Every document shares one [`TypeResolver`], so each type definition is
//! loaded once per run no matter how many documents use it. Reading is
//! CPU-bound and synchronous once schemes are resolved, so tasks run directly
//! under `tokio::spawn` with a semaphore bounding how many are in flight.

use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TupleError};
use crate::file_discovery::FileDiscovery;
use crate::identity::TypeIdentity;
use crate::reader::DEFAULT_MAX_DEPTH;
use crate::resolver::{ResolverStats, TypeResolver};
use crate::tuple::{EditableTupleFactory, FrozenTupleFactory, Tuple, TupleFactory};
use crate::types::{SchemeType, Type};
use crate::value::Value;

/// Loader configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Documents read at the same time
    pub max_concurrent: usize,
    /// Limit for a single document, including type resolution
    pub timeout: Duration,
    /// Skip the remaining documents after the first failure
    pub fail_fast: bool,
    /// Freeze every tuple as its element closes
    pub freeze_tuples: bool,
    pub max_depth: usize,
    /// Keep each root tuple in composite form on its result
    pub include_composite: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
            timeout: Duration::from_secs(30),
            fail_fast: false,
            freeze_tuples: false,
            max_depth: DEFAULT_MAX_DEPTH,
            include_composite: false,
        }
    }
}

/// Outcome of loading one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Loaded,
    /// `element` names the innermost element being read when the error occurred
    Failed {
        message: String,
        element: Option<String>,
    },
    Skipped { reason: String },
}

impl DocumentStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, DocumentStatus::Loaded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DocumentStatus::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DocumentStatus::Skipped { .. })
    }
}

/// Result of loading a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub path: PathBuf,
    pub status: DocumentStatus,
    /// Type of the root tuple
    pub root_type: Option<TypeIdentity>,
    /// Root tuple plus every nested tuple
    pub tuple_count: usize,
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<serde_json::Value>,
}

impl DocumentResult {
    pub fn loaded(
        path: PathBuf,
        root_type: TypeIdentity,
        tuple_count: usize,
        duration: Duration,
    ) -> Self {
        Self {
            path,
            status: DocumentStatus::Loaded,
            root_type: Some(root_type),
            tuple_count,
            duration,
            composite: None,
        }
    }

    pub fn failed(path: PathBuf, error: &TupleError, duration: Duration) -> Self {
        Self {
            path,
            status: DocumentStatus::Failed {
                message: error.to_string(),
                element: error.element().map(ToString::to_string),
            },
            root_type: None,
            tuple_count: 0,
            duration,
            composite: None,
        }
    }

    pub fn skipped(path: PathBuf, reason: impl Into<String>, duration: Duration) -> Self {
        Self {
            path,
            status: DocumentStatus::Skipped {
                reason: reason.into(),
            },
            root_type: None,
            tuple_count: 0,
            duration,
            composite: None,
        }
    }
}

/// Aggregated results of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResults {
    pub total_documents: usize,
    pub loaded_documents: usize,
    pub failed_documents: usize,
    pub skipped_documents: usize,
    pub total_tuples: usize,
    /// Wall-clock time of the whole run
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub throughput_documents_per_second: f64,
    /// Distinct root types, sorted
    pub types_used: Vec<TypeIdentity>,
    pub resolver: ResolverStats,
    pub documents: Vec<DocumentResult>,
}

impl LoadResults {
    /// Summarise per-document results; `total_duration` is the sum of document durations.
    pub fn aggregate(documents: Vec<DocumentResult>) -> Self {
        let total_documents = documents.len();
        let mut loaded_documents = 0;
        let mut failed_documents = 0;
        let mut skipped_documents = 0;
        let mut total_tuples = 0;
        let mut total_duration = Duration::ZERO;
        let mut types_used = BTreeSet::new();

        for document in &documents {
            match document.status {
                DocumentStatus::Loaded => loaded_documents += 1,
                DocumentStatus::Failed { .. } => failed_documents += 1,
                DocumentStatus::Skipped { .. } => skipped_documents += 1,
            }
            total_tuples += document.tuple_count;
            total_duration += document.duration;
            if let Some(root_type) = &document.root_type {
                types_used.insert(root_type.clone());
            }
        }

        let mut results = Self {
            total_documents,
            loaded_documents,
            failed_documents,
            skipped_documents,
            total_tuples,
            total_duration: Duration::ZERO,
            average_duration: Duration::ZERO,
            throughput_documents_per_second: 0.0,
            types_used: types_used.into_iter().collect(),
            resolver: ResolverStats::default(),
            documents,
        };
        results.set_total_duration(total_duration);
        results
    }

    /// Replace the total with a measured wall-clock time and recompute the rates.
    pub fn set_total_duration(&mut self, total_duration: Duration) {
        self.total_duration = total_duration;
        self.average_duration = if self.total_documents > 0 {
            total_duration / self.total_documents as u32
        } else {
            Duration::ZERO
        };
        self.throughput_documents_per_second = if total_duration.as_secs_f64() > 0.0 {
            self.total_documents as f64 / total_duration.as_secs_f64()
        } else {
            0.0
        };
    }

    pub fn all_loaded(&self) -> bool {
        self.total_documents > 0 && self.loaded_documents == self.total_documents
    }

    pub fn has_failures(&self) -> bool {
        self.failed_documents > 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_documents == 0 {
            0.0
        } else {
            (self.loaded_documents as f64 / self.total_documents as f64) * 100.0
        }
    }
}

/// Number of tuples in a tree: the tuple itself plus everything nested in its fields.
pub fn tuple_count(tuple: &Tuple) -> usize {
    1 + tuple
        .present()
        .map(|(_, value)| nested_tuple_count(value))
        .sum::<usize>()
}

fn nested_tuple_count(value: &Value) -> usize {
    match value {
        Value::Tuple(tuple) => tuple_count(tuple),
        Value::List(items) => items.iter().map(nested_tuple_count).sum(),
        _ => 0,
    }
}

/// Reads documents into tuples with one shared type resolver
pub struct DocumentLoader {
    resolver: Arc<TypeResolver>,
    config: LoaderConfig,
}

impl DocumentLoader {
    pub fn new(resolver: Arc<TypeResolver>, config: LoaderConfig) -> Self {
        Self { resolver, config }
    }

    pub fn resolver(&self) -> &Arc<TypeResolver> {
        &self.resolver
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Discover documents under `path` and load them all.
    pub async fn load_path(&self, path: &Path, discovery: &FileDiscovery) -> Result<LoadResults> {
        let start = Instant::now();

        let files = discovery.discover_files(path).await?;
        info!("Discovered {} documents under {}", files.len(), path.display());

        let documents = self.load_files(files).await?;
        let mut results = LoadResults::aggregate(documents);
        results.set_total_duration(start.elapsed());
        results.resolver = self.resolver.stats().await;

        info!(
            "Loaded {}/{} documents ({} failed, {} skipped) in {:?}",
            results.loaded_documents,
            results.total_documents,
            results.failed_documents,
            results.skipped_documents,
            results.total_duration
        );
        Ok(results)
    }

    /// Load documents concurrently; results come back in input order.
    pub async fn load_files(&self, files: Vec<PathBuf>) -> Result<Vec<DocumentResult>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let total = files.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.max_concurrent.max(1)));

        let tasks: Vec<_> = files
            .into_iter()
            .map(|path| {
                let resolver = Arc::clone(&self.resolver);
                let semaphore = Arc::clone(&semaphore);
                let completed = Arc::clone(&completed);
                let cancelled = Arc::clone(&cancelled);
                let config = self.config.clone();

                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.map_err(|_| TupleError::Concurrency {
                        details: "Failed to acquire loader semaphore".to_string(),
                    })?;

                    if cancelled.load(Ordering::SeqCst) {
                        return Ok(DocumentResult::skipped(
                            path,
                            "Skipped after an earlier failure",
                            Duration::ZERO,
                        ));
                    }

                    let start = Instant::now();
                    let result = match tokio::time::timeout(
                        config.timeout,
                        Self::load_single(&path, &resolver, &config),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => DocumentResult::failed(
                            path.clone(),
                            &TupleError::Concurrency {
                                details: format!("Document load timed out after {:?}", config.timeout),
                            },
                            start.elapsed(),
                        ),
                    };

                    if let DocumentStatus::Failed { message, .. } = &result.status {
                        warn!("Failed to load {}: {}", result.path.display(), message);
                        if config.fail_fast {
                            cancelled.store(true, Ordering::SeqCst);
                        }
                    }

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!("Processed {} ({}/{})", result.path.display(), done, total);

                    Ok::<DocumentResult, TupleError>(result)
                })
            })
            .collect();

        let task_results = try_join_all(tasks)
            .await
            .map_err(|e| TupleError::Concurrency {
                details: format!("Task join error: {}", e),
            })?;

        task_results.into_iter().collect()
    }

    /// Load one document with this loader's settings.
    pub async fn load_document(&self, path: &Path) -> DocumentResult {
        Self::load_single(path, &self.resolver, &self.config).await
    }

    async fn load_single(path: &Path, resolver: &TypeResolver, config: &LoaderConfig) -> DocumentResult {
        let start = Instant::now();

        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => return DocumentResult::failed(path.to_path_buf(), &TupleError::Io(e), start.elapsed()),
        };
        if text.trim().is_empty() {
            return DocumentResult::skipped(path.to_path_buf(), "Empty document", start.elapsed());
        }

        let factory: &dyn TupleFactory = if config.freeze_tuples {
            &FrozenTupleFactory
        } else {
            &EditableTupleFactory
        };

        let tuple = match resolver.read_document(&text, factory, config.max_depth).await {
            Ok(tuple) => tuple,
            Err(e) => return DocumentResult::failed(path.to_path_buf(), &e, start.elapsed()),
        };

        let root_type = tuple.scheme().identity().clone();
        let count = tuple_count(&tuple);
        let composite = if config.include_composite {
            let scheme_type = SchemeType::new(Arc::clone(tuple.scheme()));
            match scheme_type.to_composite(&Value::Tuple(Arc::new(tuple))) {
                Ok(composite) => Some(composite),
                Err(e) => return DocumentResult::failed(path.to_path_buf(), &e, start.elapsed()),
            }
        } else {
            None
        };

        let mut result = DocumentResult::loaded(path.to_path_buf(), root_type, count, start.elapsed());
        result.composite = composite;
        result
    }
}
