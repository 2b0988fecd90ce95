//! Output and reporting for batch loads.

use std::time::Duration;

use serde_json::json;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::loader::{DocumentResult, DocumentStatus, LoadResults};

/// Formats load results as human-readable text, JSON, or a short summary
pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel) -> Self {
        Self {
            format,
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Force colours on or off, regardless of the terminal
    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_results(&self, results: &LoadResults) -> String {
        match self.format {
            OutputFormat::Human => self.format_human(results),
            OutputFormat::Json => format!("{:#}\n", self.to_json(results)),
            OutputFormat::Summary => self.format_summary_line(results),
        }
    }

    fn format_human(&self, results: &LoadResults) -> String {
        let mut output = String::new();

        for document in &results.documents {
            let show = match self.verbosity {
                VerbosityLevel::Quiet => document.status.is_failed(),
                _ => true,
            };
            if show {
                output.push_str(&self.format_document(document));
                output.push('\n');
            }
        }

        if self.verbosity > VerbosityLevel::Quiet {
            if !results.documents.is_empty() {
                output.push('\n');
            }
            output.push_str(&self.format_summary(results));
        }
        output
    }

    pub fn format_document(&self, result: &DocumentResult) -> String {
        let path_display = result.path.display();
        let duration_str = format_duration(result.duration);

        match &result.status {
            DocumentStatus::Loaded => {
                let root_type = result
                    .root_type
                    .as_ref()
                    .map_or("<unknown>", |identity| identity.as_str());
                format!(
                    "{}  {} ({}) - {} tuple{} of {}",
                    self.colorize("✓ LOADED", "32"),
                    path_display,
                    duration_str,
                    result.tuple_count,
                    if result.tuple_count == 1 { "" } else { "s" },
                    root_type
                )
            }
            DocumentStatus::Failed { message, element } => {
                let mut output = format!(
                    "{}  {} ({}) - {}",
                    self.colorize("✗ FAILED", "31"),
                    path_display,
                    duration_str,
                    message
                );
                if self.verbosity >= VerbosityLevel::Verbose
                    && let Some(element) = element
                {
                    output.push_str(&format!("\n    at element {}", element));
                }
                output
            }
            DocumentStatus::Skipped { reason } => format!(
                "{}  {} ({}) - {}",
                self.colorize("- SKIPPED", "36"),
                path_display,
                duration_str,
                reason
            ),
        }
    }

    fn format_summary(&self, results: &LoadResults) -> String {
        let mut output = String::new();
        output.push_str("Load Summary:\n");
        output.push_str(&format!("  Total documents: {}\n", results.total_documents));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Loaded:", "32"),
            results.loaded_documents
        ));
        if results.failed_documents > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Failed:", "31"),
                results.failed_documents
            ));
        }
        if results.skipped_documents > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                results.skipped_documents
            ));
        }
        output.push_str(&format!("  Tuples: {}\n", results.total_tuples));
        output.push_str(&format!("  Success rate: {:.1}%\n", results.success_rate()));
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(results.total_duration)
        ));

        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str("\nResolver:\n");
            output.push_str(&format!(
                "  Throughput: {:.1} documents/sec\n",
                results.throughput_documents_per_second
            ));
            output.push_str(&format!("  Types held: {}\n", results.resolver.entries));
            output.push_str(&format!(
                "  Definition loads: {}\n",
                results.resolver.definition_loads
            ));
        }

        if self.verbosity == VerbosityLevel::Debug {
            output.push_str(&format!("\nRoot types: {}\n", results.types_used.len()));
            for (i, identity) in results.types_used.iter().enumerate() {
                output.push_str(&format!("    {}: {}\n", i + 1, identity));
            }
        }
        output
    }

    fn format_summary_line(&self, results: &LoadResults) -> String {
        format!(
            "{} documents: {} loaded, {} failed, {} skipped, {} tuples in {}\n",
            results.total_documents,
            results.loaded_documents,
            results.failed_documents,
            results.skipped_documents,
            results.total_tuples,
            format_duration(results.total_duration)
        )
    }

    /// Every document with its root tuple in composite form, plus totals
    pub fn to_json(&self, results: &LoadResults) -> serde_json::Value {
        let documents: Vec<_> = results
            .documents
            .iter()
            .map(|document| {
                let mut entry = json!({
                    "path": document.path.display().to_string(),
                    "duration_ms": document.duration.as_millis() as u64,
                });
                match &document.status {
                    DocumentStatus::Loaded => {
                        entry["status"] = json!("loaded");
                        entry["type"] = json!(document.root_type);
                        entry["tuples"] = json!(document.tuple_count);
                        if let Some(composite) = &document.composite {
                            entry["tuple"] = composite.clone();
                        }
                    }
                    DocumentStatus::Failed { message, element } => {
                        entry["status"] = json!("failed");
                        entry["error"] = json!(message);
                        entry["element"] = json!(element);
                    }
                    DocumentStatus::Skipped { reason } => {
                        entry["status"] = json!("skipped");
                        entry["reason"] = json!(reason);
                    }
                }
                entry
            })
            .collect();

        json!({
            "summary": {
                "total": results.total_documents,
                "loaded": results.loaded_documents,
                "failed": results.failed_documents,
                "skipped": results.skipped_documents,
                "tuples": results.total_tuples,
                "duration_ms": results.total_duration.as_millis() as u64,
                "resolver": results.resolver,
            },
            "documents": documents,
        })
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
