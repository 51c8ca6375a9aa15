use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{IndexStats, OutputFormat, QueryMatch, RunReport};
use crate::utils::preview;

const PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_run_report(&self, report: &RunReport) -> String;
    fn format_stats(&self, stats: &IndexStats) -> String;
    fn format_query_results(&self, query: &str, matches: &[QueryMatch]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

/// Reachability of the two remote services.
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_model: String,
    pub embedding_dimension: u32,
    pub embedding_url: String,
    pub embedding_connected: bool,
    pub embedding_error: Option<String>,
    pub vector_store_driver: String,
    pub index_name: String,
    pub vector_store_connected: bool,
    pub vector_store_error: Option<String>,
    pub vector_count: Option<u64>,
    pub index_dimension: Option<u64>,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_run_report(&self, report: &RunReport) -> String {
        let mut output = String::new();
        let title = if report.persisted {
            "Document Loaded"
        } else {
            "Dry Run Complete"
        };
        writeln!(output, "{}", title).unwrap();
        writeln!(output, "{}", "-".repeat(title.len())).unwrap();
        writeln!(output, "File:       {}", report.file).unwrap();
        writeln!(output, "Index:      {}", report.index_name).unwrap();
        if let Some(ref ns) = report.namespace {
            writeln!(output, "Namespace:  {}", ns).unwrap();
        }
        writeln!(output, "Characters: {}", report.characters).unwrap();
        writeln!(output, "Chunks:     {}", report.chunks).unwrap();
        writeln!(output, "Dimension:  {}", report.dimension).unwrap();
        if report.persisted {
            writeln!(output, "Upserted:   {}", report.vectors_upserted).unwrap();
        } else {
            writeln!(output, "Validated:  {} (nothing persisted)", report.vectors_upserted)
                .unwrap();
        }
        writeln!(output, "Duration:   {}ms", report.duration_ms).unwrap();

        if !report.vector_ids.is_empty() {
            let shown: Vec<&str> = report.vector_ids.iter().take(3).map(String::as_str).collect();
            let more = report.vector_ids.len().saturating_sub(shown.len());
            if more > 0 {
                writeln!(output, "Vector IDs: {} (+{} more)", shown.join(", "), more).unwrap();
            } else {
                writeln!(output, "Vector IDs: {}", shown.join(", ")).unwrap();
            }
        }
        output
    }

    fn format_stats(&self, stats: &IndexStats) -> String {
        let mut output = String::new();
        writeln!(output, "Index Statistics").unwrap();
        writeln!(output, "----------------").unwrap();
        writeln!(output, "Index:         {}", stats.index_name).unwrap();
        writeln!(output, "Total vectors: {}", stats.total_vector_count).unwrap();
        writeln!(output, "Dimension:     {}", stats.dimension).unwrap();

        if !stats.namespaces.is_empty() {
            writeln!(output, "Namespaces:").unwrap();
            for (name, count) in &stats.namespaces {
                let name = if name.is_empty() { "(default)" } else { name };
                writeln!(output, "  {} ({})", name, count).unwrap();
            }
        }
        output
    }

    fn format_query_results(&self, query: &str, matches: &[QueryMatch]) -> String {
        if matches.is_empty() {
            return format!("No results found for: {}\n", query);
        }

        let mut output = String::new();
        writeln!(output, "Results for: \"{}\"\n", query).unwrap();

        for (i, m) in matches.iter().enumerate() {
            writeln!(output, "{}. [Score: {:.3}] {}", i + 1, m.score, m.id).unwrap();
            if let Some(ref meta) = m.metadata {
                writeln!(
                    output,
                    "   Source: {} (chunk {})",
                    meta.source, meta.chunk_index
                )
                .unwrap();
                writeln!(output, "   ---").unwrap();
                for line in preview(&meta.text, PREVIEW_CHARS).lines() {
                    writeln!(output, "   {}", line).unwrap();
                }
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let embedding_status = if status.embedding_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(output, "Embedding API: {}", embedding_status).unwrap();
        writeln!(output, "  URL:         {}", status.embedding_url).unwrap();
        writeln!(
            output,
            "  Model:       {} ({} dimensions)",
            status.embedding_model, status.embedding_dimension
        )
        .unwrap();
        if let Some(ref err) = status.embedding_error {
            writeln!(output, "  Error:       {}", err).unwrap();
        }
        writeln!(output).unwrap();

        let vector_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Store:  {} ({})",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "  Index:       {}", status.index_name).unwrap();
        if let Some(count) = status.vector_count {
            writeln!(output, "  Vectors:     {}", count).unwrap();
        }
        if let Some(dim) = status.index_dimension {
            writeln!(output, "  Dimension:   {}", dim).unwrap();
        }
        if let Some(ref err) = status.vector_store_error {
            writeln!(output, "  Error:       {}", err).unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_run_report(&self, report: &RunReport) -> String {
        self.render(report)
    }

    fn format_stats(&self, stats: &IndexStats) -> String {
        self.render(stats)
    }

    fn format_query_results(&self, query: &str, matches: &[QueryMatch]) -> String {
        self.render(&serde_json::json!({
            "query": query,
            "total": matches.len(),
            "matches": matches,
        }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "embedding": {
                "url": status.embedding_url,
                "model": status.embedding_model,
                "dimension": status.embedding_dimension,
                "connected": status.embedding_connected,
                "error": status.embedding_error,
            },
            "vector_store": {
                "driver": status.vector_store_driver,
                "index": status.index_name,
                "connected": status.vector_store_connected,
                "vectors": status.vector_count,
                "dimension": status.index_dimension,
                "error": status.vector_store_error,
            }
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn report() -> RunReport {
        RunReport {
            file: "handbook.docx".to_string(),
            index_name: "chatbot-rag".to_string(),
            namespace: None,
            characters: 10,
            chunks: 4,
            vectors_upserted: 4,
            dimension: 512,
            vector_ids: (0..4).map(|i| format!("handbook_chunk_{i}")).collect(),
            persisted: true,
            duration_ms: 12,
        }
    }

    #[test]
    fn test_text_run_report() {
        let out = TextFormatter.format_run_report(&report());
        assert!(out.starts_with("Document Loaded"));
        assert!(out.contains("Upserted:   4"));
        assert!(out.contains("handbook_chunk_2 (+1 more)"));

        let dry = RunReport {
            persisted: false,
            ..report()
        };
        assert!(TextFormatter.format_run_report(&dry).contains("nothing persisted"));
    }

    #[test]
    fn test_text_stats_names_default_namespace() {
        let stats = IndexStats {
            index_name: "chatbot-rag".to_string(),
            total_vector_count: 7,
            dimension: 512,
            namespaces: BTreeMap::from([(String::new(), 5), ("test".to_string(), 2)]),
        };
        let out = TextFormatter.format_stats(&stats);
        assert!(out.contains("Total vectors: 7"));
        assert!(out.contains("(default) (5)"));
        assert!(out.contains("test (2)"));
    }

    #[test]
    fn test_json_run_report() {
        let out = JsonFormatter::new(false).format_run_report(&report());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["vectors_upserted"], 4);
        assert_eq!(value["vector_ids"][3], "handbook_chunk_3");
    }

    #[test]
    fn test_empty_query_results() {
        let out = TextFormatter.format_query_results("leave policy", &[]);
        assert_eq!(out, "No results found for: leave policy\n");

        let json = JsonFormatter::new(false).format_query_results("leave policy", &[]);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total"], 0);
    }
}
