pub mod formatter;
pub mod style;

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Value, json};

use crate::analyzer::{AnalysisResult, StructuralElement};
use crate::config::{OutputConfig, OutputFormat};
use formatter::OutputFormatter;

/// Analysis of one file, keyed by the path it was read from.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    pub include_source: bool,
    /// Max characters kept per element; 0 keeps everything.
    pub truncate_source: usize,
}

impl From<&OutputConfig> for SourceOptions {
    fn from(config: &OutputConfig) -> Self {
        Self {
            include_source: config.include_source,
            truncate_source: config.truncate_source,
        }
    }
}

pub fn formatter_for(format: OutputFormat, source: SourceOptions) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter { source }),
        OutputFormat::Text => Box::new(TextFormatter { source }),
    }
}

/// Truncates to at most `max_chars` characters, appending `...` when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(max_chars) {
        Some((boundary, _)) => format!("{}...", &text[..boundary]),
        None => text.to_string(),
    }
}

pub struct JsonFormatter {
    pub source: SourceOptions,
}

impl JsonFormatter {
    fn report_value(&self, report: &FileReport) -> Value {
        let mut value = json!(report);
        if let Some(structure) = value.get_mut("structure").and_then(Value::as_array_mut) {
            for element in structure {
                self.rewrite_source(element);
            }
        }
        value
    }

    fn rewrite_source(&self, element: &mut Value) {
        let Some(obj) = element.as_object_mut() else {
            return;
        };
        if self.source.include_source {
            if let Some(Value::String(text)) = obj.get_mut("source_text") {
                *text = truncate(text, self.source.truncate_source);
            }
        } else {
            obj.remove("source_text");
        }
        if let Some(children) = obj.get_mut("children").and_then(Value::as_array_mut) {
            for child in children {
                self.rewrite_source(child);
            }
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_reports(&self, reports: &[FileReport]) -> String {
        let values: Vec<Value> = reports.iter().map(|r| self.report_value(r)).collect();
        serde_json::to_string_pretty(&values).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to serialize reports");
            "[]".to_string()
        })
    }
}

pub struct TextFormatter {
    pub source: SourceOptions,
}

impl TextFormatter {
    fn write_report(&self, out: &mut String, report: &FileReport) {
        let result = &report.result;
        let language = result
            .metadata
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let analyzer = result
            .metadata
            .get("analyzer")
            .and_then(Value::as_str)
            .unwrap_or("default");
        let _ = writeln!(
            out,
            "{} {}",
            style::heading(&report.path),
            style::info(&format!("({language}, {analyzer})"))
        );

        for element in &result.structure {
            self.write_element(out, element, 1);
        }

        if !result.calls.is_empty() {
            let _ = writeln!(out, "  {}", style::heading("calls"));
            for call in &result.calls {
                let _ = writeln!(
                    out,
                    "    {} -> {}({}) {}",
                    call.caller_qualified_name,
                    call.callee,
                    call.arguments.join(", "),
                    style::info(&format!("L{}:{}", call.line, call.column))
                );
            }
        }

        if !result.imports.is_empty() {
            let _ = writeln!(out, "  {}", style::heading("imports"));
            for import in &result.imports {
                let items: Vec<&str> = import.imported_items.iter().map(String::as_str).collect();
                let items = if items.is_empty() {
                    String::new()
                } else {
                    format!(" {{{}}}", items.join(", "))
                };
                let _ = writeln!(
                    out,
                    "    {}{items} {}",
                    import.imported_from,
                    style::info(&format!("{} L{}", import.import_kind, import.line))
                );
            }
        }

        for warning in &result.warnings {
            let _ = writeln!(out, "  {}", style::warn(&format!("warning: {warning}")));
        }
    }

    fn write_element(&self, out: &mut String, element: &StructuralElement, depth: usize) {
        let indent = "  ".repeat(depth);
        let flags: Vec<&str> = element
            .metadata
            .iter()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(k, _)| k.as_str())
            .collect();
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(" "))
        };
        let _ = writeln!(
            out,
            "{indent}{} {} {}{flags}",
            style::kind(element.element_type.as_str()),
            element.name,
            style::info(&format!("L{}-{}", element.start_line, element.end_line)),
        );

        if self.source.include_source {
            let source = truncate(&element.source_text, self.source.truncate_source);
            for line in source.lines() {
                let _ = writeln!(out, "{indent}  {}", style::info(&format!("| {line}")));
            }
        }

        for child in &element.children {
            self.write_element(out, child, depth + 1);
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format_reports(&self, reports: &[FileReport]) -> String {
        let mut out = String::new();
        for (i, report) in reports.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            self.write_report(&mut out, report);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::test_support::analyze_source;

    const SOURCE: &str = "import { get } from './http';\n\nexport async function load(id: string) {\n  return get(id);\n}\n";

    fn report() -> FileReport {
        FileReport {
            path: "src/load.ts".to_string(),
            result: analyze_source("src/load.ts", SOURCE),
        }
    }

    fn options(include_source: bool, truncate_source: usize) -> SourceOptions {
        SourceOptions {
            include_source,
            truncate_source,
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("anything", 0), "anything");
    }

    #[test]
    fn test_json_omits_source_by_default() {
        let formatter = JsonFormatter {
            source: options(false, 200),
        };
        let out = formatter.format_report(&report());
        let value: Value = serde_json::from_str(&out).unwrap();
        let file = &value[0];
        assert_eq!(file["path"], "src/load.ts");
        assert_eq!(file["metadata"]["language"], "typescript");
        let load = &file["structure"][0];
        assert_eq!(load["name"], "load");
        assert_eq!(load["element_type"], "function");
        assert!(load.get("source_text").is_none());
        assert_eq!(file["calls"][0]["callee"], "get");
        assert_eq!(file["imports"][0]["imported_from"], "./http");
    }

    #[test]
    fn test_json_truncates_included_source() {
        let formatter = JsonFormatter {
            source: options(true, 14),
        };
        let out = formatter.format_report(&report());
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["structure"][0]["source_text"], "async function...");
    }

    #[test]
    fn test_text_lists_elements_calls_and_imports() {
        let formatter = TextFormatter {
            source: options(false, 200),
        };
        let out = formatter.format_report(&report());
        assert!(out.contains("src/load.ts"));
        assert!(out.contains("load"));
        assert!(out.contains("is_async"));
        assert!(out.contains("-> get(id)"));
        assert!(out.contains("./http {get}"));
    }

    #[test]
    fn test_formatter_for_selects_format() {
        let reports = vec![report()];
        let json = formatter_for(OutputFormat::Json, options(false, 0)).format_reports(&reports);
        assert!(json.trim_start().starts_with('['));
        let text = formatter_for(OutputFormat::Text, options(false, 0)).format_reports(&reports);
        assert!(!text.trim_start().starts_with('['));
    }
}
