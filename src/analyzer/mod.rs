pub mod attribution;
pub mod classifier;
pub mod error;
pub mod hasher;
pub mod languages;
pub mod registry;
pub mod relations;
pub mod universal;

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Value, json};
use tree_sitter::{Node, Point, Tree};

pub use error::{AnalysisWarning, EnrichError};
use languages::{Analyzer, DefaultAnalyzer};
use registry::AnalyzerRegistry;

/// Name given to elements whose grammar node carries no usable name.
pub const ANONYMOUS: &str = "<anonymous>";

/// Caller recorded for calls made outside any named scope.
pub const MODULE_ROOT: &str = "<module>";

/// Open, language-specific metadata. Keys are sorted so output is deterministic.
pub type Metadata = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Function,
    Class,
    Interface,
    TypeAlias,
    Enum,
    Variable,
    Namespace,
    Unknown,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::TypeAlias => "type_alias",
            Self::Enum => "enum",
            Self::Variable => "variable",
            Self::Namespace => "namespace",
            Self::Unknown => "unknown",
        }
    }

    /// Whether calls lexically inside an element of this type belong to it.
    pub fn is_scope(&self) -> bool {
        !matches!(self, Self::Variable | Self::Unknown)
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawField {
    pub node_type: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralElement {
    pub element_type: ElementType,
    pub name: String,
    /// Enclosing element names joined with `.`, e.g. `Invoice.total`.
    pub qualified_name: String,
    pub node_type: String,
    pub start_line: usize,
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub source_text: String,
    pub raw_fields: IndexMap<String, RawField>,
    pub metadata: Metadata,
    pub children: Vec<StructuralElement>,
}

impl StructuralElement {
    pub fn is_anonymous(&self) -> bool {
        self.name == ANONYMOUS
    }

    pub fn contains_byte(&self, byte: usize) -> bool {
        self.start_byte <= byte && byte < self.end_byte
    }

    /// Reads a boolean metadata entry, treating absence as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn child(&self, name: &str) -> Option<&StructuralElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Pre-order iterator over a forest of elements.
pub struct Elements<'a> {
    stack: Vec<&'a StructuralElement>,
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a StructuralElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

pub fn walk_elements(elements: &[StructuralElement]) -> Elements<'_> {
    Elements {
        stack: elements.iter().rev().collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRelationship {
    /// Enclosing element name, or [`MODULE_ROOT`]. Empty until attributed.
    pub caller: String,
    /// Qualified name of the same element, telling apart same-named methods.
    pub caller_qualified_name: String,
    pub callee: String,
    pub arguments: Vec<String>,
    pub line: usize,
    pub column: usize,
    pub start_byte: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Named,
    Default,
    Namespace,
    SideEffect,
    Dynamic,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Named => "named",
            Self::Default => "default",
            Self::Namespace => "namespace",
            Self::SideEffect => "side_effect",
            Self::Dynamic => "dynamic",
        }
    }
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRelationship {
    pub imported_from: String,
    pub imported_items: IndexSet<String>,
    pub import_kind: ImportKind,
    pub line: usize,
}

impl ImportRelationship {
    pub fn new(imported_from: impl Into<String>, import_kind: ImportKind, line: usize) -> Self {
        Self {
            imported_from: imported_from.into(),
            imported_items: IndexSet::new(),
            import_kind,
            line,
        }
    }

    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imported_items.extend(items.into_iter().map(Into::into));
        self
    }
}

/// A slice of one source file handed to the engine.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub filename: &'a str,
    pub source: &'a str,
    /// 1-based line in the file where this chunk begins.
    pub start_line: usize,
}

impl<'a> Chunk<'a> {
    pub fn new(filename: &'a str, source: &'a str) -> Self {
        Self {
            filename,
            source,
            start_line: 1,
        }
    }

    pub fn starting_at(self, line: usize) -> Self {
        Self {
            start_line: line.max(1),
            ..self
        }
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub(crate) fn line_of(&self, point: Point) -> usize {
        point.row.saturating_add(self.start_line)
    }

    pub(crate) fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub structure: Vec<StructuralElement>,
    pub calls: Vec<CallRelationship>,
    pub imports: Vec<ImportRelationship>,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AnalysisWarning>,
}

impl AnalysisResult {
    fn empty(metadata: Metadata, warning: AnalysisWarning) -> Self {
        Self {
            structure: Vec::new(),
            calls: Vec::new(),
            imports: Vec::new(),
            metadata,
            warnings: vec![warning],
        }
    }

    pub fn elements(&self) -> Elements<'_> {
        walk_elements(&self.structure)
    }

    pub fn find(&self, name: &str) -> Option<&StructuralElement> {
        self.elements().find(|e| e.name == name)
    }
}

/// Analyzes a chunk with the process-wide registry.
pub fn analyze(chunk: &Chunk) -> AnalysisResult {
    analyze_with_registry(registry::global(), chunk)
}

pub fn analyze_with_registry(registry: &AnalyzerRegistry, chunk: &Chunk) -> AnalysisResult {
    match registry.lookup(chunk.filename) {
        Some(analyzer) => analyze_with(analyzer.as_ref(), chunk),
        None => {
            let warning = unsupported(chunk);
            let mut result = analyze_with(&DefaultAnalyzer::fallback(), chunk);
            result.warnings.insert(0, warning);
            result
        }
    }
}

/// Parses the chunk with the analyzer's grammar and runs the full pipeline.
pub fn analyze_with(analyzer: &dyn Analyzer, chunk: &Chunk) -> AnalysisResult {
    let extension = chunk.extension().unwrap_or_default();
    let Some(grammar) = analyzer.grammar(&extension) else {
        return parse_failure(analyzer, chunk, "no grammar available for this file type");
    };

    let mut parser = tree_sitter::Parser::new();
    if let Err(err) = parser.set_language(&grammar) {
        return parse_failure(analyzer, chunk, &err.to_string());
    }

    match parser.parse(chunk.source, None) {
        Some(tree) => analyze_tree(analyzer, chunk, &tree),
        None => parse_failure(analyzer, chunk, "parser produced no tree"),
    }
}

/// Runs the pipeline over a tree supplied by the caller, picking the analyzer from
/// the registry and falling back to universal patterns for unknown extensions.
pub fn analyze_tree_with_registry(
    registry: &AnalyzerRegistry,
    chunk: &Chunk,
    tree: &Tree,
) -> AnalysisResult {
    match registry.lookup(chunk.filename) {
        Some(analyzer) => analyze_tree(analyzer.as_ref(), chunk, tree),
        None => {
            let warning = unsupported(chunk);
            let mut result = analyze_tree(&DefaultAnalyzer::fallback(), chunk, tree);
            result.warnings.insert(0, warning);
            result
        }
    }
}

pub fn analyze_tree(analyzer: &dyn Analyzer, chunk: &Chunk, tree: &Tree) -> AnalysisResult {
    let extraction = analyzer.extract_structure(tree, chunk);
    let mut calls = analyzer.extract_call_relationships(tree, chunk);
    let imports = analyzer.extract_import_relationships(tree, chunk);
    attribution::attribute_calls(&extraction.elements, &mut calls);

    let mut metadata = base_metadata(analyzer, chunk);
    metadata.insert(
        "element_count".to_string(),
        json!(walk_elements(&extraction.elements).count()),
    );
    metadata.extend(analyzer.extract_custom_metadata(tree, chunk, &extraction.elements));

    tracing::debug!(
        file = %chunk.filename,
        elements = extraction.elements.len(),
        calls = calls.len(),
        imports = imports.len(),
        "Analyzed chunk"
    );

    AnalysisResult {
        structure: extraction.elements,
        calls,
        imports,
        metadata,
        warnings: extraction.warnings,
    }
}

fn base_metadata(analyzer: &dyn Analyzer, chunk: &Chunk) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("language".to_string(), json!(analyzer.language_name()));
    metadata.insert("analyzer".to_string(), json!(analyzer.kind().as_str()));
    metadata.insert(
        "content_hash".to_string(),
        json!(hasher::hash_bytes(chunk.source.as_bytes())),
    );
    metadata
}

fn parse_failure(analyzer: &dyn Analyzer, chunk: &Chunk, reason: &str) -> AnalysisResult {
    tracing::warn!(file = %chunk.filename, reason, "Failed to parse chunk");
    AnalysisResult::empty(
        base_metadata(analyzer, chunk),
        AnalysisWarning::ParseFailure {
            filename: chunk.filename.to_string(),
            reason: reason.to_string(),
        },
    )
}

fn unsupported(chunk: &Chunk) -> AnalysisWarning {
    tracing::warn!(file = %chunk.filename, "No analyzer registered, using universal patterns");
    AnalysisWarning::UnsupportedLanguage {
        filename: chunk.filename.to_string(),
    }
}

pub(crate) fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub(crate) fn unquote(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn analyze_source(filename: &str, source: &str) -> AnalysisResult {
        analyze_with_registry(&AnalyzerRegistry::with_builtins(), &Chunk::new(filename, source))
    }

    pub fn parse(grammar: tree_sitter::Language, source: &str) -> Tree {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&grammar).unwrap();
        parser.parse(source, None).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::analyze_source;
    use super::*;

    #[test]
    fn test_chunk_offsets_lines() {
        let source = "function a() {\n  b();\n}\n";
        let registry = AnalyzerRegistry::with_builtins();
        let chunk = Chunk::new("a.ts", source).starting_at(40);
        let result = analyze_with_registry(&registry, &chunk);

        let a = result.find("a").expect("should find a");
        assert_eq!(a.start_line, 40);
        assert_eq!(a.end_line, 42);
        assert_eq!(result.calls[0].line, 41);
        assert_eq!(result.calls[0].column, 3);
    }

    #[test]
    fn test_huge_start_line_saturates() {
        let registry = AnalyzerRegistry::with_builtins();
        let chunk = Chunk::new("a.py", "\ndef f():\n    g()\n").starting_at(usize::MAX);
        let result = analyze_with_registry(&registry, &chunk);

        let f = result.find("f").expect("should find f");
        assert_eq!(f.start_line, usize::MAX);
        assert_eq!(f.end_line, usize::MAX);
        assert_eq!(result.calls[0].line, usize::MAX);
        assert_eq!(result.calls[0].caller, "f");
    }

    #[test]
    fn test_result_metadata() {
        let result = analyze_source("a.py", "def f():\n    pass\n");
        assert_eq!(result.metadata["language"], "python");
        assert_eq!(result.metadata["analyzer"], "custom");
        assert_eq!(result.metadata["element_count"], 1);
        assert_eq!(
            result.metadata["content_hash"].as_str().map(str::len),
            Some(64)
        );
    }

    #[test]
    fn test_unknown_extension_degrades() {
        let result = analyze_source("notes.unknownext", "whatever");
        assert!(result.structure.is_empty());
        assert!(result.calls.is_empty());
        assert!(matches!(
            result.warnings[0],
            AnalysisWarning::UnsupportedLanguage { .. }
        ));
        assert!(matches!(
            result.warnings[1],
            AnalysisWarning::ParseFailure { .. }
        ));
    }

    #[test]
    fn test_default_analyzer_without_grammar() {
        let result = analyze_source("config.yaml", "a: 1\n");
        assert!(result.structure.is_empty());
        assert_eq!(result.metadata["language"], "yaml");
        assert_eq!(result.metadata["analyzer"], "default");
        assert!(matches!(
            result.warnings[0],
            AnalysisWarning::ParseFailure { .. }
        ));
    }

    #[test]
    fn test_walk_elements_is_preorder() {
        let source = "class A {\n  m() {}\n  n() {}\n}\nfunction f() {}\n";
        let result = analyze_source("a.ts", source);
        let names: Vec<&str> = result.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "m", "n", "f"]);
    }
}
