pub mod java;
pub mod python;
pub mod ruby;
pub mod rust_lang;
pub mod typescript;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tree_sitter::{Language, Node, Tree};

use super::classifier::{PatternTable, UNIVERSAL_TABLE};
use super::relations::{self, CallSyntax};
use super::universal::{Extraction, UniversalExtractor};
use super::{
    CallRelationship, Chunk, EnrichError, ImportRelationship, Metadata, StructuralElement,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    /// Hand-written analyzer with enrichment and relationship extraction.
    Custom,
    /// Universal patterns only.
    Default,
}

impl AnalyzerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Default => "default",
        }
    }
}

/// Adds language-specific metadata to an element after it has been built.
pub trait SemanticEnricher: Send + Sync {
    fn enrich(
        &self,
        element: &StructuralElement,
        node: Node,
        source: &str,
        metadata: &mut Metadata,
    ) -> Result<(), EnrichError>;
}

/// One language's analysis pipeline. Every step has a default, so an analyzer
/// only overrides what its language needs.
pub trait Analyzer: Send + Sync {
    fn language_name(&self) -> &str;
    fn extensions(&self) -> &[&str];

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Custom
    }

    /// Grammar for files with `extension`, if this analyzer can parse them.
    fn grammar(&self, extension: &str) -> Option<Language>;

    fn patterns(&self) -> &PatternTable;

    fn enricher(&self) -> Option<&dyn SemanticEnricher> {
        None
    }

    fn call_syntax(&self) -> &[CallSyntax] {
        &[]
    }

    fn extract_structure(&self, tree: &Tree, chunk: &Chunk) -> Extraction {
        UniversalExtractor::new(self.patterns())
            .with_enricher(self.enricher())
            .extract(tree.root_node(), chunk)
    }

    fn extract_call_relationships(&self, tree: &Tree, chunk: &Chunk) -> Vec<CallRelationship> {
        relations::scan_calls(tree.root_node(), chunk, self.call_syntax())
    }

    fn extract_import_relationships(&self, _tree: &Tree, _chunk: &Chunk) -> Vec<ImportRelationship> {
        Vec::new()
    }

    fn extract_custom_metadata(
        &self,
        _tree: &Tree,
        _chunk: &Chunk,
        _structure: &[StructuralElement],
    ) -> Metadata {
        Metadata::new()
    }
}

/// Structure-only analyzer built from a pattern table and an optional grammar.
pub struct DefaultAnalyzer {
    language: &'static str,
    extensions: &'static [&'static str],
    grammar: Option<Language>,
    table: &'static PatternTable,
}

impl DefaultAnalyzer {
    pub fn new(language: &'static str, extensions: &'static [&'static str]) -> Self {
        Self {
            language,
            extensions,
            grammar: None,
            table: &UNIVERSAL_TABLE,
        }
    }

    pub fn with_grammar(
        language: &'static str,
        extensions: &'static [&'static str],
        grammar: Language,
        table: &'static PatternTable,
    ) -> Self {
        Self {
            language,
            extensions,
            grammar: Some(grammar),
            table,
        }
    }

    /// Used for files no registered analyzer claims.
    pub fn fallback() -> Self {
        Self::new("unknown", &[])
    }
}

impl Analyzer for DefaultAnalyzer {
    fn language_name(&self) -> &str {
        self.language
    }

    fn extensions(&self) -> &[&str] {
        self.extensions
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Default
    }

    fn grammar(&self, _extension: &str) -> Option<Language> {
        self.grammar.clone()
    }

    fn patterns(&self) -> &PatternTable {
        self.table
    }
}

/// Every built-in analyzer, custom ones first.
pub fn discover_plugins() -> Vec<Arc<dyn Analyzer>> {
    vec![
        Arc::new(typescript::TypeScriptAnalyzer::new()),
        Arc::new(python::PythonAnalyzer::new()),
        Arc::new(java::JavaAnalyzer::new()),
        Arc::new(rust_lang::RustAnalyzer::new()),
        Arc::new(ruby::analyzer()),
        Arc::new(DefaultAnalyzer::new("html", &["html", "htm"])),
        Arc::new(DefaultAnalyzer::new("css", &["css", "scss", "sass"])),
        Arc::new(DefaultAnalyzer::new("json", &["json"])),
        Arc::new(DefaultAnalyzer::new("yaml", &["yaml", "yml"])),
        Arc::new(DefaultAnalyzer::new("toml", &["toml"])),
        Arc::new(DefaultAnalyzer::new("xml", &["xml"])),
        Arc::new(DefaultAnalyzer::new("shell", &["sh", "bash"])),
        Arc::new(DefaultAnalyzer::new("c", &["c", "h"])),
        Arc::new(DefaultAnalyzer::new("cpp", &["cpp", "cc", "cxx", "hpp"])),
        Arc::new(DefaultAnalyzer::new("go", &["go"])),
        Arc::new(DefaultAnalyzer::new("php", &["php"])),
        Arc::new(DefaultAnalyzer::new("swift", &["swift"])),
        Arc::new(DefaultAnalyzer::new("kotlin", &["kt", "kts"])),
        Arc::new(DefaultAnalyzer::new("rust", &["rs"])),
    ]
}

/// Built-in analyzer for a language name, used to alias extra extensions.
pub fn plugin_for_language(language: &str) -> Option<Arc<dyn Analyzer>> {
    discover_plugins()
        .into_iter()
        .find(|a| a.language_name() == language)
}

/// A function or method parameter as reported in metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_text: Option<String>,
    pub optional: bool,
    pub default: Option<String>,
}

impl Parameter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "type": self.type_text,
            "optional": self.optional || self.default.is_some(),
            "default": self.default,
        })
    }
}

pub(crate) fn put(metadata: &mut Metadata, key: &str, value: impl Into<Value>) {
    metadata.insert(key.to_string(), value.into());
}

pub(crate) fn put_list(metadata: &mut Metadata, key: &str, items: Vec<String>) {
    if !items.is_empty() {
        put(metadata, key, items);
    }
}

pub(crate) fn put_parameters(metadata: &mut Metadata, params: &[Parameter]) {
    put(
        metadata,
        "parameters",
        Value::Array(params.iter().map(Parameter::to_value).collect()),
    );
}

pub(crate) fn has_child_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == kind)
}

/// Strips a leading `:` or `->` from a type annotation.
pub(crate) fn annotation_type(text: &str) -> String {
    text.trim()
        .trim_start_matches(':')
        .trim_start_matches("->")
        .trim()
        .to_string()
}

/// Whether any node under `node` (inclusive) has one of `kinds`.
pub(crate) fn tree_contains(node: Node, kinds: &[&str]) -> bool {
    if kinds.contains(&node.kind()) {
        return true;
    }
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).any(|c| tree_contains(c, kinds));
    found
}

/// Collects the string values of an array-valued metadata key across elements.
pub(crate) fn collect_strings<'a>(
    elements: impl Iterator<Item = &'a StructuralElement>,
    key: &str,
) -> std::collections::BTreeSet<String> {
    elements
        .filter_map(|e| e.metadata.get(key).and_then(Value::as_array))
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}
