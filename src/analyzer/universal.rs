use indexmap::IndexMap;
use serde_json::Value;
use tree_sitter::Node;

use super::classifier::{Classification, ContainerRule, Pattern, PatternTable, is_identifier_kind};
use super::languages::SemanticEnricher;
use super::{
    ANONYMOUS, AnalysisWarning, Chunk, Metadata, RawField, StructuralElement, named_children,
    unquote,
};

/// Elements found in a chunk plus any enrichment failures along the way.
#[derive(Debug, Default)]
pub struct Extraction {
    pub elements: Vec<StructuralElement>,
    pub warnings: Vec<AnalysisWarning>,
}

/// Walks a syntax tree and builds the element hierarchy using a [`PatternTable`].
pub struct UniversalExtractor<'a> {
    table: &'a PatternTable,
    enricher: Option<&'a dyn SemanticEnricher>,
}

impl<'a> UniversalExtractor<'a> {
    pub fn new(table: &'a PatternTable) -> Self {
        Self {
            table,
            enricher: None,
        }
    }

    pub fn with_enricher(mut self, enricher: Option<&'a dyn SemanticEnricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn extract(&self, root: Node, chunk: &Chunk) -> Extraction {
        let mut extraction = Extraction::default();
        self.visit(
            root,
            chunk,
            None,
            &mut extraction.elements,
            &mut extraction.warnings,
        );
        qualify(&mut extraction.elements, None);
        extraction
    }

    fn visit(
        &self,
        node: Node,
        chunk: &Chunk,
        facts: Option<&Metadata>,
        out: &mut Vec<StructuralElement>,
        warnings: &mut Vec<AnalysisWarning>,
    ) {
        match self.table.classify(node) {
            Classification::Element(pattern) => {
                out.push(self.build(node, &pattern, chunk, facts, warnings));
            }
            Classification::Container(rule) => {
                self.unwrap_container(node, &rule, chunk, facts, out, warnings);
            }
            Classification::None => self.visit_children(node, chunk, out, warnings),
        }
    }

    fn visit_children(
        &self,
        node: Node,
        chunk: &Chunk,
        out: &mut Vec<StructuralElement>,
        warnings: &mut Vec<AnalysisWarning>,
    ) {
        for child in named_children(node) {
            self.visit(child, chunk, None, out, warnings);
        }
    }

    fn unwrap_container(
        &self,
        node: Node,
        rule: &ContainerRule,
        chunk: &Chunk,
        inherited: Option<&Metadata>,
        out: &mut Vec<StructuralElement>,
        warnings: &mut Vec<AnalysisWarning>,
    ) {
        let mut facts = inherited.cloned().unwrap_or_default();
        if let Some(record) = rule.facts {
            record(node, chunk.source, &mut facts);
        }

        let targets = rule.targets(node);
        let is_target = |n: Node| targets.iter().any(|t| t.id() == n.id());
        let body = rule.body(node);

        for child in named_children(node) {
            if is_target(child) {
                self.visit(child, chunk, Some(&facts), out, warnings);
            } else if body.is_some_and(|b| b.id() == child.id()) {
                for inner in named_children(child) {
                    let inner_facts = is_target(inner).then_some(&facts);
                    self.visit(inner, chunk, inner_facts, out, warnings);
                }
            } else {
                self.visit(child, chunk, None, out, warnings);
            }
        }
    }

    fn build(
        &self,
        node: Node,
        pattern: &Pattern,
        chunk: &Chunk,
        facts: Option<&Metadata>,
        warnings: &mut Vec<AnalysisWarning>,
    ) -> StructuralElement {
        let mut children = Vec::new();
        self.visit_children(node, chunk, &mut children, warnings);

        let mut element = StructuralElement {
            element_type: pattern.category,
            name: resolve_name(node, pattern.name_field, chunk),
            qualified_name: String::new(),
            node_type: node.kind().to_string(),
            start_line: chunk.line_of(node.start_position()),
            end_line: chunk.line_of(node.end_position()),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            source_text: chunk.text(node).to_string(),
            raw_fields: raw_fields(node, chunk),
            metadata: facts.cloned().unwrap_or_default(),
            children,
        };

        if let Some(enricher) = self.enricher {
            let mut metadata = std::mem::take(&mut element.metadata);
            if let Err(e) = enricher.enrich(&element, node, chunk.source, &mut metadata) {
                tracing::warn!(
                    file = %chunk.filename,
                    element = %element.name,
                    line = element.start_line,
                    error = %e,
                    "Semantic enrichment failed"
                );
                warnings.push(AnalysisWarning::EnhancementFailure {
                    element: element.name.clone(),
                    node_type: element.node_type.clone(),
                    line: element.start_line,
                    reason: e.to_string(),
                });
            }
            element.metadata = metadata;
        }

        element
    }
}

/// Fills `qualified_name` top-down. Impl members at the top level are
/// qualified by their `impl_type`.
fn qualify(elements: &mut [StructuralElement], parent: Option<&str>) {
    for element in elements {
        let prefix = parent.map(str::to_string).or_else(|| {
            element
                .metadata
                .get("impl_type")
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        element.qualified_name = match prefix {
            Some(prefix) => format!("{prefix}.{}", element.name),
            None => element.name.clone(),
        };
        let qualified = element.qualified_name.clone();
        qualify(&mut element.children, Some(&qualified));
    }
}

fn resolve_name(node: Node, field: &str, chunk: &Chunk) -> String {
    node.child_by_field_name(field)
        .and_then(|n| name_from(n, chunk))
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

fn name_from(node: Node, chunk: &Chunk) -> Option<String> {
    let kind = node.kind();
    if is_identifier_kind(kind) {
        return Some(chunk.text(node).to_string());
    }
    if kind == "string" {
        let name = unquote(chunk.text(node));
        return (!name.is_empty()).then(|| name.to_string());
    }
    named_children(node)
        .into_iter()
        .find(|c| is_identifier_kind(c.kind()))
        .map(|c| chunk.text(c).to_string())
}

/// Grammar fields of `node`, first occurrence of each field name winning.
fn raw_fields(node: Node, chunk: &Chunk) -> IndexMap<String, RawField> {
    let mut fields = IndexMap::new();
    let mut cursor = node.walk();
    if !cursor.goto_first_child() {
        return fields;
    }
    loop {
        let child = cursor.node();
        if let Some(field) = cursor.field_name().filter(|_| child.is_named()) {
            fields.entry(field.to_string()).or_insert_with(|| RawField {
                node_type: child.kind().to_string(),
                text: chunk.text(child).to_string(),
            });
        }
        if !cursor.goto_next_sibling() {
            break;
        }
    }
    fields
}
