use serde_json::Value;
use tree_sitter::{Language, Node, Tree};

use super::{
    Analyzer, Parameter, SemanticEnricher, collect_strings, has_child_kind, put, put_list,
    put_parameters,
};
use crate::analyzer::classifier::{ContainerRule, Pattern, PatternTable, Unwrap};
use crate::analyzer::relations::{CallSyntax, Callee};
use crate::analyzer::{
    Chunk, ElementType, EnrichError, ImportKind, ImportRelationship, Metadata, StructuralElement,
    named_children, walk_elements,
};

static PATTERNS: &[Pattern] = &[
    Pattern::new("method_declaration", ElementType::Function),
    Pattern::new("constructor_declaration", ElementType::Function),
    Pattern::new("compact_constructor_declaration", ElementType::Function),
    Pattern::new("class_declaration", ElementType::Class),
    Pattern::new("record_declaration", ElementType::Class),
    Pattern::new("interface_declaration", ElementType::Interface),
    Pattern::new("annotation_type_declaration", ElementType::Interface),
    Pattern::new("enum_declaration", ElementType::Enum),
    Pattern::new("variable_declarator", ElementType::Variable),
];

const DECLARATORS: Unwrap = Unwrap::Children(&["variable_declarator"]);

static CONTAINERS: &[ContainerRule] = &[
    ContainerRule::new("field_declaration", DECLARATORS).with_facts(declaration_facts),
    ContainerRule::new("constant_declaration", DECLARATORS).with_facts(declaration_facts),
    ContainerRule::new("local_variable_declaration", DECLARATORS).with_facts(declaration_facts),
];

static TABLE: PatternTable = PatternTable::new("java", PATTERNS, CONTAINERS);

static CALLS: &[CallSyntax] = &[
    CallSyntax::new(
        "method_invocation",
        Callee::Qualified {
            object: "object",
            name: "name",
        },
    ),
    CallSyntax::new("object_creation_expression", Callee::Field("type")),
];

/// Declared type and modifiers shared by every declarator of a field or local.
fn declaration_facts(node: Node, source: &str, metadata: &mut Metadata) {
    if let Some(ty) = node.child_by_field_name("type") {
        put(metadata, "type", text(ty, source));
    }
    let (modifiers, annotations) = modifiers(node, source);
    put_list(metadata, "modifiers", modifiers);
    put_list(metadata, "annotations", annotations);
}

pub struct JavaAnalyzer {
    language: Language,
}

impl JavaAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }
}

impl Default for JavaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for JavaAnalyzer {
    fn language_name(&self) -> &str {
        "java"
    }

    fn extensions(&self) -> &[&str] {
        &["java"]
    }

    fn grammar(&self, _extension: &str) -> Option<Language> {
        Some(self.language.clone())
    }

    fn patterns(&self) -> &PatternTable {
        &TABLE
    }

    fn enricher(&self) -> Option<&dyn SemanticEnricher> {
        Some(self)
    }

    fn call_syntax(&self) -> &[CallSyntax] {
        CALLS
    }

    fn extract_import_relationships(&self, tree: &Tree, chunk: &Chunk) -> Vec<ImportRelationship> {
        named_children(tree.root_node())
            .into_iter()
            .filter(|n| n.kind() == "import_declaration")
            .map(|n| import(n, chunk))
            .collect()
    }

    fn extract_custom_metadata(
        &self,
        _tree: &Tree,
        _chunk: &Chunk,
        structure: &[StructuralElement],
    ) -> Metadata {
        let mut metadata = Metadata::new();
        let elements: Vec<&StructuralElement> = walk_elements(structure).collect();

        let annotations = collect_strings(elements.iter().copied(), "annotations");
        if annotations.contains("Override") {
            put(&mut metadata, "has_overrides", true);
        }
        if annotations.iter().any(|a| a == "Test" || a.starts_with("Test(")) {
            put(&mut metadata, "is_test", true);
        }
        if !annotations.is_empty() {
            put(
                &mut metadata,
                "annotations",
                annotations.into_iter().collect::<Vec<_>>(),
            );
        }
        if elements
            .iter()
            .any(|e| e.element_type == ElementType::Class && e.flag("is_exported"))
        {
            put(&mut metadata, "has_public_class", true);
        }
        if elements.iter().any(|e| e.flag("is_abstract")) {
            put(&mut metadata, "has_abstract", true);
        }
        if elements
            .iter()
            .any(|e| e.element_type == ElementType::Interface)
        {
            put(&mut metadata, "has_interface", true);
        }
        if elements.iter().any(|e| e.element_type == ElementType::Enum) {
            put(&mut metadata, "has_enum", true);
        }
        metadata
    }
}

impl SemanticEnricher for JavaAnalyzer {
    fn enrich(
        &self,
        element: &StructuralElement,
        node: Node,
        source: &str,
        metadata: &mut Metadata,
    ) -> Result<(), EnrichError> {
        if has_child_kind(node, "modifiers") {
            let (modifiers, annotations) = modifiers(node, source);
            put_list(metadata, "modifiers", modifiers);
            put_list(metadata, "annotations", annotations);
        }
        apply_modifiers(node, metadata);
        if let Some(doc) = get_javadoc(node, source) {
            put(metadata, "docstring", doc);
        }

        match element.element_type {
            ElementType::Function => enrich_method(node, source, metadata)?,
            ElementType::Class | ElementType::Interface => enrich_type(node, source, metadata),
            ElementType::Enum => {
                enrich_type(node, source, metadata);
                let constants: Vec<String> = node
                    .child_by_field_name("body")
                    .map(named_children)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|c| c.kind() == "enum_constant")
                    .filter_map(|c| c.child_by_field_name("name").map(|n| text(n, source)))
                    .collect();
                put(metadata, "constants", constants);
            }
            ElementType::Variable => {
                if let Some(value) = node.child_by_field_name("value") {
                    put(metadata, "initializer", text(value, source));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

/// Keyword modifiers and annotation names from a node's `modifiers` child.
fn modifiers(node: Node, source: &str) -> (Vec<String>, Vec<String>) {
    let mut keywords = Vec::new();
    let mut annotations = Vec::new();
    let Some(list) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "modifiers")
    else {
        return (keywords, annotations);
    };

    let mut cursor = list.walk();
    for m in list.children(&mut cursor) {
        match m.kind() {
            "marker_annotation" | "annotation" => {
                annotations.push(text(m, source).trim_start_matches('@').trim().to_string());
            }
            "line_comment" | "block_comment" => {}
            _ => keywords.push(text(m, source)),
        }
    }
    (keywords, annotations)
}

fn apply_modifiers(node: Node, metadata: &mut Metadata) {
    let modifiers: Vec<String> = metadata
        .get("modifiers")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let has = |m: &str| modifiers.iter().any(|x| x == m);

    let in_interface = node
        .parent()
        .is_some_and(|p| matches!(p.kind(), "interface_body" | "annotation_type_body"));
    let visibility = if has("public") || (in_interface && !has("private")) {
        "public"
    } else if has("protected") {
        "protected"
    } else if has("private") {
        "private"
    } else {
        "package"
    };

    put(metadata, "visibility", visibility);
    put(metadata, "is_exported", visibility == "public");
    put(metadata, "is_static", has("static"));
    put(metadata, "is_final", has("final"));
    if has("abstract") {
        put(metadata, "is_abstract", true);
    }
}

fn get_javadoc(node: Node, source: &str) -> Option<String> {
    let comment = node.prev_sibling().filter(|p| p.kind() == "block_comment")?;
    let t = text(comment, source);
    if !t.starts_with("/**") {
        return None;
    }
    let cleaned = t
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty() && !l.starts_with('@'))
        .collect::<Vec<_>>()
        .join("\n");
    (!cleaned.is_empty()).then_some(cleaned)
}

fn type_parameters(node: Node, source: &str, metadata: &mut Metadata) {
    let params = node
        .child_by_field_name("type_parameters")
        .or_else(|| {
            named_children(node)
                .into_iter()
                .find(|c| c.kind() == "type_parameters")
        });
    if let Some(params) = params {
        put(metadata, "generics", text(params, source));
    }
}

fn enrich_method(node: Node, source: &str, metadata: &mut Metadata) -> Result<(), EnrichError> {
    let is_constructor = node.kind() != "method_declaration";
    put(metadata, "is_constructor", is_constructor);
    type_parameters(node, source, metadata);

    if node.kind() != "compact_constructor_declaration" {
        let list = node
            .child_by_field_name("parameters")
            .ok_or(EnrichError::MissingField {
                node_type: "method_declaration",
                field: "parameters",
            })?;
        put_parameters(metadata, &parameters(list, source));
    }

    if let Some(ret) = node.child_by_field_name("type") {
        put(metadata, "return_type", text(ret, source));
    }
    if let Some(throws) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "throws")
    {
        let exceptions: Vec<String> = named_children(throws)
            .into_iter()
            .map(|e| text(e, source))
            .collect();
        put_list(metadata, "throws", exceptions);
    }
    Ok(())
}

fn parameters(list: Node, source: &str) -> Vec<Parameter> {
    named_children(list)
        .into_iter()
        .filter_map(|p| match p.kind() {
            "formal_parameter" => Some(Parameter {
                name: p
                    .child_by_field_name("name")
                    .map(|n| text(n, source))
                    .unwrap_or_default(),
                type_text: p.child_by_field_name("type").map(|t| text(t, source)),
                ..Parameter::default()
            }),
            "spread_parameter" => {
                let declarator = named_children(p)
                    .into_iter()
                    .find(|c| c.kind() == "variable_declarator");
                let ty = named_children(p)
                    .into_iter()
                    .find(|c| !matches!(c.kind(), "variable_declarator" | "modifiers"))
                    .map(|t| format!("{}...", text(t, source)));
                Some(Parameter {
                    name: declarator
                        .and_then(|d| d.child_by_field_name("name"))
                        .map(|n| text(n, source))
                        .unwrap_or_default(),
                    type_text: ty,
                    optional: true,
                    default: None,
                })
            }
            _ => None,
        })
        .collect()
}

fn enrich_type(node: Node, source: &str, metadata: &mut Metadata) {
    type_parameters(node, source, metadata);
    put(metadata, "is_record", node.kind() == "record_declaration");

    if let Some(superclass) = node.child_by_field_name("superclass") {
        let base: Vec<String> = named_children(superclass)
            .into_iter()
            .map(|n| text(n, source))
            .collect();
        put_list(metadata, "extends", base);
    }
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        put_list(metadata, "implements", type_list(interfaces, source));
    }
    if let Some(extends) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "extends_interfaces")
    {
        put_list(metadata, "extends", type_list(extends, source));
    }
}

/// Types listed under an `implements`/`extends` clause.
fn type_list(clause: Node, source: &str) -> Vec<String> {
    named_children(clause)
        .into_iter()
        .flat_map(|c| {
            if c.kind() == "type_list" {
                named_children(c)
            } else {
                vec![c]
            }
        })
        .map(|t| text(t, source))
        .collect()
}

fn import(node: Node, chunk: &Chunk) -> ImportRelationship {
    let line = chunk.line_of(node.start_position());
    let path = named_children(node)
        .into_iter()
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        .map(|c| chunk.text(c).to_string())
        .unwrap_or_default();

    if has_child_kind(node, "asterisk") {
        return ImportRelationship::new(path, ImportKind::Namespace, line).with_items(["*"]);
    }
    let item = path.rsplit('.').next().unwrap_or_default().to_string();
    ImportRelationship::new(path, ImportKind::Named, line).with_items([item])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalysisResult;
    use crate::analyzer::test_support::analyze_source;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn analyze(source: &str) -> AnalysisResult {
        analyze_source("src/main/java/App.java", source)
    }

    const SOURCE: &str = r#"package com.example;

import java.util.List;
import java.io.*;
import static org.junit.Assert.assertEquals;

/**
 * Entry point.
 * @author someone
 */
public class App extends Base implements Runnable, Closeable {
    private static final int MAX = 10;
    private String name, label;

    public App(String name) {
        this.name = name;
    }

    @Override
    public void run() throws IOException, InterruptedException {
        List<String> items = load(name);
        items.forEach(System.out::println);
        helper.process(new Task(MAX));
    }

    protected static <T> T pick(List<T> values, String... rest) {
        return values.get(0);
    }
}
"#;

    #[test]
    fn test_class_structure() {
        let result = analyze(SOURCE);
        assert_eq!(result.structure.len(), 1);
        let app = &result.structure[0];

        assert_eq!(app.element_type, ElementType::Class);
        assert_eq!(app.name, "App");
        assert!(app.flag("is_exported"));
        assert_eq!(app.metadata["visibility"], "public");
        assert_eq!(app.metadata["extends"], json!(["Base"]));
        assert_eq!(app.metadata["implements"], json!(["Runnable", "Closeable"]));
        assert_eq!(app.metadata["docstring"], "Entry point.");

        let names: Vec<&str> = app.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["MAX", "name", "label", "App", "run", "pick"]);
    }

    #[test]
    fn test_fields_share_declaration_facts() {
        let result = analyze(SOURCE);
        let app = &result.structure[0];

        let max = app.child("MAX").unwrap();
        assert_eq!(max.element_type, ElementType::Variable);
        assert_eq!(max.metadata["type"], "int");
        assert_eq!(max.metadata["visibility"], "private");
        assert!(max.flag("is_static"));
        assert!(max.flag("is_final"));
        assert_eq!(max.metadata["initializer"], "10");

        let label = app.child("label").unwrap();
        assert_eq!(label.metadata["type"], "String");
        assert_eq!(label.metadata["modifiers"], json!(["private"]));
    }

    #[test]
    fn test_methods() {
        let result = analyze(SOURCE);
        let app = &result.structure[0];

        let ctor = app.child("App").unwrap();
        assert_eq!(ctor.element_type, ElementType::Function);
        assert!(ctor.flag("is_constructor"));

        let run = app.child("run").unwrap();
        assert_eq!(run.metadata["annotations"], json!(["Override"]));
        assert_eq!(run.metadata["return_type"], "void");
        assert_eq!(
            run.metadata["throws"],
            json!(["IOException", "InterruptedException"])
        );
        assert_eq!(run.children[0].name, "items");

        let pick = app.child("pick").unwrap();
        assert_eq!(pick.metadata["visibility"], "protected");
        assert!(pick.flag("is_static"));
        assert_eq!(pick.metadata["generics"], "<T>");
        assert_eq!(
            pick.metadata["parameters"],
            json!([
                {"name": "values", "type": "List<T>", "optional": false, "default": null},
                {"name": "rest", "type": "String...", "optional": true, "default": null},
            ])
        );
        assert_eq!(result.metadata["has_overrides"], true);
        assert_eq!(result.metadata["has_public_class"], true);
    }

    #[test]
    fn test_calls() {
        let result = analyze(SOURCE);
        let calls: Vec<(&str, &str, Vec<&str>)> = result
            .calls
            .iter()
            .map(|c| {
                (
                    c.caller.as_str(),
                    c.callee.as_str(),
                    c.arguments.iter().map(String::as_str).collect(),
                )
            })
            .collect();
        assert_eq!(
            calls,
            vec![
                ("run", "load", vec!["name"]),
                ("run", "items.forEach", vec!["System.out::println"]),
                ("run", "helper.process", vec!["new Task(MAX)"]),
                ("run", "Task", vec!["MAX"]),
                ("pick", "values.get", vec!["0"]),
            ]
        );
    }

    #[test]
    fn test_imports() {
        let result = analyze(SOURCE);
        let summary: Vec<(&str, ImportKind, Vec<&str>)> = result
            .imports
            .iter()
            .map(|i| {
                (
                    i.imported_from.as_str(),
                    i.import_kind,
                    i.imported_items.iter().map(String::as_str).collect(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("java.util.List", ImportKind::Named, vec!["List"]),
                ("java.io", ImportKind::Namespace, vec!["*"]),
                (
                    "org.junit.Assert.assertEquals",
                    ImportKind::Named,
                    vec!["assertEquals"]
                ),
            ]
        );
        assert_eq!(result.imports[0].line, 3);
    }

    #[test]
    fn test_interface_and_enum() {
        let source = "interface Shape extends Comparable<Shape> {\n  double area();\n}\nenum Color { RED, GREEN }\n";
        let result = analyze(source);

        let shape = result.find("Shape").unwrap();
        assert_eq!(shape.element_type, ElementType::Interface);
        assert_eq!(shape.metadata["extends"], json!(["Comparable<Shape>"]));
        let area = shape.child("area").unwrap();
        assert_eq!(area.metadata["visibility"], "public");

        let color = result.find("Color").unwrap();
        assert_eq!(color.element_type, ElementType::Enum);
        assert_eq!(color.metadata["constants"], json!(["RED", "GREEN"]));
        assert_eq!(color.metadata["visibility"], "package");
    }
}
