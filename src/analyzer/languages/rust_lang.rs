use tree_sitter::{Language, Node, Tree};

use super::{
    Analyzer, Parameter, SemanticEnricher, annotation_type, collect_strings, has_child_kind, put,
    put_list, put_parameters,
};
use crate::analyzer::classifier::{ContainerRule, Pattern, PatternTable, Unwrap};
use crate::analyzer::relations::{CallSyntax, Callee};
use crate::analyzer::{
    Chunk, ElementType, EnrichError, ImportKind, ImportRelationship, Metadata, StructuralElement,
    named_children, walk_elements,
};

static PATTERNS: &[Pattern] = &[
    Pattern::new("function_signature_item", ElementType::Function),
    Pattern::new("union_item", ElementType::Class),
    Pattern::new("let_declaration", ElementType::Variable)
        .named_by("pattern")
        .when_field("pattern", &["identifier"]),
    Pattern::new("macro_definition", ElementType::Function),
];

static CONTAINERS: &[ContainerRule] = &[ContainerRule::new(
    "impl_item",
    Unwrap::Body {
        field: "body",
        kinds: &[
            "function_item",
            "function_signature_item",
            "const_item",
            "type_item",
        ],
    },
)
.with_facts(impl_facts)];

static TABLE: PatternTable = PatternTable::new("rust", PATTERNS, CONTAINERS);

static CALLS: &[CallSyntax] = &[CallSyntax::new("call_expression", Callee::Field("function"))];

fn impl_facts(node: Node, source: &str, metadata: &mut Metadata) {
    if let Some(ty) = node.child_by_field_name("type") {
        put(metadata, "impl_type", text(ty, source));
    }
    if let Some(tr) = node.child_by_field_name("trait") {
        put(metadata, "impl_trait", text(tr, source));
    }
}

pub struct RustAnalyzer {
    language: Language,
}

impl RustAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_rust::LANGUAGE.into(),
        }
    }
}

impl Default for RustAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for RustAnalyzer {
    fn language_name(&self) -> &str {
        "rust"
    }

    fn extensions(&self) -> &[&str] {
        &["rs"]
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
        let mut imports = Vec::new();
        collect_imports(tree.root_node(), chunk, &mut imports);
        imports
    }

    fn extract_custom_metadata(
        &self,
        _tree: &Tree,
        _chunk: &Chunk,
        structure: &[StructuralElement],
    ) -> Metadata {
        let mut metadata = Metadata::new();
        let elements: Vec<&StructuralElement> = walk_elements(structure).collect();

        let attributes = collect_strings(elements.iter().copied(), "attributes");
        if attributes
            .iter()
            .any(|a| a == "test" || a.ends_with("::test") || a == "cfg(test)")
        {
            put(&mut metadata, "has_tests", true);
        }
        if elements.iter().any(|e| e.flag("is_async")) {
            put(&mut metadata, "has_async_functions", true);
        }
        if elements.iter().any(|e| e.flag("is_unsafe")) {
            put(&mut metadata, "has_unsafe", true);
        }
        let public = elements
            .iter()
            .filter(|e| e.element_type != ElementType::Variable && e.flag("is_exported"))
            .count();
        put(&mut metadata, "public_item_count", public);
        metadata
    }
}

impl SemanticEnricher for RustAnalyzer {
    fn enrich(
        &self,
        element: &StructuralElement,
        node: Node,
        source: &str,
        metadata: &mut Metadata,
    ) -> Result<(), EnrichError> {
        let visibility = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "visibility_modifier")
            .map(|v| text(v, source));
        put(metadata, "is_exported", visibility.is_some());
        put(
            metadata,
            "visibility",
            visibility.unwrap_or_else(|| "private".to_string()),
        );

        let (docs, attributes) = leading_docs_and_attributes(node, source);
        if let Some(doc) = docs {
            put(metadata, "docstring", doc);
        }
        put_list(metadata, "attributes", attributes);

        match element.element_type {
            ElementType::Function => enrich_function(node, source, metadata)?,
            ElementType::Class => {
                generics(node, source, metadata);
                enrich_struct_fields(node, source, metadata);
            }
            ElementType::Enum => {
                generics(node, source, metadata);
                let variants: Vec<String> = node
                    .child_by_field_name("body")
                    .map(named_children)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|v| v.kind() == "enum_variant")
                    .filter_map(|v| v.child_by_field_name("name").map(|n| text(n, source)))
                    .collect();
                put(metadata, "variants", variants);
            }
            ElementType::Interface => {
                generics(node, source, metadata);
                if let Some(bounds) = node.child_by_field_name("bounds") {
                    put(
                        metadata,
                        "supertraits",
                        annotation_type(&text(bounds, source)),
                    );
                }
                put(metadata, "is_unsafe", has_child_kind(node, "unsafe"));
            }
            ElementType::TypeAlias => {
                generics(node, source, metadata);
                if let Some(ty) = node.child_by_field_name("type") {
                    put(metadata, "aliased_type", text(ty, source));
                }
            }
            ElementType::Variable => {
                if let Some(ty) = node.child_by_field_name("type") {
                    put(metadata, "type", text(ty, source));
                }
                let kind = match node.kind() {
                    "const_item" => "const",
                    "static_item" => "static",
                    _ => "let",
                };
                put(metadata, "declaration_kind", kind);
                put(
                    metadata,
                    "is_mutable",
                    has_child_kind(node, "mutable_specifier"),
                );
            }
            ElementType::Namespace => {
                put(
                    metadata,
                    "is_inline",
                    node.child_by_field_name("body").is_some(),
                );
            }
            _ => {}
        }
        Ok(())
    }
}

fn text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

/// `///` doc lines and `#[...]` attributes stacked above an item.
fn leading_docs_and_attributes(node: Node, source: &str) -> (Option<String>, Vec<String>) {
    let mut lines = Vec::new();
    let mut attributes = Vec::new();
    let mut sibling = node.prev_sibling();
    while let Some(s) = sibling {
        match s.kind() {
            "attribute_item" => {
                let t = text(s, source);
                let inner = t.trim_start_matches("#[").trim_end_matches(']').trim();
                attributes.push(inner.to_string());
            }
            "line_comment" => {
                let t = text(s, source);
                let Some(stripped) = t.strip_prefix("///") else {
                    break;
                };
                lines.push(stripped.trim().to_string());
            }
            _ => break,
        }
        sibling = s.prev_sibling();
    }
    lines.reverse();
    attributes.reverse();
    let docs = (!lines.is_empty()).then(|| lines.join("\n"));
    (docs, attributes)
}

fn generics(node: Node, source: &str, metadata: &mut Metadata) {
    if let Some(params) = node.child_by_field_name("type_parameters") {
        put(metadata, "generics", text(params, source));
    }
}

fn enrich_function(node: Node, source: &str, metadata: &mut Metadata) -> Result<(), EnrichError> {
    generics(node, source, metadata);
    if node.kind() == "macro_definition" {
        put(metadata, "is_macro", true);
        return Ok(());
    }

    let list = node
        .child_by_field_name("parameters")
        .ok_or(EnrichError::MissingField {
            node_type: "function_item",
            field: "parameters",
        })?;
    let params: Vec<Parameter> = named_children(list)
        .into_iter()
        .filter_map(|p| match p.kind() {
            "parameter" => Some(Parameter {
                name: p
                    .child_by_field_name("pattern")
                    .map(|n| text(n, source))
                    .unwrap_or_default(),
                type_text: p.child_by_field_name("type").map(|t| text(t, source)),
                ..Parameter::default()
            }),
            "self_parameter" => Some(Parameter::named(text(p, source))),
            "variadic_parameter" => Some(Parameter {
                optional: true,
                ..Parameter::named(text(p, source))
            }),
            _ => None,
        })
        .collect();
    put(
        metadata,
        "is_method",
        params.first().is_some_and(|p| p.name.contains("self")),
    );
    put_parameters(metadata, &params);

    if let Some(ret) = node.child_by_field_name("return_type") {
        put(metadata, "return_type", text(ret, source));
    }

    let modifiers = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "function_modifiers");
    let has_modifier = |kind: &str| modifiers.is_some_and(|m| has_child_kind(m, kind));
    put(metadata, "is_async", has_modifier("async"));
    put(metadata, "is_unsafe", has_modifier("unsafe"));
    put(metadata, "is_const", has_modifier("const"));
    if has_modifier("extern_modifier") {
        put(metadata, "is_extern", true);
    }
    Ok(())
}

fn enrich_struct_fields(node: Node, source: &str, metadata: &mut Metadata) {
    let Some(body) = node.child_by_field_name("body") else {
        put(metadata, "is_unit", true);
        return;
    };
    match body.kind() {
        "field_declaration_list" => {
            let fields: Vec<String> = named_children(body)
                .into_iter()
                .filter(|f| f.kind() == "field_declaration")
                .filter_map(|f| f.child_by_field_name("name").map(|n| text(n, source)))
                .collect();
            put(metadata, "fields", fields);
        }
        "ordered_field_declaration_list" => {
            let arity = named_children(body)
                .into_iter()
                .filter(|f| !matches!(f.kind(), "visibility_modifier" | "attribute_item"))
                .count();
            put(metadata, "tuple_arity", arity);
        }
        _ => {}
    }
}

fn collect_imports(node: Node, chunk: &Chunk, imports: &mut Vec<ImportRelationship>) {
    match node.kind() {
        "use_declaration" => {
            if let Some(import) = use_import(node, chunk) {
                imports.push(import);
            }
            return;
        }
        "extern_crate_declaration" => {
            let name = node
                .child_by_field_name("name")
                .map(|n| chunk.text(n).to_string())
                .unwrap_or_default();
            let mut import = ImportRelationship::new(
                name,
                ImportKind::SideEffect,
                chunk.line_of(node.start_position()),
            );
            if let Some(alias) = node.child_by_field_name("alias") {
                import.imported_items.insert(chunk.text(alias).to_string());
            }
            imports.push(import);
            return;
        }
        _ => {}
    }
    for child in named_children(node) {
        collect_imports(child, chunk, imports);
    }
}

fn use_import(node: Node, chunk: &Chunk) -> Option<ImportRelationship> {
    let tree = node.child_by_field_name("argument")?;
    let line = chunk.line_of(node.start_position());

    let (from, items, kind) = match tree.kind() {
        "scoped_identifier" => {
            let path = tree
                .child_by_field_name("path")
                .map(|p| chunk.text(p).to_string())
                .unwrap_or_default();
            let name = tree
                .child_by_field_name("name")
                .map(|n| chunk.text(n).to_string())
                .unwrap_or_default();
            (path, vec![name], ImportKind::Named)
        }
        "use_as_clause" => {
            let path = tree.child_by_field_name("path")?;
            let alias = tree
                .child_by_field_name("alias")
                .map(|a| chunk.text(a))
                .unwrap_or_default();
            let (module, name) = match path.kind() {
                "scoped_identifier" => (
                    path.child_by_field_name("path")
                        .map(|p| chunk.text(p).to_string())
                        .unwrap_or_default(),
                    path.child_by_field_name("name")
                        .map(|n| chunk.text(n).to_string())
                        .unwrap_or_default(),
                ),
                _ => (chunk.text(path).to_string(), chunk.text(path).to_string()),
            };
            (module, vec![format!("{name} as {alias}")], ImportKind::Named)
        }
        "scoped_use_list" => {
            let path = tree
                .child_by_field_name("path")
                .map(|p| chunk.text(p).to_string())
                .unwrap_or_default();
            let items = tree
                .child_by_field_name("list")
                .map(|l| use_list_items(l, chunk))
                .unwrap_or_default();
            (path, items, ImportKind::Named)
        }
        "use_list" => (String::new(), use_list_items(tree, chunk), ImportKind::Named),
        "use_wildcard" => {
            let path = named_children(tree)
                .into_iter()
                .next()
                .map(|p| chunk.text(p).to_string())
                .unwrap_or_default();
            (path, vec!["*".to_string()], ImportKind::Namespace)
        }
        _ => {
            let name = chunk.text(tree).to_string();
            (name.clone(), vec![name], ImportKind::Namespace)
        }
    };
    Some(ImportRelationship::new(from, kind, line).with_items(items))
}

/// Items of a `{...}` use list, with nested paths and aliases kept as written.
fn use_list_items(list: Node, chunk: &Chunk) -> Vec<String> {
    named_children(list)
        .into_iter()
        .filter(|c| !c.is_extra())
        .map(|c| match c.kind() {
            "use_wildcard" if named_children(c).is_empty() => "*".to_string(),
            _ => chunk.text(c).split_whitespace().collect::<Vec<_>>().join(" "),
        })
        .collect()
}
