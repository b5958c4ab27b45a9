use std::collections::HashSet;

use tree_sitter::{Language, Node, Tree};

use super::{
    Analyzer, Parameter, SemanticEnricher, collect_strings, has_child_kind, put, put_list,
    put_parameters,
};
use crate::analyzer::classifier::{ContainerRule, Pattern, PatternTable, Unwrap};
use crate::analyzer::relations::{CallSyntax, Callee, first_string_argument};
use crate::analyzer::universal::{Extraction, UniversalExtractor};
use crate::analyzer::{
    Chunk, ElementType, EnrichError, ImportKind, ImportRelationship, Metadata, StructuralElement,
    named_children, walk_elements,
};

static PATTERNS: &[Pattern] = &[
    Pattern::new("function_definition", ElementType::Function),
    Pattern::new("class_definition", ElementType::Class),
    Pattern::new("assignment", ElementType::Variable)
        .named_by("left")
        .when_field("left", &["identifier"]),
];

static CONTAINERS: &[ContainerRule] =
    &[ContainerRule::new("decorated_definition", Unwrap::Field("definition"))];

static TABLE: PatternTable = PatternTable::new("python", PATTERNS, CONTAINERS);

static CALLS: &[CallSyntax] = &[CallSyntax::new("call", Callee::Field("function"))];

pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for PythonAnalyzer {
    fn language_name(&self) -> &str {
        "python"
    }

    fn extensions(&self) -> &[&str] {
        &["py", "pyi", "pyw"]
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

    fn extract_structure(&self, tree: &Tree, chunk: &Chunk) -> Extraction {
        let mut extraction = UniversalExtractor::new(&TABLE)
            .with_enricher(self.enricher())
            .extract(tree.root_node(), chunk);
        keep_first_bindings(&mut extraction.elements);
        extraction
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

        let decorators = collect_strings(elements.iter().copied(), "decorators");
        if !decorators.is_empty() {
            put(
                &mut metadata,
                "decorators",
                decorators.into_iter().collect::<Vec<_>>(),
            );
        }
        if elements.iter().any(|e| e.flag("is_async")) {
            put(&mut metadata, "has_async_functions", true);
        }
        if elements.iter().any(|e| e.metadata.contains_key("docstring")) {
            put(&mut metadata, "has_docstrings", true);
        }
        if elements.iter().any(|e| has_type_hints(e)) {
            put(&mut metadata, "has_type_hints", true);
        }
        if elements.iter().any(|e| is_test_element(e)) {
            put(&mut metadata, "has_tests", true);
        }
        if elements.iter().any(|e| e.element_type == ElementType::Class) {
            put(&mut metadata, "has_classes", true);
        }
        if elements.iter().any(|e| e.flag("is_property")) {
            put(&mut metadata, "has_properties", true);
        }
        if elements
            .iter()
            .any(|e| e.flag("is_static") || e.flag("is_classmethod"))
        {
            put(&mut metadata, "has_special_methods", true);
        }
        metadata
    }
}

impl SemanticEnricher for PythonAnalyzer {
    fn enrich(
        &self,
        element: &StructuralElement,
        node: Node,
        source: &str,
        metadata: &mut Metadata,
    ) -> Result<(), EnrichError> {
        put(metadata, "visibility", visibility(&element.name));
        match element.element_type {
            ElementType::Function => enrich_function(node, source, metadata)?,
            ElementType::Class => enrich_class(node, source, metadata),
            ElementType::Variable => {
                if let Some(ty) = node.child_by_field_name("type") {
                    put(metadata, "type", text(ty, source));
                }
                put(metadata, "is_constant", is_upper_snake_case(&element.name));
            }
            _ => {}
        }
        Ok(())
    }
}

/// A name rebound in the same scope is reported once, at its first assignment.
fn keep_first_bindings(elements: &mut Vec<StructuralElement>) {
    let mut bound = HashSet::new();
    elements.retain(|e| e.element_type != ElementType::Variable || bound.insert(e.name.clone()));
    for element in elements.iter_mut() {
        keep_first_bindings(&mut element.children);
    }
}

fn text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

fn visibility(name: &str) -> &'static str {
    if name.starts_with("__") && name.ends_with("__") && name.len() > 4 {
        "special"
    } else if name.starts_with('_') {
        "private"
    } else {
        "public"
    }
}

fn is_upper_snake_case(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn has_type_hints(element: &StructuralElement) -> bool {
    element.metadata.contains_key("return_type")
        || element
            .metadata
            .get("parameters")
            .and_then(|p| p.as_array())
            .is_some_and(|params| params.iter().any(|p| !p["type"].is_null()))
}

fn is_test_element(element: &StructuralElement) -> bool {
    match element.element_type {
        ElementType::Function => element.name.starts_with("test_"),
        ElementType::Class => element.name.starts_with("Test"),
        _ => false,
    }
}

fn decorators(node: Node, source: &str) -> Vec<String> {
    let Some(wrapper) = node.parent().filter(|p| p.kind() == "decorated_definition") else {
        return Vec::new();
    };
    named_children(wrapper)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .map(|c| text(c, source).trim_start_matches('@').trim().to_string())
        .collect()
}

/// The class a definition sits directly inside, looking past a decorator wrapper.
fn enclosing_class(node: Node) -> Option<Node> {
    let mut parent = node.parent()?;
    if parent.kind() == "decorated_definition" {
        parent = parent.parent()?;
    }
    let class = parent.parent()?;
    (parent.kind() == "block" && class.kind() == "class_definition").then_some(class)
}

fn get_docstring(node: Node, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let first_child = body.named_children(&mut cursor).next()?;
    if first_child.kind() != "expression_statement" {
        return None;
    }

    let mut inner_cursor = first_child.walk();
    let string_node = first_child.named_children(&mut inner_cursor).next()?;
    if string_node.kind() != "string" {
        return None;
    }

    let cleaned = strip_quotes(&text(string_node, source));
    (!cleaned.is_empty()).then_some(cleaned)
}

fn strip_quotes(s: &str) -> String {
    let s = s.trim().trim_start_matches(['r', 'u', 'R', 'U']);
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find(|q| s.len() >= 2 * q.len() && s.starts_with(*q) && s.ends_with(*q))
        .map(|q| &s[q.len()..s.len() - q.len()])
        .unwrap_or("");
    inner
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn enrich_function(node: Node, source: &str, metadata: &mut Metadata) -> Result<(), EnrichError> {
    let params = node
        .child_by_field_name("parameters")
        .ok_or(EnrichError::MissingField {
            node_type: "function_definition",
            field: "parameters",
        })?;
    put_parameters(metadata, &parameters(params, source));

    if let Some(ret) = node.child_by_field_name("return_type") {
        put(metadata, "return_type", text(ret, source));
    }
    if let Some(generics) = node.child_by_field_name("type_parameters") {
        put(metadata, "generics", text(generics, source));
    }
    if let Some(doc) = get_docstring(node, source) {
        put(metadata, "docstring", doc);
    }
    put(metadata, "is_async", has_child_kind(node, "async"));

    let decorators = decorators(node, source);
    let is_method = enclosing_class(node).is_some();
    put(metadata, "is_method", is_method);
    if is_method {
        let has = |name: &str| decorators.iter().any(|d| d == name);
        put(metadata, "is_static", has("staticmethod"));
        put(metadata, "is_classmethod", has("classmethod"));
        put(metadata, "is_property", has("property"));
    }
    put_list(metadata, "decorators", decorators);
    Ok(())
}

fn parameters(list: Node, source: &str) -> Vec<Parameter> {
    named_children(list)
        .into_iter()
        .filter_map(|p| {
            let field = |name: &str| p.child_by_field_name(name).map(|n| text(n, source));
            match p.kind() {
                "identifier" => Some(Parameter::named(text(p, source))),
                "typed_parameter" => {
                    let name = named_children(p)
                        .into_iter()
                        .find(|c| Some(c.id()) != p.child_by_field_name("type").map(|t| t.id()))
                        .map(|c| text(c, source))
                        .unwrap_or_default();
                    let optional = name.starts_with('*');
                    Some(Parameter {
                        name,
                        type_text: field("type"),
                        optional,
                        default: None,
                    })
                }
                "default_parameter" | "typed_default_parameter" => Some(Parameter {
                    name: field("name").unwrap_or_default(),
                    type_text: field("type"),
                    optional: true,
                    default: field("value"),
                }),
                "list_splat_pattern" | "dictionary_splat_pattern" => Some(Parameter {
                    optional: true,
                    ..Parameter::named(text(p, source))
                }),
                _ => None,
            }
        })
        .collect()
}

fn enrich_class(node: Node, source: &str, metadata: &mut Metadata) {
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut bases = Vec::new();
        let mut keywords = Vec::new();
        for arg in named_children(superclasses) {
            match arg.kind() {
                "keyword_argument" => keywords.push(text(arg, source)),
                "comment" => {}
                _ => bases.push(text(arg, source)),
            }
        }
        put_list(metadata, "bases", bases);
        put_list(metadata, "class_keywords", keywords);
    }
    if let Some(generics) = node.child_by_field_name("type_parameters") {
        put(metadata, "generics", text(generics, source));
    }
    if let Some(doc) = get_docstring(node, source) {
        put(metadata, "docstring", doc);
    }
    put_list(metadata, "decorators", decorators(node, source));
}

fn collect_imports(node: Node, chunk: &Chunk, imports: &mut Vec<ImportRelationship>) {
    let line = chunk.line_of(node.start_position());
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                let (module, item) = imported_name(name, chunk);
                imports.push(
                    ImportRelationship::new(module, ImportKind::Namespace, line).with_items([item]),
                );
            }
            return;
        }
        "import_from_statement" | "future_import_statement" => {
            let module = if node.kind() == "future_import_statement" {
                "__future__".to_string()
            } else {
                node.child_by_field_name("module_name")
                    .map(|m| chunk.text(m).to_string())
                    .unwrap_or_default()
            };
            let mut import = ImportRelationship::new(module, ImportKind::Named, line);
            if has_child_kind(node, "wildcard_import") {
                import.import_kind = ImportKind::Namespace;
                import.imported_items.insert("*".to_string());
            } else {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    let (_, item) = imported_name(name, chunk);
                    import.imported_items.insert(item);
                }
            }
            imports.push(import);
            return;
        }
        "call" => {
            if let Some(import) = dynamic_import(node, chunk) {
                imports.push(import);
            }
        }
        _ => {}
    }
    for child in named_children(node) {
        collect_imports(child, chunk, imports);
    }
}

/// Module path and the item label for `a.b` or `a.b as c`.
fn imported_name(node: Node, chunk: &Chunk) -> (String, String) {
    if node.kind() == "aliased_import" {
        let name = node
            .child_by_field_name("name")
            .map(|n| chunk.text(n).to_string())
            .unwrap_or_default();
        let alias = node
            .child_by_field_name("alias")
            .map(|n| chunk.text(n))
            .unwrap_or_default();
        let item = format!("{name} as {alias}");
        return (name, item);
    }
    let name = chunk.text(node).to_string();
    (name.clone(), name)
}

/// `importlib.import_module("x")` and `__import__("x")`.
fn dynamic_import(node: Node, chunk: &Chunk) -> Option<ImportRelationship> {
    let function = node.child_by_field_name("function")?;
    if !matches!(
        chunk.text(function),
        "importlib.import_module" | "import_module" | "__import__"
    ) {
        return None;
    }
    let module = first_string_argument(node, chunk)?;
    Some(ImportRelationship::new(
        module,
        ImportKind::Dynamic,
        chunk.line_of(node.start_position()),
    ))
}
