use tree_sitter::{Language, Node, Tree};

use super::{
    Analyzer, Parameter, SemanticEnricher, annotation_type, collect_strings, has_child_kind, put,
    put_list, put_parameters, tree_contains,
};
use crate::analyzer::classifier::{ContainerRule, Pattern, PatternTable, Unwrap};
use crate::analyzer::relations::{CallSyntax, Callee, first_string_argument};
use crate::analyzer::{
    Chunk, ElementType, EnrichError, ImportKind, ImportRelationship, Metadata, StructuralElement,
    named_children, unquote, walk_elements,
};

const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

static PATTERNS: &[Pattern] = &[
    Pattern::new("function_declaration", ElementType::Function),
    Pattern::new("generator_function_declaration", ElementType::Function),
    Pattern::new("function_signature", ElementType::Function),
    Pattern::new("method_definition", ElementType::Function),
    Pattern::new("method_signature", ElementType::Function),
    Pattern::new("abstract_method_signature", ElementType::Function),
    Pattern::new("variable_declarator", ElementType::Function).when_field("value", FUNCTION_VALUES),
    Pattern::new("public_field_definition", ElementType::Function)
        .when_field("value", FUNCTION_VALUES),
    Pattern::new("variable_declarator", ElementType::Variable),
    Pattern::new("public_field_definition", ElementType::Variable),
    Pattern::new("class_declaration", ElementType::Class),
    Pattern::new("abstract_class_declaration", ElementType::Class),
    Pattern::new("class", ElementType::Class),
    Pattern::new("interface_declaration", ElementType::Interface),
    Pattern::new("type_alias_declaration", ElementType::TypeAlias),
    Pattern::new("enum_declaration", ElementType::Enum),
    Pattern::new("internal_module", ElementType::Namespace),
    Pattern::new("module", ElementType::Namespace),
];

static CONTAINERS: &[ContainerRule] = &[
    ContainerRule::new("export_statement", Unwrap::Fields(&["declaration", "value"]))
        .with_facts(export_facts),
    ContainerRule::new("lexical_declaration", Unwrap::Children(&["variable_declarator"]))
        .with_facts(declaration_facts),
    ContainerRule::new("variable_declaration", Unwrap::Children(&["variable_declarator"]))
        .with_facts(declaration_facts),
    ContainerRule::new("ambient_declaration", Unwrap::FirstNamed).with_facts(ambient_facts),
];

static TABLE: PatternTable = PatternTable::new("typescript", PATTERNS, CONTAINERS);

static CALLS: &[CallSyntax] = &[
    CallSyntax::new("call_expression", Callee::Field("function")),
    CallSyntax::new("new_expression", Callee::Field("constructor")),
];

fn export_facts(node: Node, _source: &str, metadata: &mut Metadata) {
    put(metadata, "is_exported", true);
    if has_child_kind(node, "default") {
        put(metadata, "is_default_export", true);
    }
}

fn declaration_facts(node: Node, source: &str, metadata: &mut Metadata) {
    let mut cursor = node.walk();
    let keyword = node
        .child_by_field_name("kind")
        .or_else(|| node.children(&mut cursor).next())
        .map(|n| text(n, source))
        .unwrap_or_default();
    if !keyword.is_empty() {
        put(metadata, "declaration_kind", keyword);
    }
}

fn ambient_facts(_node: Node, _source: &str, metadata: &mut Metadata) {
    put(metadata, "is_ambient", true);
}

/// TypeScript and JavaScript, including JSX via the TSX grammar.
pub struct TypeScriptAnalyzer {
    typescript: Language,
    tsx: Language,
}

impl TypeScriptAnalyzer {
    pub fn new() -> Self {
        Self {
            typescript: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

impl Default for TypeScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for TypeScriptAnalyzer {
    fn language_name(&self) -> &str {
        "typescript"
    }

    fn extensions(&self) -> &[&str] {
        &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"]
    }

    fn grammar(&self, extension: &str) -> Option<Language> {
        // Plain JavaScript may carry JSX, which only the TSX grammar accepts.
        match extension {
            "tsx" | "jsx" | "js" | "mjs" | "cjs" => Some(self.tsx.clone()),
            _ => Some(self.typescript.clone()),
        }
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
        tree: &Tree,
        chunk: &Chunk,
        structure: &[StructuralElement],
    ) -> Metadata {
        let mut metadata = Metadata::new();
        let elements: Vec<&StructuralElement> = walk_elements(structure).collect();
        let functions = || {
            elements
                .iter()
                .filter(|e| e.element_type == ElementType::Function)
        };
        let has_type = |t: ElementType| elements.iter().any(|e| e.element_type == t);

        if functions().any(|e| e.flag("is_async")) {
            put(&mut metadata, "has_async_functions", true);
        }
        if functions().any(|e| e.flag("is_exported")) {
            put(&mut metadata, "has_exported_functions", true);
        }
        if has_type(ElementType::Interface) {
            put(&mut metadata, "has_interfaces", true);
        }
        if has_type(ElementType::TypeAlias) {
            put(&mut metadata, "has_type_aliases", true);
        }
        if has_type(ElementType::Enum) {
            put(&mut metadata, "has_enums", true);
        }
        if is_test_file(chunk.filename) {
            put(&mut metadata, "is_test_file", true);
        }
        if functions().next().is_some()
            && tree_contains(
                tree.root_node(),
                &["jsx_element", "jsx_self_closing_element"],
            )
        {
            put(&mut metadata, "is_react_component", true);
        }
        let decorators = collect_strings(elements.iter().copied(), "decorators");
        if !decorators.is_empty() {
            put(
                &mut metadata,
                "decorators",
                decorators.into_iter().collect::<Vec<_>>(),
            );
        }
        metadata
    }
}

impl SemanticEnricher for TypeScriptAnalyzer {
    fn enrich(
        &self,
        element: &StructuralElement,
        node: Node,
        source: &str,
        metadata: &mut Metadata,
    ) -> Result<(), EnrichError> {
        metadata
            .entry("is_exported".to_string())
            .or_insert(serde_json::Value::Bool(false));
        if let Some(doc) = get_doc_comment(node, source) {
            put(metadata, "docstring", doc);
        }

        match element.element_type {
            ElementType::Function => enrich_function(node, source, metadata),
            ElementType::Class => {
                enrich_class(node, source, metadata);
                Ok(())
            }
            ElementType::Interface => {
                enrich_interface(node, source, metadata);
                Ok(())
            }
            ElementType::Enum => {
                enrich_enum(node, source, metadata);
                Ok(())
            }
            ElementType::TypeAlias => {
                generics(node, source, metadata);
                if let Some(value) = node.child_by_field_name("value") {
                    put(metadata, "aliased_type", text(value, source));
                }
                Ok(())
            }
            ElementType::Variable => {
                enrich_variable(node, source, metadata);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

fn is_test_file(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    lower.contains(".test.") || lower.contains(".spec.") || lower.contains("__tests__")
}

/// JSDoc block directly above the declaration, looking past export and
/// declaration wrappers and any decorators.
fn get_doc_comment(node: Node, source: &str) -> Option<String> {
    let mut anchor = node;
    while let Some(parent) = anchor.parent() {
        match parent.kind() {
            "export_statement" | "lexical_declaration" | "variable_declaration"
            | "ambient_declaration" => anchor = parent,
            _ => break,
        }
    }

    let mut prev = anchor.prev_sibling();
    while let Some(p) = prev.filter(|p| p.kind() == "decorator") {
        prev = p.prev_sibling();
    }

    let comment = prev.filter(|p| p.kind() == "comment")?;
    let t = text(comment, source);
    if !t.starts_with("/**") {
        return None;
    }
    let cleaned = t
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// The node holding parameters and return type: the initializer for
/// `const f = () => ...` and class fields, otherwise the node itself.
fn callable(node: Node) -> Node {
    match node.kind() {
        "variable_declarator" | "public_field_definition" => {
            node.child_by_field_name("value").unwrap_or(node)
        }
        _ => node,
    }
}

fn enrich_function(node: Node, source: &str, metadata: &mut Metadata) -> Result<(), EnrichError> {
    let func = callable(node);

    let params = match (
        func.child_by_field_name("parameters"),
        func.child_by_field_name("parameter"),
    ) {
        (Some(list), _) => parameters(list, source),
        (None, Some(single)) => vec![Parameter::named(text(single, source))],
        (None, None) => {
            return Err(EnrichError::MissingField {
                node_type: func.kind(),
                field: "parameters",
            });
        }
    };
    put_parameters(metadata, &params);

    if let Some(ret) = func.child_by_field_name("return_type") {
        put(metadata, "return_type", annotation_type(&text(ret, source)));
    }
    generics(func, source, metadata);

    put(metadata, "is_async", has_child_kind(func, "async"));
    put(
        metadata,
        "is_generator",
        func.kind().starts_with("generator") || has_child_kind(func, "*"),
    );
    put(metadata, "is_arrow_function", func.kind() == "arrow_function");

    let is_method = matches!(
        node.kind(),
        "method_definition" | "method_signature" | "abstract_method_signature"
    ) || node.kind() == "public_field_definition";
    put(metadata, "is_method", is_method);
    if is_method {
        member_modifiers(node, source, metadata);
        if has_child_kind(node, "get") {
            put(metadata, "accessor", "get");
        } else if has_child_kind(node, "set") {
            put(metadata, "accessor", "set");
        }
    }
    Ok(())
}

fn parameters(list: Node, source: &str) -> Vec<Parameter> {
    named_children(list)
        .into_iter()
        .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
        .map(|p| {
            let name = p
                .child_by_field_name("pattern")
                .map(|n| text(n, source))
                .unwrap_or_else(|| text(p, source));
            Parameter {
                name,
                type_text: p
                    .child_by_field_name("type")
                    .map(|t| annotation_type(&text(t, source))),
                optional: p.kind() == "optional_parameter",
                default: p.child_by_field_name("value").map(|v| text(v, source)),
            }
        })
        .collect()
}

/// Visibility, `static`, `readonly`, `abstract`, and decorators of a class member.
fn member_modifiers(node: Node, source: &str, metadata: &mut Metadata) {
    let mut cursor = node.walk();
    let visibility = node
        .children(&mut cursor)
        .find(|c| c.kind() == "accessibility_modifier")
        .map(|c| text(c, source))
        .unwrap_or_else(|| "public".to_string());
    put(metadata, "visibility", visibility);
    put(metadata, "is_static", has_child_kind(node, "static"));
    if has_child_kind(node, "readonly") {
        put(metadata, "is_readonly", true);
    }
    if has_child_kind(node, "abstract") || node.kind() == "abstract_method_signature" {
        put(metadata, "is_abstract", true);
    }

    let mut decorators = own_decorators(node, source);
    let mut prev = node.prev_named_sibling();
    while let Some(p) = prev.filter(|p| p.kind() == "decorator") {
        decorators.insert(0, decorator_name(p, source));
        prev = p.prev_named_sibling();
    }
    put_list(metadata, "decorators", decorators);
}

fn own_decorators(node: Node, source: &str) -> Vec<String> {
    named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .map(|c| decorator_name(c, source))
        .collect()
}

fn decorator_name(node: Node, source: &str) -> String {
    text(node, source).trim_start_matches('@').trim().to_string()
}

fn generics(node: Node, source: &str, metadata: &mut Metadata) {
    if let Some(params) = node.child_by_field_name("type_parameters") {
        put(metadata, "generics", text(params, source));
    }
}

fn enrich_class(node: Node, source: &str, metadata: &mut Metadata) {
    generics(node, source, metadata);
    put(
        metadata,
        "is_abstract",
        node.kind() == "abstract_class_declaration",
    );

    let mut decorators = own_decorators(node, source);
    if let Some(parent) = node.parent().filter(|p| p.kind() == "export_statement") {
        decorators.extend(own_decorators(parent, source));
    }
    put_list(metadata, "decorators", decorators);

    let Some(heritage) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "class_heritage")
    else {
        return;
    };
    for clause in named_children(heritage) {
        match clause.kind() {
            "extends_clause" => {
                let mut cursor = clause.walk();
                let bases: Vec<String> = clause
                    .children_by_field_name("value", &mut cursor)
                    .map(|n| text(n, source))
                    .collect();
                put_list(metadata, "extends", bases);
            }
            "implements_clause" => {
                let types: Vec<String> = named_children(clause)
                    .into_iter()
                    .map(|n| text(n, source))
                    .collect();
                put_list(metadata, "implements", types);
            }
            _ => {}
        }
    }
}

fn enrich_interface(node: Node, source: &str, metadata: &mut Metadata) {
    generics(node, source, metadata);
    if let Some(clause) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "extends_type_clause")
    {
        let bases: Vec<String> = named_children(clause)
            .into_iter()
            .map(|n| text(n, source))
            .collect();
        put_list(metadata, "extends", bases);
    }
    if let Some(body) = node.child_by_field_name("body") {
        let members = named_children(body)
            .into_iter()
            .filter(|c| c.kind() != "comment")
            .count();
        put(metadata, "member_count", members);
    }
}

fn enrich_enum(node: Node, source: &str, metadata: &mut Metadata) {
    put(metadata, "is_const", has_child_kind(node, "const"));
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let members: Vec<String> = named_children(body)
        .into_iter()
        .filter_map(|m| match m.kind() {
            "enum_assignment" => m.child_by_field_name("name").map(|n| text(n, source)),
            "property_identifier" => Some(text(m, source)),
            "string" => Some(unquote(&text(m, source)).to_string()),
            _ => None,
        })
        .collect();
    put(metadata, "members", members);
}

fn enrich_variable(node: Node, source: &str, metadata: &mut Metadata) {
    if let Some(ty) = node.child_by_field_name("type") {
        put(metadata, "type", annotation_type(&text(ty, source)));
    }
    if let Some(value) = node.child_by_field_name("value") {
        put(metadata, "value_kind", value.kind());
    }
    if node.kind() == "public_field_definition" {
        member_modifiers(node, source, metadata);
    }
}

fn collect_imports(node: Node, chunk: &Chunk, imports: &mut Vec<ImportRelationship>) {
    match node.kind() {
        "import_statement" => {
            imports.push(static_import(node, chunk));
            return;
        }
        "export_statement" => {
            if let Some(import) = re_export(node, chunk) {
                imports.push(import);
                return;
            }
        }
        "call_expression" => {
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

fn line(node: Node, chunk: &Chunk) -> usize {
    chunk.line_of(node.start_position())
}

fn static_import(node: Node, chunk: &Chunk) -> ImportRelationship {
    let require_clause = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "import_require_clause");
    let source_node = node
        .child_by_field_name("source")
        .or_else(|| require_clause.and_then(|c| c.child_by_field_name("source")));
    let from = source_node
        .map(|s| unquote(chunk.text(s)).to_string())
        .unwrap_or_default();
    let line = line(node, chunk);

    if let Some(clause) = require_clause {
        let alias = named_children(clause)
            .into_iter()
            .find(|c| c.kind() == "identifier")
            .map(|c| chunk.text(c).to_string());
        return ImportRelationship::new(from, ImportKind::Default, line).with_items(alias);
    }

    let Some(clause) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "import_clause")
    else {
        return ImportRelationship::new(from, ImportKind::SideEffect, line);
    };

    let mut kind = ImportKind::Default;
    let mut items = Vec::new();
    let mut has_default = false;
    let mut has_named = false;
    for part in named_children(clause) {
        match part.kind() {
            "identifier" => {
                has_default = true;
                items.push(chunk.text(part).to_string());
            }
            "namespace_import" => {
                kind = ImportKind::Namespace;
                let alias = named_children(part)
                    .into_iter()
                    .find(|c| c.kind() == "identifier")
                    .map(|c| chunk.text(c).to_string())
                    .unwrap_or_default();
                items.push(format!("* as {alias}"));
            }
            "named_imports" => {
                has_named = true;
                items.extend(specifiers(part, "import_specifier", chunk));
            }
            _ => {}
        }
    }
    if kind != ImportKind::Namespace {
        kind = if has_named || !has_default {
            ImportKind::Named
        } else {
            ImportKind::Default
        };
    }
    ImportRelationship::new(from, kind, line).with_items(items)
}

/// `name` or `name as alias` for each specifier of an import or export list.
fn specifiers(list: Node, kind: &str, chunk: &Chunk) -> Vec<String> {
    named_children(list)
        .into_iter()
        .filter(|s| s.kind() == kind)
        .filter_map(|s| {
            let name = chunk.text(s.child_by_field_name("name")?).to_string();
            Some(match s.child_by_field_name("alias") {
                Some(alias) => format!("{name} as {}", chunk.text(alias)),
                None => name,
            })
        })
        .collect()
}

/// `export ... from "module"`. Plain exports yield nothing.
fn re_export(node: Node, chunk: &Chunk) -> Option<ImportRelationship> {
    let source = node.child_by_field_name("source")?;
    let from = unquote(chunk.text(source)).to_string();
    let line = line(node, chunk);

    if let Some(clause) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "export_clause")
    {
        let items = specifiers(clause, "export_specifier", chunk);
        return Some(ImportRelationship::new(from, ImportKind::Named, line).with_items(items));
    }

    let item = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "namespace_export")
        .map(|ns| {
            let alias = named_children(ns)
                .into_iter()
                .next()
                .map(|a| chunk.text(a).to_string())
                .unwrap_or_default();
            format!("* as {alias}")
        })
        .unwrap_or_else(|| "*".to_string());
    Some(ImportRelationship::new(from, ImportKind::Namespace, line).with_items([item]))
}

/// `import("x")` and `require("x")`.
fn dynamic_import(node: Node, chunk: &Chunk) -> Option<ImportRelationship> {
    let function = node.child_by_field_name("function")?;
    let is_loader = function.kind() == "import"
        || (function.kind() == "identifier" && chunk.text(function) == "require");
    if !is_loader {
        return None;
    }
    let from = first_string_argument(node, chunk)?;

    let mut items = Vec::new();
    let mut target = node.parent();
    while let Some(t) = target.filter(|t| t.kind() == "await_expression") {
        target = t.parent();
    }
    if let Some(name) = target
        .filter(|t| t.kind() == "variable_declarator")
        .and_then(|t| t.child_by_field_name("name"))
    {
        match name.kind() {
            "identifier" => items.push(chunk.text(name).to_string()),
            "object_pattern" => items.extend(
                named_children(name)
                    .into_iter()
                    .map(|p| chunk.text(p).to_string()),
            ),
            _ => {}
        }
    }
    Some(ImportRelationship::new(from, ImportKind::Dynamic, line(node, chunk)).with_items(items))
}
