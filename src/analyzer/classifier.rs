use tree_sitter::Node;

use super::{ElementType, Metadata, named_children};

/// Node kinds accepted as an element name when found in the name field.
pub const IDENTIFIER_KINDS: &[&str] = &[
    "identifier",
    "type_identifier",
    "property_identifier",
    "private_property_identifier",
    "field_identifier",
    "constant",
    "nested_identifier",
];

pub fn is_identifier_kind(kind: &str) -> bool {
    IDENTIFIER_KINDS.contains(&kind)
}

/// Extra condition a pattern puts on one of the node's fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldGuard {
    pub field: &'static str,
    pub kinds: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct Pattern {
    pub node_type: &'static str,
    pub category: ElementType,
    pub name_field: &'static str,
    pub guard: Option<FieldGuard>,
}

impl Pattern {
    pub const fn new(node_type: &'static str, category: ElementType) -> Self {
        Self {
            node_type,
            category,
            name_field: "name",
            guard: None,
        }
    }

    pub const fn named_by(self, field: &'static str) -> Self {
        Self {
            name_field: field,
            ..self
        }
    }

    /// Only match when `field` exists and its node kind is one of `kinds`.
    pub const fn when_field(self, field: &'static str, kinds: &'static [&'static str]) -> Self {
        Self {
            guard: Some(FieldGuard { field, kinds }),
            ..self
        }
    }

    pub fn matches(&self, node: Node) -> bool {
        if node.kind() != self.node_type {
            return false;
        }
        match self.guard {
            None => true,
            Some(guard) => node
                .child_by_field_name(guard.field)
                .is_some_and(|n| guard.kinds.contains(&n.kind())),
        }
    }
}

/// Records facts about a wrapper node onto the elements it wraps.
pub type FactsFn = fn(Node<'_>, &str, &mut Metadata);

/// Which children of a container carry the wrapped declarations.
#[derive(Debug, Clone, Copy)]
pub enum Unwrap {
    Field(&'static str),
    /// Whichever of these fields are present.
    Fields(&'static [&'static str]),
    Children(&'static [&'static str]),
    FirstNamed,
    /// Named children of `field` whose kind is in `kinds`.
    Body {
        field: &'static str,
        kinds: &'static [&'static str],
    },
}

/// A node that wraps declarations without being one itself.
#[derive(Clone, Copy)]
pub struct ContainerRule {
    pub node_type: &'static str,
    pub unwrap: Unwrap,
    pub facts: Option<FactsFn>,
}

impl std::fmt::Debug for ContainerRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerRule")
            .field("node_type", &self.node_type)
            .field("unwrap", &self.unwrap)
            .field("facts", &self.facts.is_some())
            .finish()
    }
}

impl ContainerRule {
    pub const fn new(node_type: &'static str, unwrap: Unwrap) -> Self {
        Self {
            node_type,
            unwrap,
            facts: None,
        }
    }

    pub const fn with_facts(self, facts: FactsFn) -> Self {
        Self {
            facts: Some(facts),
            ..self
        }
    }

    /// The wrapped nodes that inherit this container's facts.
    pub fn targets<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        match self.unwrap {
            Unwrap::Field(field) => node.child_by_field_name(field).into_iter().collect(),
            Unwrap::Fields(fields) => fields
                .iter()
                .filter_map(|f| node.child_by_field_name(*f))
                .collect(),
            Unwrap::Children(kinds) => named_children(node)
                .into_iter()
                .filter(|c| kinds.contains(&c.kind()))
                .collect(),
            Unwrap::FirstNamed => named_children(node)
                .into_iter()
                .find(|c| !c.is_extra())
                .into_iter()
                .collect(),
            Unwrap::Body { field, kinds } => node
                .child_by_field_name(field)
                .map(|body| {
                    named_children(body)
                        .into_iter()
                        .filter(|c| kinds.contains(&c.kind()))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// The intermediate node targets live under, for [`Unwrap::Body`] rules.
    pub fn body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        match self.unwrap {
            Unwrap::Body { field, .. } => node.child_by_field_name(field),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Classification {
    Element(Pattern),
    Container(ContainerRule),
    None,
}

/// Per-language node classification. Language patterns are consulted before the
/// universal ones, so a language can refine or shadow a universal node type.
#[derive(Debug)]
pub struct PatternTable {
    pub language: &'static str,
    pub patterns: &'static [Pattern],
    pub containers: &'static [ContainerRule],
    pub universal: bool,
}

impl PatternTable {
    pub const fn new(
        language: &'static str,
        patterns: &'static [Pattern],
        containers: &'static [ContainerRule],
    ) -> Self {
        Self {
            language,
            patterns,
            containers,
            universal: true,
        }
    }

    pub fn classify(&self, node: Node) -> Classification {
        if !node.is_named() {
            return Classification::None;
        }
        if let Some(rule) = self.container(node.kind()) {
            return Classification::Container(*rule);
        }
        let universal: &[Pattern] = if self.universal { UNIVERSAL_PATTERNS } else { &[] };
        self.patterns
            .iter()
            .chain(universal)
            .find(|p| p.matches(node))
            .map_or(Classification::None, |p| Classification::Element(*p))
    }

    pub fn container(&self, node_type: &str) -> Option<&ContainerRule> {
        self.containers.iter().find(|c| c.node_type == node_type)
    }
}

/// Node types with the same meaning across most grammars.
pub static UNIVERSAL_PATTERNS: &[Pattern] = &[
    // functions
    Pattern::new("function_declaration", ElementType::Function),
    Pattern::new("function_definition", ElementType::Function),
    Pattern::new("function_item", ElementType::Function),
    Pattern::new("method_declaration", ElementType::Function),
    Pattern::new("method_definition", ElementType::Function),
    // classes
    Pattern::new("class_declaration", ElementType::Class),
    Pattern::new("class_definition", ElementType::Class),
    Pattern::new("struct_item", ElementType::Class),
    Pattern::new("struct_declaration", ElementType::Class),
    Pattern::new("class_specifier", ElementType::Class),
    // interfaces
    Pattern::new("interface_declaration", ElementType::Interface),
    Pattern::new("trait_item", ElementType::Interface),
    Pattern::new("protocol_declaration", ElementType::Interface),
    // type aliases
    Pattern::new("type_alias_declaration", ElementType::TypeAlias),
    Pattern::new("type_item", ElementType::TypeAlias),
    Pattern::new("typedef_declaration", ElementType::TypeAlias),
    // enums
    Pattern::new("enum_declaration", ElementType::Enum),
    Pattern::new("enum_item", ElementType::Enum),
    Pattern::new("enum_specifier", ElementType::Enum),
    // variables
    Pattern::new("variable_declarator", ElementType::Variable),
    Pattern::new("const_item", ElementType::Variable),
    Pattern::new("static_item", ElementType::Variable),
    // namespaces
    Pattern::new("namespace_declaration", ElementType::Namespace),
    Pattern::new("module_declaration", ElementType::Namespace),
    Pattern::new("mod_item", ElementType::Namespace),
    Pattern::new("namespace_definition", ElementType::Namespace),
];

/// Table used when no language-specific analyzer exists.
pub static UNIVERSAL_TABLE: PatternTable = PatternTable::new("universal", &[], &[]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::test_support::parse;

    fn first_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        if node.kind() == kind {
            return Some(node);
        }
        named_children(node)
            .into_iter()
            .find_map(|c| first_of_kind(c, kind))
    }

    #[test]
    fn test_universal_classification() {
        let tree = parse(
            tree_sitter_python::LANGUAGE.into(),
            "class A:\n    def f(self):\n        pass\n",
        );
        let root = tree.root_node();
        let class = first_of_kind(root, "class_definition").unwrap();
        let func = first_of_kind(root, "function_definition").unwrap();

        assert!(matches!(
            UNIVERSAL_TABLE.classify(class),
            Classification::Element(Pattern { category: ElementType::Class, .. })
        ));
        assert!(matches!(
            UNIVERSAL_TABLE.classify(func),
            Classification::Element(Pattern { category: ElementType::Function, .. })
        ));
        assert!(matches!(UNIVERSAL_TABLE.classify(root), Classification::None));
    }

    #[test]
    fn test_guard_refines_category() {
        static PATTERNS: &[Pattern] = &[Pattern::new("variable_declarator", ElementType::Function)
            .when_field("value", &["arrow_function"])];
        static TABLE: PatternTable = PatternTable::new("test", PATTERNS, &[]);

        let tree = parse(
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            "const f = () => 1;\nconst x = 2;\n",
        );
        let root = tree.root_node();
        let declarators: Vec<Node> = named_children(root)
            .into_iter()
            .filter_map(|decl| first_of_kind(decl, "variable_declarator"))
            .collect();
        assert_eq!(declarators.len(), 2);

        let categories: Vec<ElementType> = declarators
            .iter()
            .map(|d| match TABLE.classify(*d) {
                Classification::Element(p) => p.category,
                _ => ElementType::Unknown,
            })
            .collect();
        assert_eq!(categories, vec![ElementType::Function, ElementType::Variable]);
    }

    #[test]
    fn test_containers_take_precedence() {
        static CONTAINERS: &[ContainerRule] =
            &[ContainerRule::new("function_definition", Unwrap::Field("body"))];
        static TABLE: PatternTable = PatternTable::new("test", &[], CONTAINERS);

        let tree = parse(tree_sitter_python::LANGUAGE.into(), "def f():\n    pass\n");
        let func = first_of_kind(tree.root_node(), "function_definition").unwrap();
        match TABLE.classify(func) {
            Classification::Container(rule) => {
                let targets = rule.targets(func);
                assert_eq!(targets.len(), 1);
                assert_eq!(targets[0].kind(), "block");
            }
            other => panic!("expected container, got {other:?}"),
        }
    }

    #[test]
    fn test_anonymous_nodes_never_classified() {
        let tree = parse(tree_sitter_python::LANGUAGE.into(), "class A:\n    pass\n");
        let class = first_of_kind(tree.root_node(), "class_definition").unwrap();
        let mut cursor = class.walk();
        let keyword = class
            .children(&mut cursor)
            .find(|c| !c.is_named())
            .unwrap();
        assert!(matches!(UNIVERSAL_TABLE.classify(keyword), Classification::None));
    }
}
