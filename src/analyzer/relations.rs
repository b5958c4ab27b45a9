use tree_sitter::{Node, TreeCursor};

use super::{CallRelationship, Chunk, named_children};

/// How the callee of a call node is spelled in a grammar.
#[derive(Debug, Clone, Copy)]
pub enum Callee {
    /// The whole callee expression sits in one field.
    Field(&'static str),
    /// Receiver and method name live in separate fields; joined as `object.name`.
    Qualified {
        object: &'static str,
        name: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct CallSyntax {
    pub node_type: &'static str,
    pub callee: Callee,
    pub arguments_field: &'static str,
}

impl CallSyntax {
    pub const fn new(node_type: &'static str, callee: Callee) -> Self {
        Self {
            node_type,
            callee,
            arguments_field: "arguments",
        }
    }
}

const ARGUMENT_LIST_KINDS: &[&str] = &["arguments", "argument_list"];

/// Collects every call under `root` in source order. Callers are left empty.
pub fn scan_calls(root: Node, chunk: &Chunk, syntax: &[CallSyntax]) -> Vec<CallRelationship> {
    let mut calls = Vec::new();
    if syntax.is_empty() {
        return calls;
    }
    let mut cursor = root.walk();
    scan_recursive(&mut cursor, chunk, syntax, &mut calls);
    calls
}

fn scan_recursive(
    cursor: &mut TreeCursor,
    chunk: &Chunk,
    syntax: &[CallSyntax],
    calls: &mut Vec<CallRelationship>,
) {
    loop {
        let node = cursor.node();
        if node.is_named() {
            if let Some(rule) = syntax.iter().find(|s| s.node_type == node.kind()) {
                calls.push(build_call(node, rule, chunk));
            }
        }

        if cursor.goto_first_child() {
            scan_recursive(cursor, chunk, syntax, calls);
            cursor.goto_parent();
        }

        if !cursor.goto_next_sibling() {
            break;
        }
    }
}

fn build_call(node: Node, rule: &CallSyntax, chunk: &Chunk) -> CallRelationship {
    let field_text = |field: &str| {
        node.child_by_field_name(field)
            .map(|n| chunk.text(n).to_string())
    };

    let callee = match rule.callee {
        Callee::Field(field) => field_text(field).unwrap_or_default(),
        Callee::Qualified { object, name } => {
            let name = field_text(name).unwrap_or_default();
            match field_text(object) {
                Some(object) => format!("{object}.{name}"),
                None => name,
            }
        }
    };

    let arguments = node
        .child_by_field_name(rule.arguments_field)
        .map(|args| argument_texts(args, chunk))
        .unwrap_or_default();

    let position = node.start_position();
    CallRelationship {
        caller: String::new(),
        caller_qualified_name: String::new(),
        callee,
        arguments,
        line: chunk.line_of(position),
        column: position.column + 1,
        start_byte: node.start_byte(),
    }
}

fn argument_texts(args: Node, chunk: &Chunk) -> Vec<String> {
    if !ARGUMENT_LIST_KINDS.contains(&args.kind()) {
        return vec![chunk.text(args).to_string()];
    }
    named_children(args)
        .into_iter()
        .filter(|n| !n.is_extra())
        .map(|n| chunk.text(n).to_string())
        .collect()
}

/// First string-literal argument of a call, unquoted.
pub(crate) fn first_string_argument(call: Node, chunk: &Chunk) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    let first = named_children(args).into_iter().find(|n| !n.is_extra())?;
    first
        .kind()
        .contains("string")
        .then(|| super::unquote(chunk.text(first)).to_string())
}
