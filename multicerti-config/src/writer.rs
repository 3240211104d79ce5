//! Serializer for [`ConfigTree`](crate::ConfigTree)
//!
//! Output is normalized: four-space indentation, one statement per line,
//! single spaces between arguments, comments gone. Arguments that already
//! lex as a single token are written verbatim; anything else (spaces, `;`,
//! braces, stray quotes, empty strings) is wrapped in double quotes so the
//! written text always parses back to the same tree.

use crate::parser::ast::Node;
use crate::parser::lexer::tokenize;

const INDENT: &str = "    ";

/// Serialize a list of sibling nodes at the given depth
pub fn write_nodes(nodes: &[Node], depth: usize) -> String {
    let mut out = String::new();
    for node in nodes {
        push_node(&mut out, node, depth);
    }
    out
}

/// Serialize a single node at the given depth, trailing newline included.
///
/// `write_node(n, 0)` is exactly the text `n` produces as a top-level member
/// of a larger tree.
pub fn write_node(node: &Node, depth: usize) -> String {
    let mut out = String::new();
    push_node(&mut out, node, depth);
    out
}

fn push_node(out: &mut String, node: &Node, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    push_words(out, node.name(), node.args());

    match node {
        Node::Directive(_) => out.push_str(";\n"),
        Node::Block(block) => {
            out.push_str(" {\n");
            for child in &block.children {
                push_node(out, child, depth + 1);
            }
            for _ in 0..depth {
                out.push_str(INDENT);
            }
            out.push_str("}\n");
        }
    }
}

fn push_words(out: &mut String, name: &str, args: &[String]) {
    out.push_str(&quote(name));
    for arg in args {
        out.push(' ');
        out.push_str(&quote(arg));
    }
}

/// Return `word` unchanged if it is a single token, else a double-quoted form
pub fn quote(word: &str) -> String {
    if is_single_token(word) {
        return word.to_string();
    }
    let escaped = word.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn is_single_token(word: &str) -> bool {
    match tokenize(word).as_deref() {
        Ok([token]) => token.value.text() == Some(word),
        _ => false,
    }
}
