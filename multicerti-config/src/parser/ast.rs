//! Syntax tree for nginx configuration files
//!
//! The tree mirrors the grammar exactly:
//! - Directives (name + args, terminated by `;`)
//! - Blocks (name + args + ordered children)
//!
//! Sibling order is preserved everywhere. Arguments hold raw token text,
//! so a quoted argument keeps its quotes.

use std::fmt;

/// A single `name arg1 arg2;` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Directive name (e.g. "listen", "include", "proxy_pass")
    pub name: String,

    /// Arguments following the name
    pub args: Vec<String>,
}

/// A `name args { children }` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block name (e.g. "http", "server", "location")
    pub name: String,

    /// Arguments between the name and `{` (e.g. the `/` in `location /`)
    pub args: Vec<String>,

    /// Nested directives and blocks, in source order
    pub children: Vec<Node>,
}

/// A directive or a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Directive(Directive),
    Block(Block),
}

/// A whole configuration file: an ordered list of top-level nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    pub nodes: Vec<Node>,
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments joined with single spaces
    pub fn value(&self) -> String {
        self.args.join(" ")
    }
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn with_children<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        self.children.extend(nodes);
        self
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        self.children.push(node.into());
    }

    /// Direct child directives with the given name
    pub fn directives<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Directive> + 'a {
        self.children.iter().filter_map(move |node| match node {
            Node::Directive(d) if d.name == name => Some(d),
            _ => None,
        })
    }

    /// Direct child blocks with the given name
    pub fn blocks<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.children.iter().filter_map(move |node| match node {
            Node::Block(b) if b.name == name => Some(b),
            _ => None,
        })
    }
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Directive(d) => &d.name,
            Node::Block(b) => &b.name,
        }
    }

    pub fn args(&self) -> &[String] {
        match self {
            Node::Directive(d) => &d.args,
            Node::Block(b) => &b.args,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Node::Block(b) => Some(b),
            Node::Directive(_) => None,
        }
    }

    pub fn as_directive(&self) -> Option<&Directive> {
        match self {
            Node::Directive(d) => Some(d),
            Node::Block(_) => None,
        }
    }
}

impl From<Directive> for Node {
    fn from(directive: Directive) -> Self {
        Node::Directive(directive)
    }
}

impl From<Block> for Node {
    fn from(block: Block) -> Self {
        Node::Block(block)
    }
}

impl ConfigTree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// First top-level block with exactly this name and no arguments
    pub fn block(&self, name: &str) -> Option<&Block> {
        self.nodes.iter().find_map(|node| match node {
            Node::Block(b) if b.name == name && b.args.is_empty() => Some(b),
            _ => None,
        })
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Block> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Block(b) if b.name == name && b.args.is_empty() => Some(b),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl From<Vec<Node>> for ConfigTree {
    fn from(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

impl fmt::Display for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::writer::write_nodes(&self.nodes, 0))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::writer::write_node(self, 0))
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::writer::write_node(&Node::Directive(self.clone()), 0))
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::writer::write_node(&Node::Block(self.clone()), 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let block = Block::new("location")
            .arg("/")
            .child(Directive::new("root").arg("/var/www"))
            .child(Directive::new("autoindex").arg("off"));

        assert_eq!(block.args, vec!["/"]);
        assert_eq!(block.children.len(), 2);
        assert_eq!(block.directives("root").count(), 1);
        assert_eq!(block.children[1].name(), "autoindex");
    }

    #[test]
    fn test_tree_block_lookup_ignores_blocks_with_args() {
        let tree = ConfigTree::new(vec![
            Block::new("http").arg("x").into(),
            Block::new("http").child(Directive::new("sendfile").arg("on")).into(),
        ]);
        let http = tree.block("http").unwrap();
        assert_eq!(http.children.len(), 1);
    }
}
