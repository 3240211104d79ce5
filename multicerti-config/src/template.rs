//! Server configuration templates
//!
//! A template is ordinary nginx configuration text holding two markers,
//! `%(upstreams)s` and `%(servers)s`, each exactly once and each as a direct
//! statement of the top-level `http` block. Loading a template splits it into
//! literal text and typed slots, so filling it never interprets anything
//! else (a literal `%` in the template or in generated text stays literal).

use crate::parser::ast::{Block, Directive, Node};
use crate::parser::{parse, ParseError};
use crate::writer::{write_node, write_nodes};
use std::fmt;
use thiserror::Error;

/// Template errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Placeholder {0} is missing from the template")]
    MissingSlot(Slot),

    #[error("Placeholder {0} appears more than once in the template")]
    DuplicateSlot(Slot),

    #[error("Placeholder {0} must sit directly inside the top-level http block")]
    MisplacedSlot(Slot),

    #[error("Template is not valid configuration: {0}")]
    Syntax(#[from] ParseError),
}

/// Named insertion points of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Upstreams,
    Servers,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Upstreams, Slot::Servers];

    /// Marker text as written in template files
    pub fn marker(self) -> &'static str {
        match self {
            Slot::Upstreams => "%(upstreams)s",
            Slot::Servers => "%(servers)s",
        }
    }

    /// Stand-in directive name used to check where a marker sits
    fn probe(self) -> &'static str {
        match self {
            Slot::Upstreams => "__multicerti_upstreams_slot__",
            Slot::Servers => "__multicerti_servers_slot__",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Slot),
}

/// A loaded template: literal text interleaved with the two slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// Generated text for each slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotValues {
    pub upstreams: String,
    pub servers: String,
}

impl SlotValues {
    fn get(&self, slot: Slot) -> &str {
        match slot {
            Slot::Upstreams => &self.upstreams,
            Slot::Servers => &self.servers,
        }
    }
}

impl Template {
    /// Split template text into literal text and slots, then check placement
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;

        loop {
            let next = Slot::ALL
                .iter()
                .filter_map(|slot| rest.find(slot.marker()).map(|at| (at, *slot)))
                .min_by_key(|(at, _)| *at);

            match next {
                Some((at, slot)) => {
                    if at > 0 {
                        segments.push(Segment::Text(rest[..at].to_string()));
                    }
                    segments.push(Segment::Slot(slot));
                    rest = &rest[at + slot.marker().len()..];
                }
                None => {
                    if !rest.is_empty() {
                        segments.push(Segment::Text(rest.to_string()));
                    }
                    break;
                }
            }
        }

        for slot in Slot::ALL {
            match segments.iter().filter(|s| **s == Segment::Slot(slot)).count() {
                0 => return Err(TemplateError::MissingSlot(slot)),
                1 => {}
                _ => return Err(TemplateError::DuplicateSlot(slot)),
            }
        }

        let template = Self { segments };
        template.check_placement()?;
        Ok(template)
    }

    /// Substitute a probe directive for each slot and verify the result parses
    /// with both probes as direct children of the top-level `http` block.
    fn check_placement(&self) -> Result<(), TemplateError> {
        let probed = self.render_with(|slot| format!("{};", slot.probe()));
        let tree = parse(&probed)?;

        for slot in Slot::ALL {
            let in_http = tree
                .block("http")
                .is_some_and(|http| http.directives(slot.probe()).next().is_some());
            if !in_http {
                return Err(TemplateError::MisplacedSlot(slot));
            }
        }
        Ok(())
    }

    /// Fill both slots, producing raw configuration text
    pub fn fill(&self, values: &SlotValues) -> String {
        self.render_with(|slot| values.get(slot).to_string())
    }

    fn render_with(&self, mut value: impl FnMut(Slot) -> String) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(slot) => out.push_str(&value(*slot)),
            }
        }
        out
    }
}

// ============================================================
// Template derivation
// ============================================================

/// Directives the generated configuration sets itself
const OWNED_DIRECTIVES: [&str; 2] = ["server_tokens", "proxy_next_upstream"];

/// Blocks superseded by the generated virtual hosts
const SUPERSEDED_BLOCKS: [&str; 2] = ["server", "upstream"];

/// Include targets the generated configuration replaces
const MANAGED_INCLUDES: [&str; 2] = ["sites-enabled", "sites-available"];

/// Whether a direct child of `http` survives into the template
fn keep_in_template(node: &Node) -> bool {
    match node {
        Node::Directive(d) if OWNED_DIRECTIVES.contains(&d.name.as_str()) => false,
        Node::Directive(d) if d.name == "include" => !MANAGED_INCLUDES
            .iter()
            .any(|managed| d.args.iter().any(|arg| arg.contains(managed))),
        Node::Block(b) => !SUPERSEDED_BLOCKS.contains(&b.name.as_str()),
        Node::Directive(_) => true,
    }
}

/// Catch-all server answering 404 for unmatched names on port 80
fn default_server() -> Node {
    Block::new("server")
        .child(Directive::new("listen").arg("80").arg("default_server"))
        .child(Directive::new("server_name").arg("_"))
        .child(
            Block::new("location")
                .arg("/")
                .child(Directive::new("return").arg("404")),
        )
        .into()
}

/// Derive a template from an installed configuration.
///
/// Returns `Ok(None)` when the configuration has no top-level `http` block.
/// Managed sections are filtered out of every `http` block, but the fixed
/// directives and the two slots only go into the first one, since each slot
/// may appear once. Top-level nodes outside `http` are passed through
/// unchanged.
pub fn derive_template(installed: &str) -> Result<Option<String>, ParseError> {
    let tree = parse(installed)?;
    if tree.block("http").is_none() {
        tracing::debug!("No http block in installed configuration, nothing to derive");
        return Ok(None);
    }

    let mut out = String::new();
    let mut slotted = false;

    for node in &tree.nodes {
        match node {
            Node::Block(http) if http.name == "http" && http.args.is_empty() => {
                out.push_str(&derive_http_block(http, !slotted));
                slotted = true;
            }
            _ => out.push_str(&write_node(node, 0)),
        }
    }

    Ok(Some(out))
}

fn derive_http_block(http: &Block, with_slots: bool) -> String {
    let kept: Vec<Node> = http
        .children
        .iter()
        .filter(|node| {
            let keep = keep_in_template(node);
            if !keep {
                tracing::debug!("Dropping '{}' from derived template", node.name());
            }
            keep
        })
        .cloned()
        .collect();

    let mut out = String::from("http {\n");
    out.push_str(&write_nodes(&kept, 1));
    if with_slots {
        let fixed = [
            Node::from(Directive::new("server_tokens").arg("off")),
            Node::from(Directive::new("proxy_next_upstream").arg("error")),
        ];
        out.push_str(&write_nodes(&fixed, 1));
        out.push('\n');
        out.push_str(&format!("    {}\n\n", Slot::Upstreams.marker()));
        out.push_str(&write_node(&default_server(), 1));
        out.push('\n');
        out.push_str(&format!("    {}\n", Slot::Servers.marker()));
    }
    out.push_str("}\n");
    out
}
