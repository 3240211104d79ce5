//! Multicerti Configuration Parser
//!
//! This crate reads and writes nginx configuration files and manages the
//! templates generated configurations are built from.
//!
//! # Example
//!
//! ```rust
//! use multicerti_config::{parse, Block, Directive};
//!
//! let mut tree = parse("http {\n    sendfile on;\n}\n").unwrap();
//! tree.block_mut("http")
//!     .unwrap()
//!     .push(Block::new("server").child(Directive::new("listen").arg("80")));
//!
//! assert_eq!(
//!     tree.to_string(),
//!     "http {\n    sendfile on;\n    server {\n        listen 80;\n    }\n}\n"
//! );
//! ```

pub mod parser;
pub mod template;
pub mod writer;

pub use parser::{
    parse, tokenize, Block, ConfigTree, Directive, LexError, Location, Node, ParseError, Token,
};
pub use template::{derive_template, Slot, SlotValues, Template, TemplateError};
pub use writer::quote;

use std::path::Path;

/// Errors from loading a template file
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: TemplateError,
    },
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Load a template file
pub fn load_template(path: impl AsRef<Path>) -> Result<Template, LoadError> {
    let path = path.as_ref();
    let source = read(path)?;
    Template::parse(&source).map_err(|source| LoadError::Template {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_template_missing_file() {
        let dir = std::env::temp_dir().join("multicerti-config-missing");
        let err = load_template(dir.join("nope.tpl")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
