//! Parser module for nginx configuration files
//!
//! This module provides the lexer, syntax tree, and parser for the
//! block/directive grammar.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod report;

pub use ast::*;
pub use lexer::{tokenize, LexError, Location, Spanned, Token};
pub use parser::{parse, ParseError, Parser};
