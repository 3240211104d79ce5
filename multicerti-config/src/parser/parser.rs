//! nginx configuration parser
//!
//! Recursive descent parser that converts tokens into a [`ConfigTree`].

use crate::parser::ast::*;
use crate::parser::lexer::{tokenize, LexError, Location, Spanned, Token};
use thiserror::Error;

/// Parser error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Lexer error: {0}")]
    Lex(#[from] LexError),

    #[error("Unexpected token at position {position}: expected {expected}, found {found}")]
    UnexpectedToken {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of input at position {position}, expected {expected}")]
    UnexpectedEof { position: usize, expected: String },

    #[error("Directive '{name}' at position {position} is missing ';' or '{{', found {found}")]
    Unterminated {
        position: usize,
        name: String,
        found: String,
    },
}

impl ParseError {
    /// Byte offset the error points at
    pub fn position(&self) -> usize {
        match self {
            ParseError::Lex(e) => e.position(),
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedEof { position, .. }
            | ParseError::Unterminated { position, .. } => *position,
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Parser state
pub struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    /// Create a new parser from source code
    pub fn new(source: &str) -> ParseResult<Self> {
        let tokens = tokenize(source)?;
        Ok(Self {
            tokens,
            pos: 0,
            source_len: source.len(),
        })
    }

    /// Parse the whole file
    pub fn parse(&mut self) -> ParseResult<ConfigTree> {
        let nodes = self.parse_nodes(false)?;
        Ok(ConfigTree::new(nodes))
    }

    /// Parse sibling nodes until EOF (top level) or the closing brace (inside a block)
    fn parse_nodes(&mut self, nested: bool) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();

        loop {
            match self.peek() {
                None if nested => {
                    return Err(ParseError::UnexpectedEof {
                        position: self.source_len,
                        expected: "'}'".to_string(),
                    });
                }
                None => break,
                Some(Token::BlockClose) if nested => {
                    self.advance();
                    break;
                }
                Some(Token::Word(_)) | Some(Token::Quoted(_)) => {
                    nodes.push(self.parse_node()?);
                }
                Some(tok) => {
                    return Err(ParseError::UnexpectedToken {
                        position: self.current_span().start,
                        expected: "directive or block name".to_string(),
                        found: tok.to_string(),
                    });
                }
            }
        }

        Ok(nodes)
    }

    /// name args... followed by `;` (directive) or `{` (block)
    fn parse_node(&mut self) -> ParseResult<Node> {
        let start = self.current_span().start;
        let mut words = Vec::new();
        while let Some(text) = self.peek().and_then(Token::text) {
            words.push(text.to_string());
            self.advance();
        }

        let name = words.remove(0);
        match self.peek() {
            Some(Token::Semicolon) => {
                self.advance();
                Ok(Node::Directive(Directive { name, args: words }))
            }
            Some(Token::BlockOpen) => {
                self.advance();
                let children = self.parse_nodes(true)?;
                Ok(Node::Block(Block {
                    name,
                    args: words,
                    children,
                }))
            }
            // Points at the directive itself, not at whatever follows it
            Some(tok) => Err(ParseError::Unterminated {
                position: start,
                name,
                found: tok.to_string(),
            }),
            None => Err(ParseError::Unterminated {
                position: start,
                name,
                found: "end of input".to_string(),
            }),
        }
    }

    // ========================================
    // Token utilities
    // ========================================

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.value)
    }

    fn advance(&mut self) -> Option<Token> {
        if self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].value.clone();
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    fn current_span(&self) -> Location {
        self.tokens.get(self.pos).map(|s| s.span).unwrap_or(Location {
            start: self.source_len,
            end: self.source_len,
        })
    }
}

/// Parse an nginx configuration source string into a tree
pub fn parse(source: &str) -> ParseResult<ConfigTree> {
    let mut parser = Parser::new(source)?;
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let tree = parse("").unwrap();
        assert!(tree.is_empty());

        let tree = parse("  # only a comment\n").unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_parse_directives_and_blocks() {
        let tree = parse(
            r#"
            user www-data;
            events {
                worker_connections 768;
            }
            http {
                include /etc/nginx/mime.types;
                server {
                    listen 80 default_server;
                    location / {
                        return 404;
                    }
                }
            }
        "#,
        )
        .unwrap();

        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.nodes[0], Node::Directive(Directive::new("user").arg("www-data")));

        let http = tree.block("http").unwrap();
        assert_eq!(http.children.len(), 2);
        let server = http.blocks("server").next().unwrap();
        assert_eq!(
            server.directives("listen").next().unwrap().args,
            vec!["80", "default_server"]
        );
        let location = server.blocks("location").next().unwrap();
        assert_eq!(location.args, vec!["/"]);
    }

    #[test]
    fn test_parse_keeps_quotes_verbatim() {
        let tree = parse(r#"log_format main '$remote_addr "$request"';"#).unwrap();
        let directive = tree.nodes[0].as_directive().unwrap();
        assert_eq!(directive.args[1], r#"'$remote_addr "$request"'"#);
    }

    #[test]
    fn test_parse_empty_block() {
        let tree = parse("events {}").unwrap();
        let events = tree.block("events").unwrap();
        assert!(events.children.is_empty());
    }

    #[test]
    fn test_unclosed_block() {
        let source = "http {\n    sendfile on;\n";
        let err = parse(source).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
        assert_eq!(err.position(), source.len());
    }

    #[test]
    fn test_unbalanced_close() {
        let err = parse("sendfile on;\n}\n").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 13, .. }));
    }

    #[test]
    fn test_unterminated_directive() {
        let err = parse("http {\n    sendfile on\n}").unwrap_err();
        assert_eq!(
            err,
            ParseError::Unterminated {
                position: 11,
                name: "sendfile".to_string(),
                found: "'}'".to_string(),
            }
        );

        let err = parse("worker_processes 4").unwrap_err();
        assert!(matches!(err, ParseError::Unterminated { position: 0, .. }));
    }

    #[test]
    fn test_stray_semicolon() {
        let err = parse("http { ; }").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 7, .. }));
    }
}
