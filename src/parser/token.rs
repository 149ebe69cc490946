//! Token definitions for the field expression lexer.

use std::fmt;

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Column name, bracketed column name, or `@name` cross-reference.
    Identifier,
    /// `if`, `is`, `null`, `true`, `false`, or a function name directly
    /// followed by `(`.
    Keyword,
    /// Integer or floating point literal.
    Number,
    /// Double-quoted string literal (with quotes, escapes intact).
    String,
    /// `date("...")`.
    DateLiteral,
    /// Symbolic operators and the word operators `and or not between in like ilike`.
    Operator,
    LParen,
    RParen,
    Comma,
    /// An unrecognized character or an unterminated string.
    Invalid,
    /// End of input.
    Eof,
}

/// A single lexical unit with its character position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: String,
    /// Character offset of the first character of the token.
    pub position: usize,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    /// Returns true if this identifier is an `@name` cross-reference marker.
    #[must_use]
    pub fn is_cross_reference(&self) -> bool {
        self.kind == TokenKind::Identifier && self.text.starts_with('@')
    }

    /// Returns the referenced name for identifiers, with `@` and brackets stripped.
    #[must_use]
    pub fn identifier_name(&self) -> Option<&str> {
        if self.kind != TokenKind::Identifier {
            return None;
        }
        let text = self.text.as_str();
        if let Some(name) = text.strip_prefix('@') {
            Some(name)
        } else if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            Some(inner)
        } else {
            Some(text)
        }
    }

    /// Returns true if the token is the given word or symbol operator.
    #[must_use]
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text.eq_ignore_ascii_case(op)
    }

    /// Returns true if the token is the given keyword.
    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Describes the token for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Invalid => format!("invalid input '{}'", self.text),
            _ => format!("'{}'", self.text),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}) at {}", self.kind, self.text, self.position)
    }
}

/// Decodes the contents of a double-quoted string token.
///
/// `\"` and `\\` unescape to `"` and `\`; any other escaped character is
/// kept verbatim with its backslash.
#[must_use]
pub fn unescape_string(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
