//! Pest-backed tokenizer for field expressions.

use pest::Parser;
use pest_derive::Parser;

use crate::parser::ast::Function;
use crate::parser::token::{Token, TokenKind};

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct FieldLexer;

const WORD_OPERATORS: [&str; 7] = ["and", "or", "not", "between", "in", "like", "ilike"];
const KEYWORDS: [&str; 5] = ["if", "is", "null", "true", "false"];

/// Returns true for words that can never be used as a bare column name.
#[must_use]
pub fn is_reserved_word(word: &str) -> bool {
    WORD_OPERATORS
        .iter()
        .chain(KEYWORDS.iter())
        .any(|w| w.eq_ignore_ascii_case(word))
}

/// Converts an expression string into tokens.
///
/// Never fails: unrecognized input becomes [`TokenKind::Invalid`] tokens and
/// the stream always ends with [`TokenKind::Eof`].
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = match FieldLexer::parse(Rule::token_stream, text) {
        Ok(pairs) => pairs
            .flat_map(pest::iterators::Pair::into_inner)
            .filter_map(|pair| {
                let kind = match pair.as_rule() {
                    Rule::date_literal => TokenKind::DateLiteral,
                    Rule::string => TokenKind::String,
                    Rule::number => TokenKind::Number,
                    Rule::cross_ref | Rule::bracketed | Rule::word => TokenKind::Identifier,
                    Rule::operator => TokenKind::Operator,
                    Rule::lparen => TokenKind::LParen,
                    Rule::rparen => TokenKind::RParen,
                    Rule::comma => TokenKind::Comma,
                    Rule::invalid => TokenKind::Invalid,
                    _ => return None,
                };
                let position = char_offset(text, pair.as_span().start());
                Some(Token::new(kind, pair.as_str(), position))
            })
            .collect(),
        // `invalid` matches any character, so the grammar accepts all input.
        Err(_) => vec![Token::new(TokenKind::Invalid, text, 0)],
    };

    classify_words(&mut tokens);
    tokens.push(Token::new(TokenKind::Eof, "", text.chars().count()));
    tokens
}

/// Tags word operators, keywords, and function names followed by `(`.
fn classify_words(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        let token = &tokens[i];
        if token.kind != TokenKind::Identifier || !token.text.starts_with(is_word_start) {
            continue;
        }
        let followed_by_paren = tokens
            .get(i + 1)
            .is_some_and(|next| next.kind == TokenKind::LParen);
        let word = token.text.as_str();
        let kind = if WORD_OPERATORS.iter().any(|w| w.eq_ignore_ascii_case(word)) {
            TokenKind::Operator
        } else if KEYWORDS.iter().any(|w| w.eq_ignore_ascii_case(word))
            || (followed_by_paren && Function::from_name(word).is_some())
        {
            TokenKind::Keyword
        } else {
            continue;
        };
        tokens[i].kind = kind;
    }
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn char_offset(text: &str, byte_offset: usize) -> usize {
    text.get(..byte_offset).map_or(0, |prefix| prefix.chars().count())
}
