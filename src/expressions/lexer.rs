//! Expression lexer using logos.

use logos::Logos;

use super::ast::Span;
use super::error::ParseError;

/// A token with its source span.
pub type SpannedToken = (Token, Span);

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Hex before decimal so `0x1F` is not read as `0`
    #[regex(r"0[xX][0-9a-fA-F]+", lex_hex, priority = 3)]
    #[regex(r"-?[0-9]+", lex_number, priority = 2)]
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", lex_number, priority = 4)]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", lex_number, priority = 3)]
    Number(f64),

    /// Single-quoted string; `''` is an escaped quote.
    #[regex(r"'([^']|'')*'", lex_string)]
    String(String),

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Property names such as `my-step` may contain dashes
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_-]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Ident(s) => write!(f, "{}", s),
            Token::EqEq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Le => write!(f, "<="),
            Token::Ge => write!(f, ">="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Not => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
        }
    }
}

fn lex_number(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn lex_hex(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    i64::from_str_radix(&lex.slice()[2..], 16)
        .ok()
        .map(|n| n as f64)
}

fn lex_string(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].replace("''", "'")
}

/// Tokenize an expression.
pub fn lex(input: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(input);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, (span.start, span.end))),
            Err(_) => {
                return Err(ParseError::new(
                    format!("unexpected character '{}'", &input[span.clone()]),
                    (span.start, span.end),
                ))
            }
        }
    }

    Ok(tokens)
}
