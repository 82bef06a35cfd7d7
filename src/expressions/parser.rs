//! Hand-written recursive descent parser for expressions.
//!
//! Precedence, loosest first: `||`, `&&`, comparisons, unary `!`, then
//! postfix property/index access which chains left to right.

use super::ast::{BinaryOp, Expr, Literal, Span, Spanned, SpannedExpr, UnaryOp};
use super::error::ParseError;
use super::lexer::{lex, SpannedToken, Token};

/// Parse expression source (the text between `${{` and `}}`).
///
/// Spans in the returned tree are relative to `input`.
pub fn parse_expression(input: &str) -> Result<SpannedExpr, ParseError> {
    let tokens = lex(input)?;
    let mut parser = Parser::new(&tokens);
    let expr = parser.parse_expr()?;
    if !parser.at_end() {
        return Err(ParseError::new(
            format!("unexpected token {:?}", parser.peek()),
            parser.peek_span(),
        ));
    }
    Ok(expr)
}

pub struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [SpannedToken]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| self.eof_span())
    }

    fn eof_span(&self) -> Span {
        let end = self.tokens.last().map(|(_, s)| s.1).unwrap_or(0);
        (end, end)
    }

    fn advance(&mut self) -> Option<&SpannedToken> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek().map_or(false, |t| t == token)
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<Span, ParseError> {
        if self.check(token) {
            let span = self.peek_span();
            self.advance();
            Ok(span)
        } else {
            Err(ParseError::new(
                format!("expected '{}', found {:?}", token, self.peek()),
                self.peek_span(),
            ))
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn parse_expr(&mut self) -> Result<SpannedExpr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<SpannedExpr, ParseError> {
        let mut left = self.parse_and()?;
        while self.match_token(&Token::Or) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<SpannedExpr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.match_token(&Token::And) {
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<SpannedExpr, ParseError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek_comparison() {
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn peek_comparison(&self) -> Option<BinaryOp> {
        match self.peek()? {
            Token::EqEq => Some(BinaryOp::Eq),
            Token::Ne => Some(BinaryOp::Ne),
            Token::Lt => Some(BinaryOp::Lt),
            Token::Le => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Ge => Some(BinaryOp::Ge),
            _ => None,
        }
    }

    fn parse_unary(&mut self) -> Result<SpannedExpr, ParseError> {
        if self.check(&Token::Not) {
            let start = self.peek_span().0;
            self.advance();
            let operand = self.parse_unary()?;
            let span = (start, operand.span.1);
            return Ok(Spanned::new(
                Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<SpannedExpr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&Token::Dot) {
                expr = self.parse_property(expr)?;
            } else if self.check(&Token::LBracket) {
                expr = self.parse_index(expr)?;
            } else if self.check(&Token::LParen) {
                let start = expr.span.0;
                let (args, end) = self.parse_arguments()?;
                expr = Spanned::new(
                    Expr::Apply {
                        callee: Box::new(expr),
                        args,
                    },
                    (start, end.1),
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_property(&mut self, target: SpannedExpr) -> Result<SpannedExpr, ParseError> {
        let start = target.span.0;
        self.expect(&Token::Dot)?;

        // Keywords are valid property names: `github.event.null`
        let (name, end) = match self.advance() {
            Some((Token::Ident(name), span)) => (name.clone(), span.1),
            Some((Token::True, span)) => ("true".to_string(), span.1),
            Some((Token::False, span)) => ("false".to_string(), span.1),
            Some((Token::Null, span)) => ("null".to_string(), span.1),
            other => {
                return Err(ParseError::new(
                    format!(
                        "expected property name after '.', found {:?}",
                        other.map(|(t, _)| t)
                    ),
                    self.peek_span(),
                ))
            }
        };

        Ok(Spanned::new(
            Expr::Property {
                target: Box::new(target),
                name,
            },
            (start, end),
        ))
    }

    fn parse_index(&mut self, target: SpannedExpr) -> Result<SpannedExpr, ParseError> {
        let start = target.span.0;
        self.expect(&Token::LBracket)?;
        let index = self.parse_expr()?;
        let end = self.expect(&Token::RBracket)?;

        Ok(Spanned::new(
            Expr::Index {
                target: Box::new(target),
                index: Box::new(index),
            },
            (start, end.1),
        ))
    }

    fn parse_primary(&mut self) -> Result<SpannedExpr, ParseError> {
        let span = self.peek_span();
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(ParseError::new("unexpected end of expression", span)),
        };

        let literal = match token {
            Token::Number(n) => Literal::Number(n),
            Token::String(s) => Literal::String(s),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Null => Literal::Null,
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                let end = self.expect(&Token::RParen)?;
                return Ok(Spanned::new(inner.node, (span.0, end.1)));
            }
            Token::Ident(name) => return self.parse_identifier(name, span),
            other => {
                return Err(ParseError::new(
                    format!("unexpected token '{}'", other),
                    span,
                ))
            }
        };

        self.advance();
        Ok(Spanned::new(Expr::Literal(literal), span))
    }

    /// A bare identifier is either a function call or a known context.
    fn parse_identifier(&mut self, name: String, span: Span) -> Result<SpannedExpr, ParseError> {
        if self.peek_at(1) == Some(&Token::LParen) {
            self.advance();
            return self.parse_call(name, span);
        }

        if super::ast::is_context(&name) {
            self.advance();
            return Ok(Spanned::new(Expr::Context(name.to_ascii_lowercase()), span));
        }

        Err(ParseError::new(format!("unknown context '{}'", name), span))
    }

    fn parse_call(&mut self, name: String, name_span: Span) -> Result<SpannedExpr, ParseError> {
        let (args, end) = self.parse_arguments()?;
        Ok(Spanned::new(Expr::Call { name, args }, (name_span.0, end.1)))
    }

    /// `(a, b, ...)`, returning the span of the closing parenthesis.
    fn parse_arguments(&mut self) -> Result<(Vec<SpannedExpr>, Span), ParseError> {
        self.expect(&Token::LParen)?;

        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            args.push(self.parse_expr()?);
            while self.match_token(&Token::Comma) {
                args.push(self.parse_expr()?);
            }
        }

        let end = self.expect(&Token::RParen)?;
        Ok((args, end))
    }
}

fn binary(op: BinaryOp, left: SpannedExpr, right: SpannedExpr) -> SpannedExpr {
    let span = (left.span.0, right.span.1);
    Spanned::new(
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}
