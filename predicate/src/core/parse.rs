//! Parser for native filter strings.
//!
//! Accepts both dialects the query layer emits: table filters
//! (`PartitionKey = 'a' and RowKey > 'b'`) and tag filters
//! (`partition = 'a' and "Status" = 'active'`). Identifiers become field reads
//! on a fresh lambda parameter.

use std::{iter::Peekable, str::CharIndices};

use thiserror::Error;

use super::{BinaryOp, Expr, Lambda, Param, ScalarValue};

/// Errors raised while parsing a filter string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A character that starts no token.
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar {
        /// Byte offset.
        offset: usize,
        /// Offending character.
        ch: char,
    },
    /// A quoted string or identifier was not closed.
    #[error("unterminated quote starting at offset {offset}")]
    UnterminatedQuote {
        /// Byte offset of the opening quote.
        offset: usize,
    },
    /// A numeric literal that does not parse.
    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber {
        /// Byte offset.
        offset: usize,
        /// Literal text.
        text: String,
    },
    /// A token in a position the grammar does not allow.
    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken {
        /// Byte offset.
        offset: usize,
        /// Description of the token.
        found: String,
    },
    /// Input ended in the middle of an expression.
    #[error("unexpected end of filter")]
    UnexpectedEnd,
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Literal(ScalarValue),
    Compare(BinaryOp),
    And,
    Or,
    LeftParen,
    RightParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Literal(value) => format!("literal '{value}'"),
            Token::Compare(op) => format!("operator '{op}'"),
            Token::And => "'and'".to_owned(),
            Token::Or => "'or'".to_owned(),
            Token::LeftParen => "'('".to_owned(),
            Token::RightParen => "')'".to_owned(),
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Token)>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(&(offset, ch)) = self.chars.peek() {
            let token = match ch {
                c if c.is_whitespace() => {
                    self.chars.next();
                    continue;
                }
                '(' => {
                    self.chars.next();
                    Token::LeftParen
                }
                ')' => {
                    self.chars.next();
                    Token::RightParen
                }
                '\'' => Token::Literal(ScalarValue::Utf8(self.quoted(offset, '\'')?)),
                '"' => Token::Ident(self.quoted(offset, '"')?),
                '=' | '!' | '<' | '>' => self.comparison(offset, ch)?,
                c if c.is_ascii_digit() || c == '-' => self.number(offset)?,
                c if c.is_alphabetic() || c == '_' || c == '@' => self.word(),
                other => return Err(ParseError::UnexpectedChar { offset, ch: other }),
            };
            tokens.push((offset, token));
        }
        Ok(tokens)
    }

    /// Reads a quoted run; a doubled quote character stands for itself.
    fn quoted(&mut self, start: usize, quote: char) -> Result<String, ParseError> {
        self.chars.next();
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => {
                    if matches!(self.chars.peek(), Some(&(_, next)) if next == quote) {
                        self.chars.next();
                        text.push(quote);
                    } else {
                        return Ok(text);
                    }
                }
                Some((_, c)) => text.push(c),
                None => return Err(ParseError::UnterminatedQuote { offset: start }),
            }
        }
    }

    fn comparison(&mut self, offset: usize, first: char) -> Result<Token, ParseError> {
        self.chars.next();
        let followed_by_eq = matches!(self.chars.peek(), Some(&(_, '=')));
        if followed_by_eq {
            self.chars.next();
        }
        let op = match (first, followed_by_eq) {
            ('=', _) => BinaryOp::Equal,
            ('!', true) => BinaryOp::NotEqual,
            ('<', false) => BinaryOp::LessThan,
            ('<', true) => BinaryOp::LessThanOrEqual,
            ('>', false) => BinaryOp::GreaterThan,
            ('>', true) => BinaryOp::GreaterThanOrEqual,
            (ch, _) => return Err(ParseError::UnexpectedChar { offset, ch }),
        };
        Ok(Token::Compare(op))
    }

    fn number(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut end = start;
        while let Some(&(offset, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' || (c == '-' && offset == start) {
                end = offset + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let text = &self.input[start..end];
        let invalid = || ParseError::InvalidNumber {
            offset: start,
            text: text.to_owned(),
        };
        let value = if text.contains('.') {
            ScalarValue::Float64(text.parse().map_err(|_| invalid())?)
        } else {
            ScalarValue::Int64(text.parse().map_err(|_| invalid())?)
        };
        Ok(Token::Literal(value))
    }

    fn word(&mut self) -> Token {
        let mut text = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '@' {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match text.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "true" => Token::Literal(ScalarValue::Boolean(true)),
            "false" => Token::Literal(ScalarValue::Boolean(false)),
            "eq" => Token::Compare(BinaryOp::Equal),
            "ne" => Token::Compare(BinaryOp::NotEqual),
            "gt" => Token::Compare(BinaryOp::GreaterThan),
            "ge" => Token::Compare(BinaryOp::GreaterThanOrEqual),
            "lt" => Token::Compare(BinaryOp::LessThan),
            "le" => Token::Compare(BinaryOp::LessThanOrEqual),
            _ => Token::Ident(text),
        }
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    position: usize,
    param: Param,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(_, token)| token)
    }

    fn next(&mut self) -> Result<(usize, Token), ParseError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(ParseError::UnexpectedEnd)?;
        self.position += 1;
        Ok(token)
    }

    fn disjunction(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.conjunction()?;
        while self.peek() == Some(&Token::Or) {
            self.position += 1;
            expr = expr.or_else(self.conjunction()?);
        }
        Ok(expr)
    }

    fn conjunction(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        while self.peek() == Some(&Token::And) {
            self.position += 1;
            expr = expr.and_also(self.primary()?);
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == Some(&Token::LeftParen) {
            self.position += 1;
            let inner = self.disjunction()?;
            return match self.next()? {
                (_, Token::RightParen) => Ok(inner),
                (offset, other) => Err(ParseError::UnexpectedToken {
                    offset,
                    found: other.describe(),
                }),
            };
        }
        let left = self.operand()?;
        let op = match self.next()? {
            (_, Token::Compare(op)) => op,
            (offset, other) => {
                return Err(ParseError::UnexpectedToken {
                    offset,
                    found: other.describe(),
                })
            }
        };
        let right = self.operand()?;
        Ok(left.compare(op, right))
    }

    fn operand(&mut self) -> Result<Expr, ParseError> {
        match self.next()? {
            (_, Token::Ident(name)) => Ok(self.param.field(name)),
            (_, Token::Literal(value)) => Ok(Expr::Constant(value)),
            (offset, other) => Err(ParseError::UnexpectedToken {
                offset,
                found: other.describe(),
            }),
        }
    }
}

/// Parses a native filter string into a predicate over a fresh parameter.
///
/// `and` binds tighter than `or`; keywords are case-insensitive. OData-style
/// operator words (`eq`, `ne`, `gt`, ...) are accepted alongside symbols.
pub fn parse_filter(input: &str) -> Result<Lambda, ParseError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut failure = None;
    let lambda = Lambda::new(|param| {
        let mut parser = Parser {
            tokens,
            position: 0,
            param,
        };
        let parsed = parser.disjunction().and_then(|expr| {
            match parser.tokens.get(parser.position) {
                None => Ok(expr),
                Some((offset, token)) => Err(ParseError::UnexpectedToken {
                    offset: *offset,
                    found: token.describe(),
                }),
            }
        });
        parsed.unwrap_or_else(|err| {
            failure = Some(err);
            Expr::Constant(ScalarValue::Boolean(false))
        })
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(lambda),
    }
}
