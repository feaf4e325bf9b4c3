//! Parser for type shapes and `T1, T2 -> R` signatures.
//!
//! The same grammar is used for signatures stored in shards and for type-directed
//! queries, so a signature and a query written the same way always match exactly.
//!
//! ```text
//! signature := [shape (',' shape)*] ['->' [shape]]
//! shape     := '&' ['mut'] shape | '*' ('const'|'mut') shape
//!            | '[' shape [';' ident] ']' | '(' [shape (',' shape)* [',']] ')'
//!            | ['dyn'|'impl'] path ['<' arg (',' arg)* '>'] ('+' bound)*
//! arg       := lifetime | ident '=' shape | shape
//! bound     := lifetime | ['?'] path
//! ```

use crate::error::ParseError;
use crate::types::{Signature, TypeShape};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Lifetime,
    Lt,
    Gt,
    Comma,
    Arrow,
    Amp,
    Star,
    Semi,
    Eq,
    PathSep,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Plus,
    Question,
}

impl Token {
    const fn describe(&self) -> &'static str {
        match self {
            Self::Ident(_) => "identifier",
            Self::Lifetime => "lifetime",
            Self::Lt => "'<'",
            Self::Gt => "'>'",
            Self::Comma => "','",
            Self::Arrow => "'->'",
            Self::Amp => "'&'",
            Self::Star => "'*'",
            Self::Semi => "';'",
            Self::Eq => "'='",
            Self::PathSep => "'::'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::Plus => "'+'",
            Self::Question => "'?'",
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '<' => Token::Lt,
            '>' => Token::Gt,
            ',' => Token::Comma,
            '&' => Token::Amp,
            '*' => Token::Star,
            ';' => Token::Semi,
            '=' => Token::Eq,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '+' => Token::Plus,
            '?' => Token::Question,
            '-' => match chars.next() {
                Some((_, '>')) => Token::Arrow,
                _ => return Err(ParseError::new(pos, "expected '->'")),
            },
            ':' => match chars.next() {
                Some((_, ':')) => Token::PathSep,
                _ => return Err(ParseError::new(pos, "expected '::'")),
            },
            '\'' => {
                let mut len = 0;
                while chars.next_if(|&(_, c)| is_ident_char(c)).is_some() {
                    len += 1;
                }
                if len == 0 {
                    return Err(ParseError::new(pos, "expected lifetime name"));
                }
                Token::Lifetime
            }
            c if is_ident_char(c) => {
                let mut end = pos + c.len_utf8();
                while let Some((i, c)) = chars.next_if(|&(_, c)| is_ident_char(c)) {
                    end = i + c.len_utf8();
                }
                Token::Ident(src[pos..end].to_string())
            }
            other => {
                return Err(ParseError::new(
                    pos,
                    format!("unexpected character '{}'", other),
                ));
            }
        };
        tokens.push((pos, token));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    end: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(src)?,
            cursor: 0,
            end: src.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(_, t)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.cursor + offset).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map_or(self.end, |(pos, _)| *pos)
    }

    fn at_end(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keywords: &[&str]) -> bool {
        if let Some(Token::Ident(word)) = self.peek()
            && keywords.contains(&word.as_str())
        {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(found) => ParseError::new(
                self.position(),
                format!("expected {}, found {}", expected, found.describe()),
            ),
            None => ParseError::new(self.end, format!("expected {}, found end of input", expected)),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(token.describe()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.cursor += 1;
                Ok(name)
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn parse_shape(&mut self) -> Result<TypeShape, ParseError> {
        match self.peek() {
            Some(Token::Amp) => {
                self.cursor += 1;
                while self.eat(&Token::Lifetime) {}
                self.eat_keyword(&["mut"]);
                self.parse_shape()
            }
            Some(Token::Star) => {
                self.cursor += 1;
                if !self.eat_keyword(&["const", "mut"]) {
                    return Err(self.error("'const' or 'mut'"));
                }
                self.parse_shape()
            }
            Some(Token::LBracket) => {
                self.cursor += 1;
                let inner = self.parse_shape()?;
                if self.eat(&Token::Semi) {
                    self.expect_ident()?;
                }
                self.expect(&Token::RBracket)?;
                Ok(TypeShape::new(TypeShape::SLICE, vec![inner]))
            }
            Some(Token::LParen) => {
                self.cursor += 1;
                let mut items = Vec::new();
                let mut trailing_comma = false;
                while !self.eat(&Token::RParen) {
                    items.push(self.parse_shape()?);
                    trailing_comma = self.eat(&Token::Comma);
                    if !trailing_comma {
                        self.expect(&Token::RParen)?;
                        break;
                    }
                }
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(TypeShape::new(TypeShape::UNIT, items))
                }
            }
            Some(Token::Ident(_)) => {
                self.eat_keyword(&["dyn", "impl"]);
                let shape = self.parse_path()?;
                // extra bounds are not part of the shape
                while self.eat(&Token::Plus) {
                    if !self.eat(&Token::Lifetime) {
                        self.eat(&Token::Question);
                        self.parse_path()?;
                    }
                }
                Ok(shape)
            }
            _ => Err(self.error("a type")),
        }
    }

    fn parse_path(&mut self) -> Result<TypeShape, ParseError> {
        let mut name = self.expect_ident()?;
        while self.eat(&Token::PathSep) {
            name = self.expect_ident()?;
        }

        let mut args = Vec::new();
        if self.eat(&Token::Lt) {
            loop {
                if self.eat(&Token::Lifetime) {
                    // lifetimes carry no structure
                } else if matches!(self.peek(), Some(Token::Ident(_)))
                    && self.peek_at(1) == Some(&Token::Eq)
                {
                    self.cursor += 2;
                    args.push(self.parse_shape()?);
                } else {
                    args.push(self.parse_shape()?);
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::Gt)?;
        }

        Ok(TypeShape::new(name, args))
    }

    fn parse_signature(&mut self) -> Result<Signature, ParseError> {
        let mut params = Vec::new();
        if !self.at_end() && self.peek() != Some(&Token::Arrow) {
            loop {
                params.push(self.parse_shape()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        let ret = if self.eat(&Token::Arrow) && !self.at_end() {
            Some(self.parse_shape()?)
        } else {
            None
        };

        if !self.at_end() {
            return Err(self.error("end of input"));
        }
        Ok(Signature { params, ret })
    }
}

/// Parse a single type shape, e.g. `HashMap<K, Vec<V>>`.
pub fn parse_shape(src: &str) -> Result<TypeShape, ParseError> {
    let mut parser = Parser::new(src)?;
    let shape = parser.parse_shape()?;
    if !parser.at_end() {
        return Err(parser.error("end of input"));
    }
    Ok(shape)
}

/// Parse a signature of the form `T1, T2 -> R`. Both sides are optional.
pub fn parse_signature(src: &str) -> Result<Signature, ParseError> {
    Parser::new(src)?.parse_signature()
}
