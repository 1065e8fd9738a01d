//! Tokenizer for policy statements.

use std::iter::Peekable;
use std::str::Chars;

use super::SyntaxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semi,
    PathSep,
    EqEq,
}

impl Token {
    pub(super) fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("`{s}`"),
            Token::Str(s) => format!("string {s:?}"),
            Token::LParen => "`(`".into(),
            Token::RParen => "`)`".into(),
            Token::LBracket => "`[`".into(),
            Token::RBracket => "`]`".into(),
            Token::LBrace => "`{`".into(),
            Token::RBrace => "`}`".into(),
            Token::Comma => "`,`".into(),
            Token::Semi => "`;`".into(),
            Token::PathSep => "`::`".into(),
            Token::EqEq => "`==`".into(),
        }
    }
}

/// A token with its 1-based source position.
#[derive(Debug, Clone)]
pub(super) struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Character cursor tracking 1-based line/column.
struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }
}

pub(super) fn tokenize(source: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut cur = Cursor::new(source);

    while let Some(c) = cur.peek() {
        let (line, column) = (cur.line, cur.column);
        let spanned = |token| Spanned { token, line, column };

        if c.is_whitespace() {
            cur.bump();
            continue;
        }

        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semi),
            _ => None,
        };
        if let Some(token) = single {
            cur.bump();
            tokens.push(spanned(token));
            continue;
        }

        match c {
            '/' => {
                cur.bump();
                if cur.peek() != Some('/') {
                    return Err(SyntaxError::new(line, column, "unexpected character `/`")
                        .suggest("Line comments start with `//`."));
                }
                while cur.peek().is_some_and(|n| n != '\n') {
                    cur.bump();
                }
            }
            ':' => {
                cur.bump();
                if cur.bump() != Some(':') {
                    return Err(SyntaxError::new(line, column, "expected `::`")
                        .suggest("Entity references look like Dir::\"/path\"."));
                }
                tokens.push(spanned(Token::PathSep));
            }
            '=' => {
                cur.bump();
                if cur.bump() != Some('=') {
                    return Err(SyntaxError::new(line, column, "expected `==`"));
                }
                tokens.push(spanned(Token::EqEq));
            }
            '"' => {
                cur.bump();
                let mut value = String::new();
                let mut closed = false;
                while let Some(n) = cur.bump() {
                    match n {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match cur.bump() {
                            Some(escaped) => value.push(escaped),
                            None => break,
                        },
                        '\n' => break,
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(SyntaxError::new(line, column, "unterminated string literal")
                        .suggest("Close the string with `\"` on the same line."));
                }
                tokens.push(spanned(Token::Str(value)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(n) = cur.peek() {
                    if !(n.is_alphanumeric() || n == '_') {
                        break;
                    }
                    ident.push(n);
                    cur.bump();
                }
                tokens.push(spanned(Token::Ident(ident)));
            }
            other => {
                return Err(SyntaxError::new(
                    line,
                    column,
                    format!("unexpected character `{other}`"),
                ));
            }
        }
    }

    Ok(tokens)
}
