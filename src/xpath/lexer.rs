//! Tokenizer for path expressions.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Dot,
    DotDot,
    DoubleColon,
    Plus,
    Minus,
    /// `*` as a name test.
    Star,
    /// `*` as the multiply operator.
    Multiply,
    And,
    Or,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Literal(String),
    Number(f64),
    /// `$name`, without the dollar sign.
    Variable(String),
    /// NCName, QName (`prefix:name`) or `prefix:*`.
    Name(String),
}

impl Token {
    fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Multiply
                | Token::And
                | Token::Or
                | Token::Div
                | Token::Mod
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
        )
    }
}

/// `*` is the multiply operator and a bare name is an operator name whenever
/// a token precedes it that is not `@`, `::`, `(`, `[`, `,` or an operator.
fn expects_operator(previous: Option<&Token>) -> bool {
    match previous {
        None => false,
        Some(Token::At) | Some(Token::DoubleColon) | Some(Token::LParen)
        | Some(Token::LBracket) | Some(Token::Comma) => false,
        Some(token) => !token.is_operator(),
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn ncname_len(chars: &[char]) -> usize {
    match chars.first() {
        Some(c) if is_name_start(*c) => chars.iter().take_while(|n| is_name_char(**n)).count(),
        _ => 0,
    }
}

pub fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut pos = 0;
    let peek = |at: usize| chars.get(at).copied();

    while let Some(c) = peek(pos) {
        if c.is_whitespace() {
            pos += 1;
            continue;
        }
        let operator = expects_operator(tokens.last());
        let (token, len) = match c {
            '/' if peek(pos + 1) == Some('/') => (Token::DoubleSlash, 2),
            '/' => (Token::Slash, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '@' => (Token::At, 1),
            ',' => (Token::Comma, 1),
            '|' => (Token::Pipe, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' if operator => (Token::Multiply, 1),
            '*' => (Token::Star, 1),
            '=' => (Token::Eq, 1),
            '!' if peek(pos + 1) == Some('=') => (Token::NotEq, 2),
            '<' if peek(pos + 1) == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if peek(pos + 1) == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            ':' if peek(pos + 1) == Some(':') => (Token::DoubleColon, 2),
            '.' if peek(pos + 1) == Some('.') => (Token::DotDot, 2),
            '.' if !peek(pos + 1).map_or(false, |n| n.is_ascii_digit()) => (Token::Dot, 1),
            '"' | '\'' => {
                let end = chars[pos + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| Error::query(expression, "unterminated string literal"))?;
                let literal: String = chars[pos + 1..pos + 1 + end].iter().collect();
                (Token::Literal(literal), end + 2)
            }
            '0'..='9' | '.' => {
                let len = chars[pos..]
                    .iter()
                    .take_while(|d| d.is_ascii_digit() || **d == '.')
                    .count();
                let text: String = chars[pos..pos + len].iter().collect();
                let number = text.parse::<f64>().map_err(|_| {
                    Error::query(expression, format!("invalid number '{}'", text))
                })?;
                (Token::Number(number), len)
            }
            '$' => {
                let mut len = ncname_len(&chars[pos + 1..]);
                if len == 0 {
                    return Err(Error::query(expression, "expected a variable name after '$'"));
                }
                if peek(pos + 1 + len) == Some(':') {
                    let local = ncname_len(&chars[pos + 2 + len..]);
                    if local == 0 {
                        return Err(Error::query(expression, "expected a name after ':'"));
                    }
                    len += 1 + local;
                }
                let name: String = chars[pos + 1..pos + 1 + len].iter().collect();
                (Token::Variable(name), len + 1)
            }
            c if is_name_start(c) => {
                let mut len = ncname_len(&chars[pos..]);
                if operator {
                    let name: String = chars[pos..pos + len].iter().collect();
                    let token = match name.as_str() {
                        "and" => Token::And,
                        "or" => Token::Or,
                        "div" => Token::Div,
                        "mod" => Token::Mod,
                        _ => {
                            return Err(Error::query(
                                expression,
                                format!("expected an operator, found '{}'", name),
                            ));
                        }
                    };
                    (token, len)
                } else {
                    // QName or prefix:* but not an axis separator
                    if peek(pos + len) == Some(':') && peek(pos + len + 1) != Some(':') {
                        match peek(pos + len + 1) {
                            Some('*') => len += 2,
                            Some(n) if is_name_start(n) => {
                                len += 1 + ncname_len(&chars[pos + len + 1..]);
                            }
                            _ => {
                                return Err(Error::query(expression, "expected a name after ':'"));
                            }
                        }
                    }
                    let name: String = chars[pos..pos + len].iter().collect();
                    (Token::Name(name), len)
                }
            }
            other => {
                return Err(Error::query(
                    expression,
                    format!("unexpected character '{}'", other),
                ));
            }
        };
        tokens.push(token);
        pos += len;
    }
    Ok(tokens)
}
