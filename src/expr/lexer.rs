//! Tokenizer for condition expressions

use super::expression_error;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// `@name` or `$name`
    Var(String),
    True,
    False,
    Null,
    Not,
    And,
    Or,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let next2 = chars.get(i + 2).copied();
        let (token, width) = match (c, next) {
            ('=', Some('=')) if next2 == Some('=') => (Token::StrictEq, 3),
            ('!', Some('=')) if next2 == Some('=') => (Token::StrictNe, 3),
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('!', _) => (Token::Not, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            ('"' | '\'', _) => {
                let (s, width) = string(source, &chars[i..])?;
                (Token::Str(s), width)
            }
            ('@' | '$', _) => {
                let width = ident_len(&chars[i + 1..]);
                if width == 0 {
                    return Err(expression_error(source, &format!("expected a name after '{}'", c)));
                }
                let name: String = chars[i + 1..i + 1 + width].iter().collect();
                (Token::Var(name), width + 1)
            }
            (d, _) if d.is_ascii_digit() => {
                // `a.0.1` is two index segments, not a fraction
                let after_dot = tokens.last() == Some(&Token::Dot);
                let (n, width) = number(&chars[i..], !after_dot);
                (Token::Number(n), width)
            }
            (a, _) if a.is_alphabetic() || a == '_' => {
                let width = ident_len(&chars[i..]);
                let word: String = chars[i..i + width].iter().collect();
                let token = match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" | "undefined" => Token::Null,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                };
                (token, width)
            }
            (other, _) => {
                return Err(expression_error(
                    source,
                    &format!("unexpected character '{}'", other),
                ))
            }
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

fn ident_len(chars: &[char]) -> usize {
    chars
        .iter()
        .take_while(|c| c.is_alphanumeric() || **c == '_')
        .count()
}

fn number(chars: &[char], allow_fraction: bool) -> (f64, usize) {
    let mut width = 0;
    let mut seen_dot = false;
    while let Some(&c) = chars.get(width) {
        if c.is_ascii_digit() {
            width += 1;
        } else if c == '.' && allow_fraction && !seen_dot && chars.get(width + 1).is_some_and(|d| d.is_ascii_digit()) {
            seen_dot = true;
            width += 1;
        } else {
            break;
        }
    }
    let text: String = chars[..width].iter().collect();
    (text.parse().unwrap_or(0.0), width)
}

fn string(source: &str, chars: &[char]) -> Result<(String, usize)> {
    let quote = chars[0];
    let mut out = String::new();
    let mut i = 1;
    while let Some(&c) = chars.get(i) {
        match c {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| expression_error(source, "unterminated escape"))?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(expression_error(source, "unterminated string literal"))
}
