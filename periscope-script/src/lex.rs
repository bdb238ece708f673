//! Tokenizer for the script language.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    Fn,
    Group,
    Let,
    Return,
    If,
    Else,
    While,
    True,
    False,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Dot,

    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    AndAnd,
    OrOr,
}

impl Tok {
    pub(crate) fn describe(&self) -> String {
        match self {
            Tok::Ident(name) => format!("identifier `{name}`"),
            Tok::Int(v) => format!("`{v}`"),
            Tok::Float(v) => format!("`{v}`"),
            Tok::Str(_) => "string literal".to_string(),
            Tok::Fn => "`fn`".to_string(),
            Tok::Group => "`group`".to_string(),
            Tok::Let => "`let`".to_string(),
            Tok::Return => "`return`".to_string(),
            Tok::If => "`if`".to_string(),
            Tok::Else => "`else`".to_string(),
            Tok::While => "`while`".to_string(),
            Tok::True => "`true`".to_string(),
            Tok::False => "`false`".to_string(),
            Tok::LParen => "`(`".to_string(),
            Tok::RParen => "`)`".to_string(),
            Tok::LBrace => "`{`".to_string(),
            Tok::RBrace => "`}`".to_string(),
            Tok::Comma => "`,`".to_string(),
            Tok::Semi => "`;`".to_string(),
            Tok::Dot => "`.`".to_string(),
            Tok::Assign => "`=`".to_string(),
            Tok::Eq => "`==`".to_string(),
            Tok::Ne => "`!=`".to_string(),
            Tok::Lt => "`<`".to_string(),
            Tok::Le => "`<=`".to_string(),
            Tok::Gt => "`>`".to_string(),
            Tok::Ge => "`>=`".to_string(),
            Tok::Plus => "`+`".to_string(),
            Tok::Minus => "`-`".to_string(),
            Tok::Star => "`*`".to_string(),
            Tok::Slash => "`/`".to_string(),
            Tok::Percent => "`%`".to_string(),
            Tok::Not => "`!`".to_string(),
            Tok::AndAnd => "`&&`".to_string(),
            Tok::OrOr => "`||`".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: u32,
}

fn keyword(ident: &str) -> Option<Tok> {
    match ident {
        "fn" => Some(Tok::Fn),
        "group" => Some(Tok::Group),
        "let" => Some(Tok::Let),
        "return" => Some(Tok::Return),
        "if" => Some(Tok::If),
        "else" => Some(Tok::Else),
        "while" => Some(Tok::While),
        "true" => Some(Tok::True),
        "false" => Some(Tok::False),
        _ => None,
    }
}

pub(crate) fn lex(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();
    let mut line: u32 = 1;

    while let Some(ch) = chars.next() {
        let tok = match ch {
            '\n' => {
                line += 1;
                continue;
            }
            c if c.is_whitespace() => continue,
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
                continue;
            }
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '{' => Tok::LBrace,
            '}' => Tok::RBrace,
            ',' => Tok::Comma,
            ';' => Tok::Semi,
            '.' => Tok::Dot,
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            '*' => Tok::Star,
            '/' => Tok::Slash,
            '%' => Tok::Percent,
            '=' => {
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Tok::Eq
                } else {
                    Tok::Assign
                }
            }
            '!' => {
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Tok::Ne
                } else {
                    Tok::Not
                }
            }
            '<' => {
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Tok::Le
                } else {
                    Tok::Lt
                }
            }
            '>' => {
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Tok::Ge
                } else {
                    Tok::Gt
                }
            }
            '&' => {
                if chars.peek() == Some(&'&') {
                    chars.next();
                    Tok::AndAnd
                } else {
                    return Err(ParseError::UnexpectedChar { ch: '&', line });
                }
            }
            '|' => {
                if chars.peek() == Some(&'|') {
                    chars.next();
                    Tok::OrOr
                } else {
                    return Err(ParseError::UnexpectedChar { ch: '|', line });
                }
            }
            '"' => {
                let mut text = String::new();
                loop {
                    match chars.next() {
                        None | Some('\n') => {
                            return Err(ParseError::UnterminatedString { line });
                        }
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('\\') => text.push('\\'),
                            Some('"') => text.push('"'),
                            Some(other) => {
                                return Err(ParseError::UnknownEscape { ch: other, line });
                            }
                            None => return Err(ParseError::UnterminatedString { line }),
                        },
                        Some(other) => text.push(other),
                    }
                }
                Tok::Str(text)
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                text.push(c);
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // A dot only belongs to the number when a digit follows;
                // otherwise it stays a separate token.
                let mut is_float = false;
                if chars.peek() == Some(&'.') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek().is_some_and(char::is_ascii_digit) {
                        is_float = true;
                        text.push('.');
                        chars.next();
                        while let Some(&d) = chars.peek() {
                            if d.is_ascii_digit() {
                                text.push(d);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                }
                if is_float {
                    match text.parse::<f64>() {
                        Ok(v) => Tok::Float(v),
                        Err(_) => return Err(ParseError::MalformedNumber { text, line }),
                    }
                } else {
                    match text.parse::<i64>() {
                        Ok(v) => Tok::Int(v),
                        Err(_) => return Err(ParseError::MalformedNumber { text, line }),
                    }
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut text = String::new();
                text.push(c);
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                keyword(&text).unwrap_or(Tok::Ident(text))
            }
            other => return Err(ParseError::UnexpectedChar { ch: other, line }),
        };
        tokens.push(Token { tok, line });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        lex(src).expect("lex").into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            toks("fn add(a, b) { return a + b; }"),
            vec![
                Tok::Fn,
                Tok::Ident("add".to_string()),
                Tok::LParen,
                Tok::Ident("a".to_string()),
                Tok::Comma,
                Tok::Ident("b".to_string()),
                Tok::RParen,
                Tok::LBrace,
                Tok::Return,
                Tok::Ident("a".to_string()),
                Tok::Plus,
                Tok::Ident("b".to_string()),
                Tok::Semi,
                Tok::RBrace,
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let tokens = lex("fn a() {\n  return 1;\n}\n").expect("lex");
        assert_eq!(tokens[0].line, 1);
        let ret = tokens.iter().find(|t| t.tok == Tok::Return).expect("return token");
        assert_eq!(ret.line, 2);
        assert_eq!(tokens.last().expect("rbrace").line, 3);
    }

    #[test]
    fn test_numbers_and_dots() {
        assert_eq!(toks("1.5"), vec![Tok::Float(1.5)]);
        // Dot not followed by a digit is a path separator
        assert_eq!(
            toks("a.b"),
            vec![Tok::Ident("a".to_string()), Tok::Dot, Tok::Ident("b".to_string())]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(toks(r#""a\n\"b\"""#), vec![Tok::Str("a\n\"b\"".to_string())]);
        assert!(matches!(lex("\"abc"), Err(ParseError::UnterminatedString { line: 1 })));
        assert!(matches!(lex(r#""\q""#), Err(ParseError::UnknownEscape { ch: 'q', .. })));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = toks("let x = 1; // trailing\n// full line\nlet y = 2;");
        assert_eq!(tokens.iter().filter(|t| **t == Tok::Let).count(), 2);
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            toks("a <= b >= c == d != e"),
            vec![
                Tok::Ident("a".to_string()),
                Tok::Le,
                Tok::Ident("b".to_string()),
                Tok::Ge,
                Tok::Ident("c".to_string()),
                Tok::Eq,
                Tok::Ident("d".to_string()),
                Tok::Ne,
                Tok::Ident("e".to_string()),
            ]
        );
    }

    #[test]
    fn test_lone_ampersand_rejected() {
        assert!(matches!(lex("a & b"), Err(ParseError::UnexpectedChar { ch: '&', .. })));
    }
}
