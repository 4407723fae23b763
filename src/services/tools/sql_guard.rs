//! SQL Scope Guard
//!
//! Lexical checks run before a query reaches the engine. Tables inside the
//! dataset scope are already exposed as views, so a query never needs to
//! name a file itself; file references that leave the scope are rejected.
//!
//! This is a token scan, not a parser. It catches literal paths handed to
//! file-reading table functions and `FROM '<path>'` scans.

use rca_cascade_core::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    /// `'...'` string literal, unescaped
    Literal(String),
    /// `"..."` quoted identifier, unescaped
    Ident(String),
    Punct(char),
}

/// Reject queries that chain statements or read files outside the scope.
pub fn check_query(sql: &str) -> CoreResult<()> {
    let tokens = tokenize(sql);

    let last_content = tokens
        .iter()
        .rposition(|t| *t != Token::Punct(';'))
        .map_or(0, |i| i + 1);
    if tokens[..last_content].contains(&Token::Punct(';')) {
        return Err(CoreError::validation(
            "Only a single SQL statement is allowed",
        ));
    }

    // One entry per open parenthesis: whether it belongs to a file reader
    let mut frames: Vec<bool> = Vec::new();
    let mut prev: Option<&Token> = None;
    for token in &tokens {
        match token {
            Token::Punct('(') => {
                let reader = matches!(prev, Some(Token::Word(w)) if is_file_reader(w));
                frames.push(reader);
            }
            Token::Punct(')') => {
                frames.pop();
            }
            Token::Literal(text) | Token::Ident(text) => {
                let after_from = matches!(prev, Some(Token::Word(w)) if is_scan_keyword(w));
                let in_reader = matches!(token, Token::Literal(_)) && frames.iter().any(|f| *f);
                if (after_from || in_reader) && escapes_scope(text) {
                    return Err(CoreError::validation(format!(
                        "Query references a file outside the dataset scope: {}",
                        text
                    )));
                }
            }
            _ => {}
        }
        prev = Some(token);
    }
    Ok(())
}

fn is_file_reader(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("read_")
        || name.starts_with("parquet_")
        || matches!(name.as_str(), "glob" | "sniff_csv")
}

fn is_scan_keyword(word: &str) -> bool {
    word.eq_ignore_ascii_case("from") || word.eq_ignore_ascii_case("join")
}

/// Absolute, home-relative, drive-qualified, URL or parent-relative paths.
fn escapes_scope(path: &str) -> bool {
    let path = path.trim();
    let mut chars = path.chars();
    let drive = matches!(
        (chars.next(), chars.next()),
        (Some(c), Some(':')) if c.is_ascii_alphabetic()
    );
    path.starts_with('/')
        || path.starts_with('\\')
        || path.starts_with('~')
        || drive
        || path.contains("://")
        || path.split(['/', '\\']).any(|part| part == "..")
}

fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            _ if c.is_whitespace() => i += 1,
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            '\'' | '"' => {
                let (text, next) = read_quoted(&chars, i, c);
                tokens.push(if c == '\'' {
                    Token::Literal(text)
                } else {
                    Token::Ident(text)
                });
                i = next;
            }
            _ if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            _ => {
                tokens.push(Token::Punct(c));
                i += 1;
            }
        }
    }
    tokens
}

/// Read a quoted run starting at `start`; a doubled quote is an escape.
fn read_quoted(chars: &[char], start: usize, quote: char) -> (String, usize) {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return (text, i + 1);
        }
        text.push(chars[i]);
        i += 1;
    }
    (text, i)
}
