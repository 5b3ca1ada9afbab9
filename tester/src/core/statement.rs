//! Lexical statement classification.
//!
//! The tester never parses SQL beyond deciding which pipeline branch a
//! statement takes. Comments and quoted text are skipped so keywords inside
//! them are not mistaken for the statement's verb.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmlKind {
    Insert,
    Replace,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// `SELECT`, a parenthesised/unioned select, or a `WITH ... SELECT`.
    Select,
    Dml(DmlKind),
    CreateTable { table: String },
    /// Only comments and whitespace.
    CommentOnly,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub kind: StatementKind,
}

impl Statement {
    pub fn is_select(&self) -> bool {
        self.kind == StatementKind::Select
    }

    pub fn is_dml(&self) -> bool {
        matches!(self.kind, StatementKind::Dml(_))
    }

    pub fn created_table(&self) -> Option<&str> {
        match &self.kind {
            StatementKind::CreateTable { table } => Some(table),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementSyntaxError {
    #[error("unterminated quoted text starting at byte {0}")]
    UnterminatedQuote(usize),
    #[error("unterminated comment starting at byte {0}")]
    UnterminatedComment(usize),
    #[error("unbalanced parenthesis at byte {0}")]
    UnbalancedParen(usize),
}

/// Classify `sql` by its leading verb.
pub fn classify(sql: &str) -> Result<Statement, StatementSyntaxError> {
    let tokens = tokenize(sql)?;
    Ok(Statement {
        sql: sql.to_string(),
        kind: kind_of(&tokens),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare or backtick-quoted identifier/keyword.
    Word { text: String, depth: usize },
    Literal,
    Symbol(char),
}

fn kind_of(tokens: &[Token]) -> StatementKind {
    let Some(first) = tokens.iter().find_map(word_text) else {
        return if tokens.is_empty() {
            StatementKind::CommentOnly
        } else {
            StatementKind::Other
        };
    };

    match first.to_ascii_uppercase().as_str() {
        "SELECT" => StatementKind::Select,
        "WITH" => with_body_kind(tokens),
        "INSERT" => StatementKind::Dml(DmlKind::Insert),
        "REPLACE" => StatementKind::Dml(DmlKind::Replace),
        "UPDATE" => StatementKind::Dml(DmlKind::Update),
        "DELETE" => StatementKind::Dml(DmlKind::Delete),
        "CREATE" => create_kind(tokens),
        _ => StatementKind::Other,
    }
}

/// The verb of a `WITH` statement is its first top-level keyword after the CTEs.
fn with_body_kind(tokens: &[Token]) -> StatementKind {
    for token in tokens.iter().skip(1) {
        let Token::Word { text, depth: 0 } = token else {
            continue;
        };
        match text.to_ascii_uppercase().as_str() {
            "SELECT" => return StatementKind::Select,
            "UPDATE" => return StatementKind::Dml(DmlKind::Update),
            "DELETE" => return StatementKind::Dml(DmlKind::Delete),
            "INSERT" => return StatementKind::Dml(DmlKind::Insert),
            _ => {}
        }
    }
    StatementKind::Other
}

fn create_kind(tokens: &[Token]) -> StatementKind {
    let mut rest = tokens.iter().skip_while(|t| !is_word(t, "CREATE")).skip(1).peekable();
    if rest.peek().is_some_and(|t| is_word(t, "TEMPORARY")) {
        rest.next();
    }
    if !rest.next().is_some_and(|t| is_word(t, "TABLE")) {
        return StatementKind::Other;
    }
    let rest: Vec<&Token> = rest.collect();
    let mut idx = 0;
    if rest.len() > 3
        && is_word(rest[0], "IF")
        && is_word(rest[1], "NOT")
        && is_word(rest[2], "EXISTS")
    {
        idx = 3;
    }
    // `ks.tbl` names the table by its last segment.
    let mut table = None;
    let mut segments = rest[idx..].iter();
    while let Some(Token::Word { text, .. }) = segments.next() {
        table = Some(text.clone());
        if !matches!(segments.next(), Some(Token::Symbol('.'))) {
            break;
        }
    }
    match table {
        Some(table) => StatementKind::CreateTable { table },
        None => StatementKind::Other,
    }
}

fn word_text(token: &Token) -> Option<&str> {
    match token {
        Token::Word { text, .. } => Some(text),
        _ => None,
    }
}

fn is_word(token: &Token, keyword: &str) -> bool {
    word_text(token).is_some_and(|text| text.eq_ignore_ascii_case(keyword))
}

fn tokenize(sql: &str) -> Result<Vec<Token>, StatementSyntaxError> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut open_parens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b if b.is_ascii_whitespace() => i += 1,
            b'#' => i = skip_line(bytes, i),
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && bytes.get(i + 2).is_none_or(|c| c.is_ascii_whitespace()) =>
            {
                i = skip_line(bytes, i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = sql[i + 2..]
                    .find("*/")
                    .ok_or(StatementSyntaxError::UnterminatedComment(i))?;
                i += 2 + end + 2;
            }
            b'\'' | b'"' => {
                i = skip_quoted(bytes, i)?;
                tokens.push(Token::Literal);
            }
            b'`' => {
                let end = skip_quoted(bytes, i)?;
                let text = sql[i + 1..end - 1].replace("``", "`");
                tokens.push(Token::Word { text, depth });
                i = end;
            }
            b'(' => {
                open_parens.push(i);
                depth += 1;
                tokens.push(Token::Symbol('('));
                i += 1;
            }
            b')' => {
                if open_parens.pop().is_none() {
                    return Err(StatementSyntaxError::UnbalancedParen(i));
                }
                depth -= 1;
                tokens.push(Token::Symbol(')'));
                i += 1;
            }
            b if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80 => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric()
                        || bytes[i] == b'_'
                        || bytes[i] == b'$'
                        || bytes[i] >= 0x80)
                {
                    i += 1;
                }
                tokens.push(Token::Word {
                    text: sql[start..i].to_string(),
                    depth,
                });
            }
            _ => {
                tokens.push(Token::Symbol(b as char));
                i += 1;
            }
        }
    }

    if let Some(pos) = open_parens.pop() {
        return Err(StatementSyntaxError::UnbalancedParen(pos));
    }
    Ok(tokens)
}

fn skip_line(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

/// Return the index just past the closing quote of the quoted run at `start`.
///
/// Backslash escapes and doubled quotes are honoured.
fn skip_quoted(bytes: &[u8], start: usize) -> Result<usize, StatementSyntaxError> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote != b'`' => i += 2,
            c if c == quote => {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                } else {
                    return Ok(i + 1);
                }
            }
            _ => i += 1,
        }
    }
    Err(StatementSyntaxError::UnterminatedQuote(start))
}
