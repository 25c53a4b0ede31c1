//! DDL text utilities.
//!
//! The synchronizer never generates full DDL itself; it replays definition
//! text captured from `sqlite_master` and lets SQLite execute it. The
//! helpers here do the two pieces of text surgery that still need to
//! happen on our side: rewriting the table name inside a CREATE TABLE
//! statement (for the rebuild's temporary table) and producing the
//! normalized form used when comparing live and desired definitions.

use crate::error::{Result, SyncError};

/// Quotes an identifier for use in a SQL statement.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Rewrites the table name inside a `CREATE TABLE` statement.
///
/// Returns an error if the statement does not parse as a CREATE TABLE or
/// if the name found in it is not `from`. The rest of the statement is
/// preserved byte for byte.
pub fn rename_create_table(definition: &str, from: &str, to: &str) -> Result<String> {
    let (start, end, name) = table_name_span(definition).ok_or_else(|| {
        SyncError::Planning(format!(
            "could not locate table name in definition: {definition}"
        ))
    })?;

    if !name.eq_ignore_ascii_case(from) {
        return Err(SyncError::Planning(format!(
            "definition names table '{name}', expected '{from}'"
        )));
    }

    Ok(format!(
        "{}{}{}",
        &definition[..start],
        quote_ident(to),
        &definition[end..]
    ))
}

/// Returns the normalized form of a definition used for change detection.
///
/// SQLite rewrites the stored `CREATE TABLE` text when a table is renamed
/// (the rebuild's final step), always double-quoting the name. Comparing
/// raw text would therefore flag every rebuilt table as changed again on
/// the next run. Normalization collapses whitespace runs to a single
/// space, strips a trailing semicolon, and unwraps quoted identifiers
/// that did not need quoting. Semantically equivalent but differently
/// written definitions still compare as different.
#[must_use]
pub fn normalize_definition(definition: &str) -> String {
    let mut out = String::with_capacity(definition.len());
    let mut chars = definition.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            if !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
        }
        match c {
            '\'' => {
                // String literal: copy verbatim, '' is an escaped quote.
                out.push('\'');
                while let Some(c) = chars.next() {
                    out.push(c);
                    if c == '\'' {
                        match chars.peek() {
                            Some('\'') => {
                                out.push('\'');
                                chars.next();
                            }
                            _ => break,
                        }
                    }
                }
            }
            '"' | '`' | '[' => {
                let closing = match c {
                    '[' => ']',
                    other => other,
                };
                let mut ident = String::new();
                while let Some(c) = chars.next() {
                    if c == closing {
                        // Doubled closing char escapes itself (not for []).
                        if closing != ']' && chars.peek() == Some(&closing) {
                            ident.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        ident.push(c);
                    }
                }
                if is_simple_identifier(&ident) {
                    out.push_str(&ident);
                } else {
                    out.push_str(&quote_ident(&ident));
                }
            }
            _ => out.push(c),
        }
    }

    while out.ends_with(';') || out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Returns the byte span and unquoted text of the table name token in a
/// `CREATE TABLE` statement, or `None` if the statement has another shape.
fn table_name_span(sql: &str) -> Option<(usize, usize, String)> {
    let mut pos = skip_whitespace(sql, 0);

    let (word, next) = read_bare_word(sql, pos)?;
    if !word.eq_ignore_ascii_case("CREATE") {
        return None;
    }
    pos = skip_whitespace(sql, next);

    let (mut word, mut next) = read_bare_word(sql, pos)?;
    if word.eq_ignore_ascii_case("TEMP") || word.eq_ignore_ascii_case("TEMPORARY") {
        pos = skip_whitespace(sql, next);
        (word, next) = read_bare_word(sql, pos)?;
    }
    if !word.eq_ignore_ascii_case("TABLE") {
        return None;
    }
    pos = skip_whitespace(sql, next);

    let (mut name, mut start, mut end, quoted) = read_identifier(sql, pos)?;
    if !quoted && name.eq_ignore_ascii_case("IF") {
        // CREATE TABLE IF NOT EXISTS <name>
        pos = skip_whitespace(sql, end);
        let (not_word, next) = read_bare_word(sql, pos)?;
        if !not_word.eq_ignore_ascii_case("NOT") {
            return None;
        }
        pos = skip_whitespace(sql, next);
        let (exists_word, next) = read_bare_word(sql, pos)?;
        if !exists_word.eq_ignore_ascii_case("EXISTS") {
            return None;
        }
        pos = skip_whitespace(sql, next);
        (name, start, end, _) = read_identifier(sql, pos)?;
    }

    // Schema-qualified name: the token after the dot is the table name.
    if sql[end..].starts_with('.') {
        let (qualified, qstart, qend, _) = read_identifier(sql, end + 1)?;
        return Some((qstart, qend, qualified));
    }

    Some((start, end, name))
}

fn skip_whitespace(sql: &str, from: usize) -> usize {
    sql[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(sql.len(), |(i, _)| from + i)
}

fn read_bare_word(sql: &str, from: usize) -> Option<(&str, usize)> {
    let rest = &sql[from..];
    let len = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map_or(rest.len(), |(i, _)| i);
    if len == 0 {
        return None;
    }
    Some((&rest[..len], from + len))
}

/// Reads an identifier token (bare, `"…"`, `` `…` `` or `[…]`) starting at
/// `from`. Returns `(unquoted_text, start, end, was_quoted)`.
fn read_identifier(sql: &str, from: usize) -> Option<(String, usize, usize, bool)> {
    let rest = &sql[from..];
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;

    if first == '"' || first == '`' || first == '[' {
        let closing = if first == '[' { ']' } else { first };
        let mut ident = String::new();
        let mut iter = rest.char_indices().skip(1).peekable();
        while let Some((i, c)) = iter.next() {
            if c == closing {
                if closing != ']' && matches!(iter.peek(), Some((_, p)) if *p == closing) {
                    ident.push(c);
                    iter.next();
                    continue;
                }
                return Some((ident, from, from + i + closing.len_utf8(), true));
            }
            ident.push(c);
        }
        return None; // unterminated quote
    }

    let len = rest
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
        .map_or(rest.len(), |(i, _)| i);
    if len == 0 {
        return None;
    }
    Some((rest[..len].to_string(), from, from + len, false))
}

fn is_simple_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
