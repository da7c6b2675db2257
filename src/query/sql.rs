use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Rows returned when the generated SQL carries no `LIMIT` of its own.
pub const DEFAULT_ROW_LIMIT: usize = 1000;

static LIMIT_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\blimit\b").unwrap());
static LEADING_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\(*\s*([a-z]+)").unwrap());
static WRITE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|merge|drop|alter|create|truncate|copy|attach|detach|grant|revoke|install|load|pragma|call|export|import|vacuum|checkpoint|set)\b",
    )
    .unwrap()
});

/// Strip Markdown code fences (```sql ... ```) wrapped around a model reply.
pub fn strip_code_fences(reply: &str) -> String {
    let mut s = reply.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // drop the info string (`sql`, `postgresql`, ...) on the fence line
        s = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim().to_string()
}

/// Blank out string literals and quoted identifiers (with `_`) and comments
/// (with spaces) so keyword checks only see SQL structure. The output keeps
/// the byte length and line breaks of `sql`, so offsets into it are offsets
/// into `sql`.
fn mask_literals(sql: &str) -> String {
    fn blank(out: &mut String, c: char, fill: char) {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat(fill).take(c.len_utf8()));
        }
    }

    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push('_');
                while let Some(n) = chars.next() {
                    blank(&mut out, n, '_');
                    if n == c {
                        // doubled quote escapes itself
                        if chars.peek() == Some(&c) {
                            chars.next();
                            out.push('_');
                            continue;
                        }
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(' ');
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    chars.next();
                    blank(&mut out, n, ' ');
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(' ');
                let mut prev = ' ';
                for n in chars.by_ref() {
                    blank(&mut out, n, ' ');
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Remove trailing semicolons and whitespace.
pub fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// `sql` without leading whitespace or trailing comments, semicolons and
/// whitespace, ready to have a clause appended or to be wrapped.
fn statement_body(sql: &str) -> &str {
    let masked = mask_literals(sql);
    let end = masked
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .len();
    sql[..end].trim_start()
}

/// Accept a single `SELECT` or `WITH` statement and nothing else.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let masked = mask_literals(sql);
    let body = trim_statement(&masked);
    if body.is_empty() {
        bail!("empty SQL statement");
    }
    if body.contains(';') {
        bail!("SQL must contain exactly one statement");
    }
    let first = LEADING_KEYWORD
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    if first != "select" && first != "with" {
        bail!("only read-only SELECT/WITH queries are allowed");
    }
    if let Some(m) = WRITE_KEYWORD.find(body) {
        bail!(
            "only read-only SELECT/WITH queries are allowed (found {})",
            m.as_str().to_ascii_uppercase()
        );
    }
    Ok(())
}

pub fn has_limit(sql: &str) -> bool {
    LIMIT_KEYWORD.is_match(&mask_literals(sql))
}

/// Append `LIMIT <limit>` unless the query already limits itself.
pub fn apply_row_limit(sql: &str, limit: usize) -> String {
    let stmt = statement_body(sql);
    if has_limit(stmt) {
        stmt.to_string()
    } else {
        format!("{stmt} LIMIT {limit}")
    }
}

/// Count the rows `sql` would return without a limit.
pub fn count_query(sql: &str) -> String {
    format!(
        "SELECT COUNT(*) AS total_rows FROM ({}) AS q",
        statement_body(sql)
    )
}
