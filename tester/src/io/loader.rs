//! mysqltest-style script loading.
//!
//! ```text
//! # comment
//! --skip_if_below_version mysqld 80000
//! select *
//! from t1;
//! ```
//!
//! `--<word> <args>` lines become control directives, `#` and blank lines are
//! dropped, and everything else accumulates into a query ended by a line
//! whose last character is `;`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::core::directive::{Directive, DirectiveKind};

pub fn load_directives(path: &Path) -> Result<Vec<Directive>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read script {}", path.display()))?;
    parse_script(&contents).with_context(|| format!("parse script {}", path.display()))
}

pub fn parse_script(contents: &str) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    let mut pending: Option<(String, usize)> = None;

    for (idx, raw) in contents.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();

        if pending.is_none() {
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("--") {
                directives.push(control_directive(rest, line));
                continue;
            }
        }

        let (buf, _) = pending.get_or_insert_with(|| (String::new(), line));
        if !buf.is_empty() {
            buf.push('\n');
        }
        buf.push_str(raw.trim_end());

        if trimmed.ends_with(';')
            && let Some((mut sql, start)) = pending.take()
        {
            sql.truncate(sql.trim_end().len() - 1);
            directives.push(Directive::query(sql.trim(), start));
        }
    }

    if let Some((_, start)) = pending {
        bail!("unterminated statement starting at line {start}");
    }
    Ok(directives)
}

fn control_directive(rest: &str, line: usize) -> Directive {
    let rest = rest.trim();
    let (word, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    match DirectiveKind::from_keyword(word) {
        Some(kind) => Directive::new(kind, args.trim(), line),
        None => Directive::new(DirectiveKind::Unknown, rest, line),
    }
}
