//! Text rewrites applied to query text before it's sent to the server.
//!
//! None of this parses SQL. Substitution and splitting are purely textual, so
//! a placeholder inside a string literal or comment is rewritten, and a `;`
//! inside a string literal splits the statement.

use std::borrow::Cow;

use crate::config::{EngineOptions, is_identifier_char};
use crate::stage::StagedTable;

/// Applies the configured rewrites to caller text.
#[derive(Debug, Clone, Copy)]
pub struct QueryRewriter<'a> {
    placeholder: &'a str,
    escape_percent: bool,
}

impl<'a> QueryRewriter<'a> {
    pub fn new(opts: &'a EngineOptions) -> Self {
        QueryRewriter {
            placeholder: &opts.placeholder,
            escape_percent: opts.escape_percent,
        }
    }

    /// Point the placeholder at the staged table, if there is one.
    pub fn substitute<'b>(&self, sql: &'b str, staged: Option<&StagedTable>) -> Cow<'b, str> {
        match staged {
            Some(staged) => substitute_placeholder(sql, self.placeholder, staged.name()),
            None => Cow::Borrowed(sql),
        }
    }

    /// Prepare a single statement for the binder.
    ///
    /// Must be called exactly once per statement.
    pub fn escape<'b>(&self, sql: &'b str) -> Cow<'b, str> {
        if self.escape_percent {
            escape_markers(sql)
        } else {
            Cow::Borrowed(sql)
        }
    }
}

/// Replace every whole-identifier occurrence of `placeholder` with `name`.
///
/// An occurrence only matches if it isn't directly preceded or followed by a
/// character that could continue an identifier, so `tmp_table` doesn't match
/// inside `my_tmp_table` or `tmp_table2`.
pub fn substitute_placeholder<'a>(sql: &'a str, placeholder: &str, name: &str) -> Cow<'a, str> {
    if placeholder.is_empty() || !sql.contains(placeholder) {
        return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len() + name.len());
    let mut last = 0;
    for (idx, _) in sql.match_indices(placeholder) {
        let end = idx + placeholder.len();
        let before = sql[..idx].chars().next_back();
        let after = sql[end..].chars().next();
        let bounded =
            !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char);
        if bounded {
            out.push_str(&sql[last..idx]);
            out.push_str(name);
            last = end;
        }
    }
    out.push_str(&sql[last..]);

    Cow::Owned(out)
}

/// Double every `%` so the text binder reads it as a literal.
pub fn escape_markers(sql: &str) -> Cow<'_, str> {
    if sql.contains('%') {
        Cow::Owned(sql.replace('%', "%%"))
    } else {
        Cow::Borrowed(sql)
    }
}

/// Split text on `;` into individual statements.
///
/// Fragments are trimmed, empty fragments dropped, and each statement gets
/// its `;` back.
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{s};"))
        .collect()
}

/// Quote an identifier with backticks.
pub fn quote_identifier(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}
