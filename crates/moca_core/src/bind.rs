//! Format-style text binder.
//!
//! Statement text goes through [`render`] exactly once before it's sent to
//! the server. `%` introduces a format marker: `%%` is a literal percent,
//! `%s` and `%(name)s` are parameter markers. The engine never binds
//! parameters, so any parameter marker left in the text is an error.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("Unbound parameter marker '{marker}' at byte {pos}")]
    UnboundMarker { marker: String, pos: usize },

    #[error("Unsupported format character '{ch}' at byte {pos}")]
    UnsupportedFormat { ch: char, pos: usize },

    #[error("Incomplete format at byte {pos}")]
    IncompleteFormat { pos: usize },
}

/// Render statement text with no parameters.
pub fn render(sql: &str) -> Result<String, BindError> {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some((_, '%')) => out.push('%'),
            Some((_, 's')) => {
                return Err(BindError::UnboundMarker {
                    marker: "%s".to_string(),
                    pos,
                });
            }
            Some((_, '(')) => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, ')')) => break,
                        Some((_, c)) => name.push(c),
                        None => return Err(BindError::IncompleteFormat { pos }),
                    }
                }
                return match chars.peek() {
                    Some((_, 's')) => Err(BindError::UnboundMarker {
                        marker: format!("%({name})s"),
                        pos,
                    }),
                    Some((_, ch)) => Err(BindError::UnsupportedFormat { ch: *ch, pos }),
                    None => Err(BindError::IncompleteFormat { pos }),
                };
            }
            Some((_, ch)) => return Err(BindError::UnsupportedFormat { ch, pos }),
            None => return Err(BindError::IncompleteFormat { pos }),
        }
    }

    Ok(out)
}
