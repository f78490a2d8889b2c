//! Quote-aware shell string splitting.
//!
//! This is not a shell parser. It understands single and double quotes,
//! backslash escapes, and the control operators `;`, `&&`, `||`, `|`, `&`
//! and newline, which is enough to find every base command in a string.

use std::path::Path;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Split `command` on unquoted control operators.
///
/// Empty segments are dropped.
pub(crate) fn split_segments(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote = Quote::None;
    let mut i = 0usize;

    while let Some(&c) = chars.get(i) {
        let next = chars.get(i.saturating_add(1)).copied();
        match (quote, c) {
            (Quote::None, '\\') => {
                current.push(c);
                if let Some(n) = next {
                    current.push(n);
                    i = i.saturating_add(1);
                }
            },
            (Quote::None, '\'') => {
                quote = Quote::Single;
                current.push(c);
            },
            (Quote::None, '"') => {
                quote = Quote::Double;
                current.push(c);
            },
            (Quote::Single, '\'') | (Quote::Double, '"') => {
                quote = Quote::None;
                current.push(c);
            },
            (Quote::Double, '\\') => {
                current.push(c);
                if let Some(n) = next {
                    current.push(n);
                    i = i.saturating_add(1);
                }
            },
            (Quote::None, ';' | '\n') => flush(&mut segments, &mut current),
            (Quote::None, '|') => {
                if next == Some('|') {
                    i = i.saturating_add(1);
                }
                flush(&mut segments, &mut current);
            },
            (Quote::None, '&') => {
                let prev = current.chars().last();
                if next == Some('&') {
                    i = i.saturating_add(1);
                    flush(&mut segments, &mut current);
                } else if matches!(prev, Some('>' | '<')) || next == Some('>') {
                    // `2>&1`, `&>file`
                    current.push(c);
                } else {
                    flush(&mut segments, &mut current);
                }
            },
            _ => current.push(c),
        }
        i = i.saturating_add(1);
    }
    flush(&mut segments, &mut current);
    segments
}

fn flush(segments: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
    current.clear();
}

/// Split a single segment into words, removing quotes.
pub(crate) fn tokenize(segment: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote = Quote::None;
    let mut chars = segment.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            },
            (Quote::None, '\'') => {
                quote = Quote::Single;
                in_token = true;
            },
            (Quote::None, '"') => {
                quote = Quote::Double;
                in_token = true;
            },
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::None | Quote::Double, '\\') => {
                if let Some(n) = chars.next() {
                    current.push(n);
                }
                in_token = true;
            },
            (_, c) => {
                current.push(c);
                in_token = true;
            },
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// Whether `command` contains `$(` or a backtick outside single quotes.
pub(crate) fn has_substitution(command: &str) -> bool {
    let mut quote = Quote::None;
    let mut prev = None;
    for c in command.chars() {
        match (quote, c) {
            (Quote::None, '\'') => quote = Quote::Single,
            (Quote::Single, '\'') => quote = Quote::None,
            (Quote::None, '"') => quote = Quote::Double,
            (Quote::Double, '"') => quote = Quote::None,
            (Quote::None | Quote::Double, '`') => return true,
            (Quote::None | Quote::Double, '(') if prev == Some('$') => return true,
            _ => {},
        }
        prev = Some(c);
    }
    false
}

/// A segment reduced to its base command and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedCommand {
    pub(crate) base: String,
    pub(crate) args: Vec<String>,
}

impl ParsedCommand {
    /// Parse a segment. Leading `NAME=value` assignments are skipped and the
    /// base command is reduced to its file name.
    pub(crate) fn parse(segment: &str) -> Option<Self> {
        let mut tokens = tokenize(segment)
            .into_iter()
            .skip_while(|t| is_assignment(t));
        let first = tokens.next()?;
        let base = Path::new(&first)
            .file_name()
            .map_or_else(|| first.clone(), |n| n.to_string_lossy().into_owned());
        Some(Self {
            base,
            args: tokens.collect(),
        })
    }
}

fn is_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        },
        None => false,
    }
}

/// Whether an argument names a filesystem path.
pub(crate) fn is_path_like(arg: &str) -> bool {
    arg.contains('/') || arg == ".." || arg.starts_with('~')
}

/// Whether an argument is a redirection operator or a redirect target glued to one.
pub(crate) fn is_redirection(arg: &str) -> bool {
    arg.trim_start_matches(|c: char| c.is_ascii_digit() || c == '&')
        .starts_with(['>', '<'])
}
