//! The derived `.env` file handed to the compose backend.

use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

fn needs_quotes(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '$' | '"' | '\'' | '#' | '\\'))
}

/// Compose interpolates unquoted and double-quoted values, never single-quoted ones.
fn render_value(value: &str) -> String {
    if !needs_quotes(value) {
        value.to_string()
    } else if value.contains('$') {
        format!("'{}'", value.replace('\'', "\\'"))
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Strips the quotes of `value` and resolves its escapes.
fn unquote(value: &str) -> String {
    let Some(quote) = value
        .chars()
        .next()
        .filter(|c| matches!(c, '"' | '\''))
        .filter(|c| value.len() > 1 && value.ends_with(*c))
    else {
        return value.to_string();
    };

    let inner = &value[1..value.len() - 1];
    let mut unquoted = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match (c, quote) {
            ('\\', '"') => unquoted.extend(chars.next()),
            ('\\', '\'') if chars.as_str().starts_with('\'') => unquoted.extend(chars.next()),
            _ => unquoted.push(c),
        }
    }
    unquoted
}

/// Renders `vars` as sorted `KEY=VALUE` lines.
///
/// Values containing whitespace, quotes or `#` are double-quoted, values
/// containing `$` are single-quoted so compose keeps them literal.
pub fn render(vars: &BTreeMap<String, String>) -> String {
    let mut content = String::new();
    for (key, value) in vars {
        content.push_str(key);
        content.push('=');
        content.push_str(&render_value(value));
        content.push('\n');
    }
    content
}

/// Writes `vars` to `path`, replacing any previous content.
pub fn write(path: &Path, vars: &BTreeMap<String, String>) -> Result<()> {
    fs::write(path, render(vars))?;
    info!("Created {} file", path.display());
    Ok(())
}

/// Parses `KEY=VALUE` lines, skipping blanks and comments.
pub fn parse(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value.trim())))
        .collect()
}

pub fn read(path: &Path) -> Result<BTreeMap<String, String>> {
    Ok(parse(&fs::read_to_string(path)?))
}
