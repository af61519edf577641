use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// A statement whose named placeholders were rewritten to positional `?` markers.
///
/// `parameter_names()[i]` names the `i`-th `?` of `text()`, counted left to right.
/// Repeated names keep every position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
    text: String,
    parameters: Vec<String>,
}

impl ParsedStatement {
    /// The rewritten statement, ready to hand to the driver.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parameter names in order of appearance, duplicates included.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameters
    }

    /// 1-based positional slots bound to `name`.
    pub fn positions<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.parameters
            .iter()
            .enumerate()
            .filter(move |(_, parameter)| parameter.as_str() == name)
            .map(|(index, _)| index + 1)
    }

    pub fn into_parts(self) -> (String, Vec<String>) {
        (self.text, self.parameters)
    }
}

impl fmt::Display for ParsedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ParsedStatement [statement={}, parameters={:?}]",
            self.text, self.parameters
        )
    }
}

/// Converts named placeholders (`:name`) to positional placeholders (`?`).
///
/// The statement is scanned once, left to right:
///
/// - `'...'` and `"..."` literals are copied verbatim. A quote preceded by an odd
///   run of backslashes does not open or close a literal.
/// - `/* ... */` comments collapse to a single space and are never scanned.
/// - `:` followed by at least one character other than space, `)` or `,` is a
///   parameter; the name runs up to the next such delimiter or the end of input.
///
/// Malformed input (an unterminated literal or comment) never fails: the rest of
/// the statement is treated as belonging to the open region.
///
/// # Examples
///
/// ```
/// use sqlx_named_statement::parser::parse;
///
/// let parsed = parse("SELECT * FROM users WHERE id = :id AND name = ':literal'");
/// assert_eq!(parsed.text(), "SELECT * FROM users WHERE id = ? AND name = ':literal'");
/// assert_eq!(parsed.parameter_names(), ["id"]);
/// ```
pub fn parse(statement: &str) -> ParsedStatement {
    let mut text = String::with_capacity(statement.len());
    let mut parameters = Vec::new();
    let mut chars = statement.chars().peekable();
    let mut backslashes = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars);
                text.push(' ');
                backslashes = 0;
            }
            '\'' | '"' if backslashes % 2 == 0 => {
                text.push(c);
                copy_literal(&mut chars, c, &mut text);
                backslashes = 0;
            }
            ':' if chars.peek().is_some_and(|next| !is_delimiter(*next)) => {
                text.push('?');
                let mut name = String::new();
                while let Some(next) = chars.next_if(|next| !is_delimiter(*next)) {
                    name.push(next);
                }
                parameters.push(name);
                backslashes = 0;
            }
            _ => {
                text.push(c);
                backslashes = if c == '\\' { backslashes + 1 } else { 0 };
            }
        }
    }

    tracing::trace!(statement = %text, parameters = ?parameters, "parsed named statement");
    ParsedStatement { text, parameters }
}

fn is_delimiter(c: char) -> bool {
    matches!(c, ' ' | ')' | ',')
}

// Consumes through the closing `*/`, or to the end of input.
fn skip_block_comment(chars: &mut Peekable<Chars<'_>>) {
    let mut previous = None;
    for c in chars.by_ref() {
        if previous == Some('*') && c == '/' {
            return;
        }
        previous = Some(c);
    }
}

fn copy_literal(chars: &mut Peekable<Chars<'_>>, quote: char, text: &mut String) {
    let mut backslashes = 0usize;
    for c in chars.by_ref() {
        text.push(c);
        if c == quote && backslashes % 2 == 0 {
            return;
        }
        backslashes = if c == '\\' { backslashes + 1 } else { 0 };
    }
}
