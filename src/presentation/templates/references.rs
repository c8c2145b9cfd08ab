//! Literal template references (`extends`, `import`, `include`) found in a source.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Extends,
    Import,
    Include,
}

impl ReferenceKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "extends" => Some(Self::Extends),
            "import" => Some(Self::Import),
            "include" => Some(Self::Include),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extends => "extends",
            Self::Import => "import",
            Self::Include => "include",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Reference {
    pub kind: ReferenceKind,
    /// Candidate names; the reference resolves when any one of them exists.
    pub targets: Vec<String>,
    /// `ignore missing` was given, so an unresolved include is not an error.
    pub optional: bool,
}

enum Segment<'a> {
    Tag(&'a str),
    Skipped,
}

/// Collect every reference whose target is a string literal.
///
/// References built from variables cannot be checked ahead of time and are
/// skipped, as is anything inside `{% raw %}` blocks and `{# #}` comments.
/// Delimiters inside quoted strings do not open or close a tag.
pub(super) fn scan(source: &str) -> Vec<Reference> {
    let mut references = Vec::new();
    let mut rest = source;

    while let Some((segment, remaining)) = next_segment(rest) {
        rest = remaining;
        let Segment::Tag(inner) = segment else {
            continue;
        };

        let statement = trim_statement(inner);
        if statement == "raw" {
            match skip_raw(rest) {
                Some(after) => {
                    rest = after;
                    continue;
                }
                None => break,
            }
        }

        let (keyword, args) = statement
            .split_once(char::is_whitespace)
            .unwrap_or((statement, ""));
        let Some(kind) = ReferenceKind::from_keyword(keyword) else {
            continue;
        };

        let args = args.trim_start();
        let targets = if kind == ReferenceKind::Include && args.starts_with('[') {
            let list = args.split_once(']').map_or(args, |(list, _)| list);
            string_literals(list)
        } else if args.starts_with(is_quote) {
            string_literals(args).into_iter().take(1).collect()
        } else {
            Vec::new()
        };

        if targets.is_empty() {
            continue;
        }

        references.push(Reference {
            kind,
            targets,
            optional: kind == ReferenceKind::Include && args.contains("ignore missing"),
        });
    }

    references
}

fn trim_statement(inner: &str) -> &str {
    inner
        .trim()
        .trim_start_matches('-')
        .trim_end_matches('-')
        .trim()
}

fn next_segment(source: &str) -> Option<(Segment<'_>, &str)> {
    let (start, open) = ["{%", "{{", "{#"]
        .into_iter()
        .filter_map(|open| source.find(open).map(|index| (index, open)))
        .min_by_key(|(index, _)| *index)?;
    let body = &source[start + 2..];

    match open {
        "{#" => {
            let end = body.find("#}")?;
            Some((Segment::Skipped, &body[end + 2..]))
        }
        "{{" => {
            let end = find_unquoted(body, "}}")?;
            Some((Segment::Skipped, &body[end + 2..]))
        }
        _ => {
            let end = find_unquoted(body, "%}")?;
            Some((Segment::Tag(&body[..end]), &body[end + 2..]))
        }
    }
}

/// Position of `close` in `body`, ignoring occurrences inside string literals.
fn find_unquoted(body: &str, close: &str) -> Option<usize> {
    let mut quote = None;
    for (index, c) in body.char_indices() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if is_quote(c) => quote = Some(c),
            None if body[index..].starts_with(close) => return Some(index),
            None => {}
        }
    }
    None
}

/// Raw content is literal text, so only an `endraw` tag ends it.
fn skip_raw(mut rest: &str) -> Option<&str> {
    loop {
        let body = &rest[rest.find("{%")? + 2..];
        let end = body.find("%}")?;
        rest = &body[end + 2..];
        if trim_statement(&body[..end]) == "endraw" {
            return Some(rest);
        }
    }
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '`')
}

fn string_literals(input: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if !is_quote(c) {
            continue;
        }
        let literal: String = chars.by_ref().take_while(|&next| next != c).collect();
        literals.push(literal);
    }

    literals
}
