//! Placeholder and directive markers in paragraph text.
//!
//! `${expression}` is a value placeholder, `#{name(argument)}` an inline
//! directive. Both are matched non-greedily, so the first `}` closes the
//! marker.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(.*?)\}").expect("invalid placeholder regex"));

static INLINE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\{(.*?)\}").expect("invalid directive regex"));

static CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*([A-Za-z_]\w*)\s*\((.*)\)\s*;?\s*$").expect("invalid call regex")
});

/// One marker occurrence in a paragraph's logical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Byte range of the whole marker, delimiters included.
    pub span: Range<usize>,
    /// Text between the delimiters.
    pub expression: String,
}

impl Placeholder {
    fn from_captures(captures: regex::Captures<'_>) -> Option<Self> {
        let whole = captures.get(0)?;
        Some(Self {
            span: whole.range(),
            expression: captures.get(1)?.as_str().to_string(),
        })
    }
}

/// First `${...}` at or after byte offset `from`.
pub fn find_variable(text: &str, from: usize) -> Option<Placeholder> {
    VARIABLE
        .captures_at(text, from)
        .and_then(Placeholder::from_captures)
}

/// Every `#{...}` in `text`, left to right.
pub fn find_directives(text: &str) -> Vec<Placeholder> {
    INLINE_DIRECTIVE
        .captures_iter(text)
        .filter_map(Placeholder::from_captures)
        .collect()
}

/// A directive written as `name(argument)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveCall {
    pub name: String,
    pub argument: String,
}

pub fn parse_call(text: &str) -> Option<DirectiveCall> {
    let captures = CALL.captures(text)?;
    Some(DirectiveCall {
        name: captures.get(1)?.as_str().to_string(),
        argument: captures.get(2)?.as_str().trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_variables_from_offset() {
        let text = "Hello ${name}, you are ${age}";
        let first = find_variable(text, 0).unwrap();
        assert_eq!(first.span, 6..13);
        assert_eq!(first.expression, "name");
        let second = find_variable(text, first.span.end).unwrap();
        assert_eq!(second.expression, "age");
        assert!(find_variable(text, second.span.end).is_none());
    }

    #[test]
    fn variables_are_non_greedy() {
        let p = find_variable("${a}}${b}", 0).unwrap();
        assert_eq!(p.expression, "a");
        assert!(find_variable("$ {a}", 0).is_none());
    }

    #[test]
    fn inline_directives_and_calls() {
        let found = find_directives("x #{displayParagraphIf(show)} y #{repeatParagraph(items)}");
        assert_eq!(found.len(), 2);
        let call = parse_call(&found[0].expression).unwrap();
        assert_eq!(call.name, "displayParagraphIf");
        assert_eq!(call.argument, "show");

        let call = parse_call(" replaceWordWith( user.name ); ").unwrap();
        assert_eq!(call.argument, "user.name");
        assert!(parse_call("not a call").is_none());
    }
}
