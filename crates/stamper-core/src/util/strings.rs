/// Replaces characters that XML 1.0 cannot carry with U+FFFD so values
/// from the data context never produce an unreadable part.
pub fn make_valid_xml(s: &str) -> String {
    if s.chars().all(is_valid_xml_char) {
        return s.to_string();
    }
    s.chars()
        .map(|c| if is_valid_xml_char(c) { c } else { '\u{FFFD}' })
        .collect()
}

fn is_valid_xml_char(c: char) -> bool {
    matches!(c,
        '\u{0009}' | '\u{000A}' | '\u{000D}' |
        '\u{0020}'..='\u{D7FF}' |
        '\u{E000}'..='\u{FFFD}' |
        '\u{10000}'..='\u{10FFFF}'
    )
}

/// Word drops leading and trailing blanks of `w:t` unless `xml:space` is set.
pub fn needs_space_preserve(s: &str) -> bool {
    s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_valid_xml_replaces_invalid_chars() {
        assert_eq!(make_valid_xml("hello\u{0000}world"), "hello\u{FFFD}world");
        assert_eq!(make_valid_xml("bell\u{0007}"), "bell\u{FFFD}");
    }

    #[test]
    fn make_valid_xml_preserves_valid_chars() {
        let input = "Grüße\t中文 \u{1F600}";
        assert_eq!(make_valid_xml(input), input);
    }

    #[test]
    fn space_preserve_only_for_edge_whitespace() {
        assert!(needs_space_preserve(" lead"));
        assert!(needs_space_preserve("trail "));
        assert!(!needs_space_preserve("in side"));
        assert!(!needs_space_preserve(""));
    }
}
