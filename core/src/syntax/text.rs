//! Conversions between public character offsets and internal byte offsets

use super::token::TextSpan;

/// Byte offset of the `char_offset`-th character; `None` past the end
pub fn char_to_byte(text: &str, char_offset: usize) -> Option<usize> {
    text.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .nth(char_offset)
}

/// Character offset of `byte_offset`, clamped to the text
pub fn byte_to_char(text: &str, byte_offset: usize) -> usize {
    text.char_indices()
        .take_while(|(byte, _)| *byte < byte_offset)
        .count()
}

/// `[from, to)` in characters
pub fn span_to_chars(text: &str, span: TextSpan) -> (usize, usize) {
    let from = byte_to_char(text, span.start);
    let to = from + byte_to_char(&text[span.start.min(text.len())..], span.end.saturating_sub(span.start));
    (from, to)
}

/// Character immediately before `byte_offset`
pub fn char_before(text: &str, byte_offset: usize) -> Option<char> {
    text.get(..byte_offset)?.chars().next_back()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_ascii() {
        assert_eq!(char_to_byte("abc", 0), Some(0));
        assert_eq!(char_to_byte("abc", 3), Some(3));
        assert_eq!(char_to_byte("abc", 4), None);
        assert_eq!(byte_to_char("abc", 2), 2);
    }

    #[test]
    fn test_offsets_multibyte() {
        let text = "é = \"ü\";";
        assert_eq!(char_to_byte(text, 1), Some(2));
        assert_eq!(byte_to_char(text, 2), 1);
        assert_eq!(span_to_chars(text, TextSpan::new(5, 9)), (4, 7));
        assert_eq!(char_before(text, 2), Some('é'));
        assert_eq!(char_before(text, 1), None);
    }
}
