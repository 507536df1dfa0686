//! HTML escaping for user-supplied free text.
//!
//! # Invariants
//! - Output never contains a raw `<`, `>`, `&`, `"` or `'` from the input.

/// Escapes free text before it reaches a rendering layer.
pub trait Sanitizer {
    fn escape(&self, text: &str) -> String;
}

/// Default sanitizer: HTML entity escaping.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlEscaper;

impl Sanitizer for HtmlEscaper {
    fn escape(&self, text: &str) -> String {
        escape_html(text)
    }
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{escape_html, HtmlEscaper, Sanitizer};

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn escapes_ampersand_first_without_double_encoding_output() {
        assert_eq!(escape_html("a & b's"), "a &amp; b&#39;s");
        assert_eq!(escape_html("&lt;"), "&amp;lt;");
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(
            HtmlEscaper.escape("Fixed typo in author"),
            "Fixed typo in author"
        );
    }
}
