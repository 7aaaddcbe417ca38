//! HTML text escaping (§4.6): `& < > " '` always escaped in text content;
//! pre-generated tag strings produced by this crate are never re-escaped.

pub fn escape_text(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

pub fn escape_attr(s: &str) -> String {
    html_escape::encode_double_quoted_attribute(s).into_owned()
}

/// Sanitizes a label or id for use as an HTML `id` attribute value: keeps
/// alphanumerics, `-`, and `_`; anything else becomes `-`.
pub fn sanitize_id(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_five_characters() {
        assert_eq!(escape_text(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn sanitize_id_replaces_unsafe_characters() {
        assert_eq!(sanitize_id("fig one/two"), "fig-one-two");
    }
}
