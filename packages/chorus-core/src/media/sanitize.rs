//! Display text sanitization.
//!
//! Titles coming back from search and metadata services may contain HTML tags
//! and entities. Notices render plain text, so markup is stripped here.

/// Strips markup tags, decodes HTML entities and collapses whitespace.
#[must_use]
pub fn sanitize_text(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                stripped.push(' ');
            }
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    let decoded = html_escape::decode_html_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
