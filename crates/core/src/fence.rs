/// Strip an optional markdown code fence from model output.
///
/// Tolerates zero or one leading fence marker, with or without a language
/// tag (` ```json `), and zero or one trailing marker. Inner content is
/// returned verbatim apart from surrounding whitespace; text without any
/// fence passes through untouched.
pub fn unwrap_code_fence(text: &str) -> &str {
    let mut inner = text.trim();

    if let Some(rest) = inner.strip_prefix("```") {
        // Drop a language tag up to the end of the fence line.
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        inner = rest.strip_prefix('\n').unwrap_or(rest);
    }

    inner = inner.trim_end();
    if let Some(rest) = inner.strip_suffix("```") {
        inner = rest.trim_end();
    }

    inner.trim()
}
