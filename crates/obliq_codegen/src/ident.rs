//! C99 identifier sanitization.

/// Sanitizes `name` into a legal C99 identifier: `[A-Za-z_][A-Za-z0-9_]*`.
/// Any character outside `[A-Za-z0-9_]` becomes `_`; a leading digit gets a
/// `_` prefix; an empty name becomes `_`.
pub fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push('_');
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
